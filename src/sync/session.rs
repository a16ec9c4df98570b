use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use crate::cache::CacheRegistry;

/// Opaque token for the signed-in user. Scopes cache freshness.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for Identity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// The current identity as a watchable signal.
///
/// Re-publishing the identity that is already current does not notify
/// subscribers, so the signal only changes when the user actually changes.
pub struct Session {
  tx: watch::Sender<Option<Identity>>,
  registry: Arc<CacheRegistry>,
}

impl Session {
  pub fn new(registry: Arc<CacheRegistry>) -> Self {
    let (tx, _rx) = watch::channel(None);
    Self { tx, registry }
  }

  pub fn current(&self) -> Option<Identity> {
    self.tx.borrow().clone()
  }

  pub fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
    self.tx.subscribe()
  }

  pub fn sign_in(&self, identity: Identity) {
    let changed = self.tx.send_if_modified(|current| {
      if current.as_ref() == Some(&identity) {
        return false;
      }
      *current = Some(identity.clone());
      true
    });
    if changed {
      info!(identity = %identity, "signed in");
    }
  }

  /// Drop the identity and reset every entity cache.
  pub fn sign_out(&self) {
    self.registry.clear_all();
    self.tx.send_replace(None);
    info!("signed out");
  }
}
