//! Core traits for cached entity collections.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use super::{CacheRegistry, EntityCache};

/// A domain record type with its own collection in the backend and its own
/// cache in the [`CacheRegistry`].
///
/// Implementors must provide a unique id and the registry slot that holds
/// their cache. No entity type can reach another type's slot through this
/// trait.
pub trait Entity: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
  /// Backend collection name (e.g., "transactions")
  const COLLECTION: &'static str;

  /// Sort expression passed to list calls, if any
  const SORT: Option<&'static str> = None;

  /// Unique record id
  fn id(&self) -> &str;

  /// This entity's cache slot in the registry
  fn cache(registry: &CacheRegistry) -> &Arc<EntityCache<Self>>;
}
