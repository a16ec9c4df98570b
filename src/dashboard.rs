//! Page-level glue: from an entity, a filter and the current URL to the rows
//! of one table page.

use color_eyre::{eyre::eyre, Result};
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;
use url::Url;

use crate::backend::{self, Transport};
use crate::cache::{CacheRegistry, Entity};
use crate::filter::{compile, evaluate, FilterSpec, Filterable};
use crate::pagination::{slice, PaginationState, UrlBinding};
use crate::sync::{FetchCoordinator, FetchError, FetchOutcome, Identity, Session};

/// One rendered table page.
#[derive(Debug, Clone)]
pub struct PageView<T> {
  pub rows: Vec<T>,
  /// Clamped pagination state the rows were sliced with
  pub state: PaginationState,
  /// Number of rows after filtering, across all pages
  pub total: usize,
  /// Corrected URL, when the one passed in was out of range
  pub rewrite: Option<Url>,
  pub error: Option<FetchError>,
}

/// Per-collection bookkeeping.
#[derive(Default)]
struct Mounted {
  /// Query the cache was last filled with
  committed: String,
  /// Coordinator for the query most recently asked for, reused by every
  /// caller asking for the same query
  current: Option<(String, Arc<dyn Any + Send + Sync>)>,
}

/// Owns the caches, the session and one long-lived coordinator per entity
/// collection. Concurrent page loads for the same collection and query share
/// that coordinator, and therefore a single backend request.
pub struct Dashboard<B> {
  backend: Arc<B>,
  registry: Arc<CacheRegistry>,
  session: Session,
  binding: UrlBinding,
  mounted: Mutex<HashMap<&'static str, Mounted>>,
}

impl<B: Transport> Dashboard<B> {
  pub fn new(backend: B, binding: UrlBinding) -> Self {
    let registry = Arc::new(CacheRegistry::new());
    let session = Session::new(Arc::clone(&registry));
    Self {
      backend: Arc::new(backend),
      registry,
      session,
      binding,
      mounted: Mutex::new(HashMap::new()),
    }
  }

  pub fn registry(&self) -> &Arc<CacheRegistry> {
    &self.registry
  }

  pub fn session(&self) -> &Session {
    &self.session
  }

  pub fn binding(&self) -> &UrlBinding {
    &self.binding
  }

  pub async fn sign_in(&self, email: &str, password: &str) -> Result<Identity> {
    let identity = self
      .backend
      .authenticate(email, password)
      .await
      .map_err(|e| eyre!("Sign-in failed for {}: {}", email, e))?;
    self.session.sign_in(identity.clone());
    Ok(identity)
  }

  pub fn sign_out(&self) {
    for mounted in self.lock_mounted().values_mut() {
      mounted.committed.clear();
    }
    self.session.sign_out();
  }

  /// A coordinator for `T` whose fetches send `query` to the backend.
  pub fn mount<T: Entity>(&self, query: String) -> FetchCoordinator<T> {
    let backend = Arc::clone(&self.backend);
    let query = Arc::new(query);
    FetchCoordinator::new(
      self.registry.cache::<T>(),
      self.session.subscribe(),
      move || {
        let backend = Arc::clone(&backend);
        let query = Arc::clone(&query);
        async move { backend::fetch_all::<T, B>(backend.as_ref(), &query).await }
      },
    )
  }

  /// Load `T` with `filter` applied on the backend, narrow it locally by
  /// `filter` and `search`, and slice out the page addressed by `url`.
  ///
  /// A filter that differs from the one the cache was loaded with forces a
  /// refetch; otherwise the cache is reused while it is fresh.
  pub async fn page<T: Entity + Filterable>(
    &self,
    filter: &FilterSpec,
    search: Option<&str>,
    url: &Url,
  ) -> PageView<T> {
    let query = compile(filter, &T::field_map());
    let (coordinator, outcome) = self.load::<T>(query).await;
    let snapshot = coordinator.snapshot();

    let narrowed: Vec<T> = evaluate(filter, search, &snapshot.data)
      .into_iter()
      .cloned()
      .collect();
    self.view(narrowed, url, outcome)
  }

  /// Like [`page`](Self::page) for entities without filters.
  pub async fn browse<T: Entity>(&self, url: &Url) -> PageView<T> {
    let (coordinator, outcome) = self.load::<T>(String::new()).await;
    let snapshot = coordinator.snapshot();
    self.view(snapshot.data, url, outcome)
  }

  pub async fn create<T: Entity>(&self, record: &T) -> Result<T, FetchError> {
    let coordinator = self.current::<T>();
    coordinator
      .create(backend::create(self.backend.as_ref(), record))
      .await
  }

  pub async fn update<T: Entity>(&self, record: &T) -> Result<T, FetchError> {
    let coordinator = self.current::<T>();
    coordinator
      .update(backend::update(self.backend.as_ref(), record))
      .await
  }

  pub async fn delete<T: Entity>(&self, id: &str) -> Result<(), FetchError> {
    let coordinator = self.current::<T>();
    coordinator
      .delete(id, backend::delete::<T, B>(self.backend.as_ref(), id))
      .await
  }

  async fn load<T: Entity>(&self, query: String) -> (Arc<FetchCoordinator<T>>, FetchOutcome) {
    let (coordinator, committed) = self.coordinator::<T>(&query);
    let outcome = if committed != query {
      debug!(collection = T::COLLECTION, %query, "filter changed, refetching");
      coordinator.refresh(true).await
    } else {
      coordinator.ensure().await
    };
    if outcome == FetchOutcome::Committed {
      self.lock_mounted().entry(T::COLLECTION).or_default().committed = query;
    }
    (coordinator, outcome)
  }

  /// The mounted coordinator for `T` and `query`, plus the query the cache
  /// was last filled with. A coordinator for another query is replaced.
  fn coordinator<T: Entity>(&self, query: &str) -> (Arc<FetchCoordinator<T>>, String) {
    let mut mounted = self.lock_mounted();
    let slot = mounted.entry(T::COLLECTION).or_default();

    let existing = slot
      .current
      .as_ref()
      .filter(|(current, _)| current == query)
      .and_then(|(_, coordinator)| Arc::clone(coordinator).downcast::<FetchCoordinator<T>>().ok());

    let coordinator = match existing {
      Some(coordinator) => coordinator,
      None => {
        let coordinator = Arc::new(self.mount::<T>(query.to_string()));
        let erased: Arc<dyn Any + Send + Sync> = coordinator.clone();
        slot.current = Some((query.to_string(), erased));
        coordinator
      }
    };
    (coordinator, slot.committed.clone())
  }

  /// The coordinator mutations go through: the mounted one, whatever its query.
  fn current<T: Entity>(&self) -> Arc<FetchCoordinator<T>> {
    let query = self
      .lock_mounted()
      .get(T::COLLECTION)
      .map(|slot| match &slot.current {
        Some((query, _)) => query.clone(),
        None => slot.committed.clone(),
      })
      .unwrap_or_default();
    self.coordinator::<T>(&query).0
  }

  fn view<T: Clone>(&self, rows: Vec<T>, url: &Url, outcome: FetchOutcome) -> PageView<T> {
    let bound = self.binding.read(url, rows.len());
    PageView {
      rows: slice(&rows, bound.state).to_vec(),
      state: bound.state,
      total: rows.len(),
      rewrite: bound.rewrite,
      error: match outcome {
        FetchOutcome::Failed(e) => Some(e),
        _ => None,
      },
    }
  }

  fn lock_mounted(&self) -> MutexGuard<'_, HashMap<&'static str, Mounted>> {
    self.mounted.lock().unwrap_or_else(PoisonError::into_inner)
  }
}
