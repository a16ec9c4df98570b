//! Fetch coordination for one entity cache.
//!
//! Inspired by TanStack Query, a [`FetchCoordinator`] wraps a fetcher closure
//! and exposes loading / error state next to the cached data.
//!
//! # Example
//!
//! ```ignore
//! let backend = Arc::new(client);
//! let coordinator = FetchCoordinator::new(registry.cache::<Category>(), session.subscribe(), move || {
//!     let backend = backend.clone();
//!     async move { backend::fetch_all::<Category, _>(backend.as_ref(), "").await }
//! });
//!
//! // On mount and whenever the identity changes
//! coordinator.ensure().await;
//!
//! // Retry button
//! coordinator.refresh(true).await;
//!
//! let snapshot = coordinator.snapshot();
//! ```

use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::{FetchError, Identity};
use crate::cache::{Entity, EntityCache, FetchTicket};

/// A boxed future that loads a whole collection
pub type LoadFuture<T> = BoxFuture<'static, Result<Vec<T>, FetchError>>;

/// A factory function that creates load futures
type FetcherFn<T> = Arc<dyn Fn() -> LoadFuture<T> + Send + Sync>;

type SharedFlight = Shared<BoxFuture<'static, FetchOutcome>>;

/// Per-coordinator state. Not shared with other consumers of the same cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchState {
  pub loading: bool,
  pub error: Option<FetchError>,
}

/// What a call to [`FetchCoordinator::ensure`] or
/// [`FetchCoordinator::refresh`] ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
  /// No identity, or the cache was already fresh
  Skipped,
  /// The fetched collection was written to the cache
  Committed,
  /// The fetch succeeded, but a fetch started later had already committed
  Superseded,
  /// The request was cancelled on the client side
  Cancelled,
  /// The fetch failed; the cache was left untouched
  Failed(FetchError),
}

/// Everything a view needs to render one entity collection.
#[derive(Debug, Clone)]
pub struct FetchSnapshot<T> {
  pub loading: bool,
  pub error: Option<FetchError>,
  /// The cached data belongs to the current identity
  pub fetched: bool,
  pub data: Vec<T>,
}

struct InFlight {
  ticket: FetchTicket,
  identity: Identity,
  flight: SharedFlight,
}

/// Binds an [`EntityCache`] to a fetcher and the current identity.
///
/// At most one fetch per coordinator is in flight at a time. Callers that
/// arrive while a fetch for the same identity is pending await that fetch
/// instead of starting another one. A fetch keeps running (and still writes
/// to the cache) if the coordinator is unmounted before it completes.
pub struct FetchCoordinator<T> {
  cache: Arc<EntityCache<T>>,
  fetcher: FetcherFn<T>,
  identity: watch::Receiver<Option<Identity>>,
  local: Arc<Mutex<FetchState>>,
  in_flight: Arc<Mutex<Option<InFlight>>>,
}

impl<T: Entity> FetchCoordinator<T> {
  /// Create a coordinator for `cache`.
  ///
  /// The fetcher is a closure that returns a future. It is called once per
  /// actual fetch, never for callers that join a pending one.
  pub fn new<F, Fut>(
    cache: Arc<EntityCache<T>>,
    identity: watch::Receiver<Option<Identity>>,
    fetcher: F,
  ) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<T>, FetchError>> + Send + 'static,
  {
    Self {
      cache,
      fetcher: Arc::new(move || fetcher().boxed()),
      identity,
      local: Arc::new(Mutex::new(FetchState::default())),
      in_flight: Arc::new(Mutex::new(None)),
    }
  }

  pub fn cache(&self) -> &Arc<EntityCache<T>> {
    &self.cache
  }

  pub fn current_identity(&self) -> Option<Identity> {
    self.identity.borrow().clone()
  }

  pub fn state(&self) -> FetchState {
    lock(&self.local).clone()
  }

  pub fn snapshot(&self) -> FetchSnapshot<T> {
    let entry = self.cache.get();
    let local = self.state();
    let fetched = self
      .current_identity()
      .is_some_and(|identity| entry.fetched_by() == Some(&identity));
    FetchSnapshot {
      loading: local.loading,
      error: local.error,
      fetched,
      data: entry.into_data(),
    }
  }

  /// Fetch unless the cache is already populated for the current identity.
  pub async fn ensure(&self) -> FetchOutcome {
    let Some(identity) = self.current_identity() else {
      debug!(collection = T::COLLECTION, "no identity, skipping fetch");
      return FetchOutcome::Skipped;
    };
    if self.cache.is_fresh_for(&identity) {
      debug!(collection = T::COLLECTION, %identity, "cache is fresh");
      return FetchOutcome::Skipped;
    }
    self.fetch(identity, true).await
  }

  /// Fetch even if the cache is fresh. Joins a pending fetch if there is one.
  pub async fn refresh(&self, with_loading: bool) -> FetchOutcome {
    let Some(identity) = self.current_identity() else {
      return FetchOutcome::Skipped;
    };
    self.fetch(identity, with_loading).await
  }

  /// Run [`ensure`](Self::ensure) now and again on every identity change,
  /// until the identity signal is dropped.
  pub async fn watch_identity(&self) {
    let mut identity = self.identity.clone();
    loop {
      self.ensure().await;
      if identity.changed().await.is_err() {
        break;
      }
    }
  }

  /// Run a create call and prepend the stored record to the cache.
  pub async fn create<Fut>(&self, op: Fut) -> Result<T, FetchError>
  where
    Fut: Future<Output = Result<T, FetchError>>,
  {
    let record = op.await?;
    self.cache.set(|entry| entry.upserted(record.clone()));
    debug!(collection = T::COLLECTION, id = record.id(), "created record");
    Ok(record)
  }

  /// Run an update call and replace the cached record with the result.
  pub async fn update<Fut>(&self, op: Fut) -> Result<T, FetchError>
  where
    Fut: Future<Output = Result<T, FetchError>>,
  {
    let record = op.await?;
    self.cache.set(|entry| entry.upserted(record.clone()));
    debug!(collection = T::COLLECTION, id = record.id(), "updated record");
    Ok(record)
  }

  /// Run a delete call and drop the record from the cache.
  pub async fn delete<Fut>(&self, id: &str, op: Fut) -> Result<(), FetchError>
  where
    Fut: Future<Output = Result<(), FetchError>>,
  {
    op.await?;
    self.cache.set(|entry| entry.without(id));
    debug!(collection = T::COLLECTION, id, "deleted record");
    Ok(())
  }

  /// Release this consumer. Local state goes away with it; a pending fetch
  /// is not cancelled and still writes to the shared cache.
  pub fn unmount(self) {
    debug!(collection = T::COLLECTION, "coordinator unmounted");
  }

  async fn fetch(&self, identity: Identity, with_loading: bool) -> FetchOutcome {
    let flight = {
      let mut slot = lock(&self.in_flight);
      match slot.as_ref() {
        Some(pending) if pending.identity == identity => {
          debug!(collection = T::COLLECTION, "joining in-flight fetch");
          pending.flight.clone()
        }
        _ => {
          {
            let mut local = lock(&self.local);
            local.loading = with_loading;
            local.error = None;
          }
          let ticket = self.cache.begin_fetch();
          let flight = run_flight(
            Arc::clone(&self.cache),
            Arc::clone(&self.fetcher),
            Arc::clone(&self.local),
            Arc::clone(&self.in_flight),
            identity.clone(),
            ticket,
          )
          .boxed()
          .shared();
          // Drive the fetch independently of this caller so that dropping
          // the caller (or the coordinator) does not cancel it.
          tokio::spawn(flight.clone());
          *slot = Some(InFlight {
            ticket,
            identity,
            flight: flight.clone(),
          });
          flight
        }
      }
    };
    flight.await
  }
}

async fn run_flight<T: Entity>(
  cache: Arc<EntityCache<T>>,
  fetcher: FetcherFn<T>,
  local: Arc<Mutex<FetchState>>,
  in_flight: Arc<Mutex<Option<InFlight>>>,
  identity: Identity,
  ticket: FetchTicket,
) -> FetchOutcome {
  let outcome = match fetcher().await {
    Ok(data) => {
      let count = data.len();
      if cache.commit(ticket, data, identity.clone()) {
        info!(collection = T::COLLECTION, %identity, count, "fetched collection");
        FetchOutcome::Committed
      } else {
        FetchOutcome::Superseded
      }
    }
    Err(e) if e.is_cancelled() => {
      debug!(collection = T::COLLECTION, "fetch cancelled");
      FetchOutcome::Cancelled
    }
    Err(e) => {
      match &e {
        FetchError::Validation { .. } => {
          error!(collection = T::COLLECTION, kind = e.kind(), error = %e, "rejected malformed response")
        }
        _ => warn!(collection = T::COLLECTION, kind = e.kind(), error = %e, "fetch failed"),
      }
      FetchOutcome::Failed(e)
    }
  };

  // Only the coordinator's current flight reports into its local state. A
  // flight replaced by one for another identity finishes silently.
  let mut slot = lock(&in_flight);
  if slot.as_ref().is_some_and(|pending| pending.ticket == ticket) {
    *slot = None;
    let mut state = lock(&local);
    state.loading = false;
    state.error = match &outcome {
      FetchOutcome::Failed(e) => Some(e.clone()),
      _ => None,
    };
  } else {
    debug!(collection = T::COLLECTION, %identity, "replaced flight finished");
  }
  outcome
}

fn lock<S>(mutex: &Mutex<S>) -> MutexGuard<'_, S> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::CacheRegistry;
  use crate::entities::Category;
  use crate::sync::Session;
  use std::collections::VecDeque;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::time::Duration;
  use tokio::sync::Notify;

  fn category(id: &str) -> Category {
    Category {
      id: id.to_string(),
      owner: "u1".to_string(),
      name: id.to_string(),
      description: None,
    }
  }

  fn transport_error() -> FetchError {
    FetchError::Transport {
      collection: "categories".to_string(),
      status: Some(500),
      message: "boom".to_string(),
    }
  }

  /// Scripted fetcher: counts calls, optionally waits on a gate, and replays
  /// queued results (falling back to a single "default" category).
  #[derive(Default)]
  struct Script {
    calls: AtomicUsize,
    gate: Option<Arc<Notify>>,
    results: Mutex<VecDeque<Result<Vec<Category>, FetchError>>>,
  }

  impl Script {
    fn with_results(results: Vec<Result<Vec<Category>, FetchError>>) -> Arc<Self> {
      Arc::new(Self {
        results: Mutex::new(results.into()),
        ..Default::default()
      })
    }

    fn gated(gate: Arc<Notify>, results: Vec<Result<Vec<Category>, FetchError>>) -> Arc<Self> {
      Arc::new(Self {
        gate: Some(gate),
        results: Mutex::new(results.into()),
        ..Default::default()
      })
    }

    fn calls(&self) -> usize {
      self.calls.load(Ordering::SeqCst)
    }

    async fn next(&self) -> Result<Vec<Category>, FetchError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      if let Some(gate) = &self.gate {
        gate.notified().await;
      }
      let next = self.results.lock().unwrap().pop_front();
      next.unwrap_or_else(|| Ok(vec![category("default")]))
    }
  }

  struct Harness {
    registry: Arc<CacheRegistry>,
    session: Session,
  }

  impl Harness {
    fn new() -> Self {
      let registry = Arc::new(CacheRegistry::new());
      let session = Session::new(registry.clone());
      Self { registry, session }
    }

    fn signed_in(id: &str) -> Self {
      let harness = Self::new();
      harness.session.sign_in(Identity::new(id));
      harness
    }

    fn mount(&self, script: &Arc<Script>) -> FetchCoordinator<Category> {
      let script = script.clone();
      FetchCoordinator::new(
        self.registry.cache::<Category>(),
        self.session.subscribe(),
        move || {
          let script = script.clone();
          async move { script.next().await }
        },
      )
    }
  }

  async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
      if check() {
        return;
      }
      tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
  }

  #[tokio::test]
  async fn test_first_mount_fetches_and_populates_cache() {
    let harness = Harness::signed_in("u1");
    let script = Script::with_results(vec![Ok(vec![category("a"), category("b")])]);
    let coordinator = harness.mount(&script);

    assert_eq!(coordinator.ensure().await, FetchOutcome::Committed);

    let snapshot = coordinator.snapshot();
    assert_eq!(script.calls(), 1);
    assert!(snapshot.fetched);
    assert!(!snapshot.loading);
    assert_eq!(snapshot.error, None);
    assert_eq!(snapshot.data.len(), 2);
    assert_eq!(
      harness.registry.cache::<Category>().get().fetched_by(),
      Some(&Identity::new("u1"))
    );
  }

  #[tokio::test]
  async fn test_remount_with_same_identity_does_not_fetch() {
    let harness = Harness::signed_in("u1");
    harness
      .registry
      .cache::<Category>()
      .set_fetched_data(vec![category("a")], Identity::new("u1"));
    let script = Script::with_results(vec![]);

    let first = harness.mount(&script);
    assert_eq!(first.ensure().await, FetchOutcome::Skipped);
    first.unmount();
    let second = harness.mount(&script);
    assert_eq!(second.ensure().await, FetchOutcome::Skipped);

    assert_eq!(script.calls(), 0);
    assert!(second.snapshot().fetched);
  }

  #[tokio::test]
  async fn test_other_identity_fetches_exactly_once() {
    let harness = Harness::signed_in("u2");
    harness
      .registry
      .cache::<Category>()
      .set_fetched_data(vec![category("a")], Identity::new("u1"));
    let script = Script::with_results(vec![]);
    let coordinator = harness.mount(&script);

    assert!(!coordinator.snapshot().fetched);
    coordinator.ensure().await;
    coordinator.ensure().await;

    assert_eq!(script.calls(), 1);
    assert!(coordinator.snapshot().fetched);
  }

  #[tokio::test]
  async fn test_empty_collection_is_never_fresh() {
    let harness = Harness::signed_in("u1");
    let script = Script::with_results(vec![Ok(vec![]), Ok(vec![])]);
    let coordinator = harness.mount(&script);

    coordinator.ensure().await;
    coordinator.ensure().await;

    assert_eq!(script.calls(), 2);
  }

  #[tokio::test]
  async fn test_without_identity_nothing_happens() {
    let harness = Harness::new();
    let script = Script::with_results(vec![]);
    let coordinator = harness.mount(&script);

    assert_eq!(coordinator.ensure().await, FetchOutcome::Skipped);
    assert_eq!(coordinator.refresh(true).await, FetchOutcome::Skipped);

    assert_eq!(script.calls(), 0);
    assert_eq!(coordinator.state(), FetchState::default());
  }

  #[tokio::test]
  async fn test_concurrent_calls_share_one_fetch() {
    let harness = Harness::signed_in("u1");
    let gate = Arc::new(Notify::new());
    let script = Script::gated(gate.clone(), vec![Ok(vec![category("a")])]);
    let coordinator = harness.mount(&script);

    let (a, b, c, _) = tokio::join!(
      coordinator.ensure(),
      coordinator.ensure(),
      coordinator.refresh(false),
      async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        gate.notify_one();
      }
    );

    assert_eq!(script.calls(), 1);
    assert_eq!(a, FetchOutcome::Committed);
    assert_eq!(b, FetchOutcome::Committed);
    assert_eq!(c, FetchOutcome::Committed);
  }

  #[tokio::test]
  async fn test_loading_is_set_while_in_flight() {
    let harness = Harness::signed_in("u1");
    let gate = Arc::new(Notify::new());
    let script = Script::gated(gate.clone(), vec![]);
    let coordinator = Arc::new(harness.mount(&script));

    let task = tokio::spawn({
      let coordinator = coordinator.clone();
      async move { coordinator.ensure().await }
    });
    eventually(|| script.calls() == 1).await;
    assert!(coordinator.state().loading);

    gate.notify_one();
    assert_eq!(task.await.unwrap(), FetchOutcome::Committed);
    assert!(!coordinator.state().loading);
  }

  #[tokio::test]
  async fn test_quiet_refresh_does_not_set_loading() {
    let harness = Harness::signed_in("u1");
    let gate = Arc::new(Notify::new());
    let script = Script::gated(gate.clone(), vec![]);
    let coordinator = Arc::new(harness.mount(&script));

    let task = tokio::spawn({
      let coordinator = coordinator.clone();
      async move { coordinator.refresh(false).await }
    });
    eventually(|| script.calls() == 1).await;
    assert!(!coordinator.state().loading);

    gate.notify_one();
    task.await.unwrap();
  }

  #[tokio::test]
  async fn test_failure_leaves_cache_untouched() {
    let harness = Harness::signed_in("u1");
    let cache = harness.registry.cache::<Category>();
    cache.set_fetched_data(vec![category("a"), category("b")], Identity::new("u1"));
    let before = cache.get();

    let script = Script::with_results(vec![Err(transport_error())]);
    let coordinator = harness.mount(&script);

    assert_eq!(
      coordinator.refresh(true).await,
      FetchOutcome::Failed(transport_error())
    );
    assert_eq!(cache.get(), before);
    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.error, Some(transport_error()));
    assert!(!snapshot.loading);
    assert_eq!(snapshot.data.len(), 2);
  }

  #[tokio::test]
  async fn test_validation_failure_leaves_cache_untouched() {
    let harness = Harness::signed_in("u1");
    let cache = harness.registry.cache::<Category>();
    cache.set_fetched_data(vec![category("a")], Identity::new("u1"));
    let before = cache.get();

    let invalid = FetchError::Validation {
      collection: "categories".to_string(),
      index: 0,
      message: "missing field `name`".to_string(),
    };
    let script = Script::with_results(vec![Err(invalid.clone())]);
    let coordinator = harness.mount(&script);

    coordinator.refresh(true).await;

    assert_eq!(cache.get(), before);
    assert_eq!(coordinator.state().error, Some(invalid));
  }

  #[tokio::test]
  async fn test_error_is_cleared_by_next_successful_fetch() {
    let harness = Harness::signed_in("u1");
    let script = Script::with_results(vec![Err(transport_error()), Ok(vec![category("a")])]);
    let coordinator = harness.mount(&script);

    coordinator.ensure().await;
    assert!(coordinator.state().error.is_some());

    assert_eq!(coordinator.refresh(true).await, FetchOutcome::Committed);
    assert_eq!(coordinator.state().error, None);
  }

  #[tokio::test]
  async fn test_cancellation_is_not_an_error() {
    let harness = Harness::signed_in("u1");
    let cancelled = FetchError::Cancelled {
      collection: "categories".to_string(),
    };
    let script = Script::with_results(vec![Err(cancelled)]);
    let coordinator = harness.mount(&script);

    assert_eq!(coordinator.ensure().await, FetchOutcome::Cancelled);
    assert_eq!(coordinator.state(), FetchState::default());
    assert_eq!(
      harness.registry.cache::<Category>().get(),
      crate::cache::CacheEntry::empty()
    );
  }

  #[tokio::test]
  async fn test_refresh_bypasses_fresh_cache() {
    let harness = Harness::signed_in("u1");
    harness
      .registry
      .cache::<Category>()
      .set_fetched_data(vec![category("old")], Identity::new("u1"));
    let script = Script::with_results(vec![Ok(vec![category("new")])]);
    let coordinator = harness.mount(&script);

    assert_eq!(coordinator.refresh(true).await, FetchOutcome::Committed);
    assert_eq!(script.calls(), 1);
    assert_eq!(coordinator.snapshot().data[0].id, "new");
  }

  #[tokio::test]
  async fn test_unmount_does_not_cancel_pending_fetch() {
    let harness = Harness::signed_in("u1");
    let gate = Arc::new(Notify::new());
    let script = Script::gated(gate.clone(), vec![Ok(vec![category("late")])]);
    let coordinator = harness.mount(&script);

    // The caller gives up waiting, then the consumer goes away
    let waited = tokio::time::timeout(Duration::from_millis(20), coordinator.ensure()).await;
    assert!(waited.is_err());
    assert_eq!(script.calls(), 1);
    coordinator.unmount();

    gate.notify_one();
    let cache = harness.registry.cache::<Category>();
    eventually(|| !cache.get().data().is_empty()).await;
    assert_eq!(cache.get().data()[0].id, "late");
  }

  #[tokio::test]
  async fn test_slow_fetch_from_previous_identity_cannot_overwrite() {
    let harness = Harness::signed_in("u1");
    let gate = Arc::new(Notify::new());
    let slow = Script::gated(gate.clone(), vec![Ok(vec![category("from-u1")])]);
    let fast = Script::with_results(vec![Ok(vec![category("from-u2")])]);
    let slow_coordinator = Arc::new(harness.mount(&slow));
    let fast_coordinator = harness.mount(&fast);

    let task = tokio::spawn({
      let coordinator = slow_coordinator.clone();
      async move { coordinator.ensure().await }
    });
    eventually(|| slow.calls() == 1).await;

    harness.session.sign_in(Identity::new("u2"));
    assert_eq!(fast_coordinator.ensure().await, FetchOutcome::Committed);

    gate.notify_one();
    assert_eq!(task.await.unwrap(), FetchOutcome::Superseded);

    let entry = harness.registry.cache::<Category>().get();
    assert_eq!(entry.data()[0].id, "from-u2");
    assert_eq!(entry.fetched_by(), Some(&Identity::new("u2")));
  }

  #[tokio::test]
  async fn test_mutations_patch_cache_and_keep_provenance() {
    let harness = Harness::signed_in("u1");
    let cache = harness.registry.cache::<Category>();
    cache.set_fetched_data(vec![category("a"), category("b")], Identity::new("u1"));
    let provenance = cache.get().provenance().cloned();
    let coordinator = harness.mount(&Script::with_results(vec![]));

    coordinator.create(async { Ok(category("c")) }).await.unwrap();
    assert_eq!(cache.get().data()[0].id, "c");

    let mut renamed = category("a");
    renamed.name = "Groceries".to_string();
    coordinator.update(async { Ok(renamed) }).await.unwrap();
    assert_eq!(cache.get().data()[1].name, "Groceries");

    coordinator.delete("b", async { Ok(()) }).await.unwrap();
    let ids: Vec<_> = cache.get().data().iter().map(|c| c.id.clone()).collect();
    assert_eq!(ids, vec!["c", "a"]);
    assert_eq!(cache.get().provenance().cloned(), provenance);
  }

  #[tokio::test]
  async fn test_failed_mutation_leaves_cache_unchanged() {
    let harness = Harness::signed_in("u1");
    let cache = harness.registry.cache::<Category>();
    cache.set_fetched_data(vec![category("a")], Identity::new("u1"));
    let before = cache.get();
    let coordinator = harness.mount(&Script::with_results(vec![]));

    let result = coordinator.delete("a", async { Err(transport_error()) }).await;

    assert_eq!(result, Err(transport_error()));
    assert_eq!(cache.get(), before);
  }

  #[tokio::test]
  async fn test_late_failure_from_previous_identity_is_not_reported() {
    let harness = Harness::signed_in("u1");
    let gate = Arc::new(Notify::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let coordinator = Arc::new(FetchCoordinator::new(
      harness.registry.cache::<Category>(),
      harness.session.subscribe(),
      {
        let gate = gate.clone();
        let calls = calls.clone();
        move || {
          let gate = gate.clone();
          let call = calls.fetch_add(1, Ordering::SeqCst);
          async move {
            if call == 0 {
              gate.notified().await;
              Err(FetchError::Transport {
                collection: "categories".to_string(),
                status: Some(500),
                message: "old u1 failure".to_string(),
              })
            } else {
              Ok(vec![category("for-u2")])
            }
          }
        }
      },
    ));

    let slow = tokio::spawn({
      let coordinator = coordinator.clone();
      async move { coordinator.ensure().await }
    });
    eventually(|| calls.load(Ordering::SeqCst) == 1).await;

    harness.session.sign_in(Identity::new("u2"));
    assert_eq!(coordinator.ensure().await, FetchOutcome::Committed);
    assert_eq!(coordinator.state(), FetchState::default());

    gate.notify_one();
    assert!(matches!(slow.await.unwrap(), FetchOutcome::Failed(_)));

    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.error, None);
    assert!(!snapshot.loading);
    assert!(snapshot.fetched);
    assert_eq!(snapshot.data.len(), 1);
  }

  #[tokio::test]
  async fn test_watch_identity_fetches_on_every_change() {
    let harness = Harness::new();
    let script = Script::with_results(vec![]);
    let coordinator = Arc::new(harness.mount(&script));

    let watcher = tokio::spawn({
      let coordinator = coordinator.clone();
      async move { coordinator.watch_identity().await }
    });

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(script.calls(), 0);

    harness.session.sign_in(Identity::new("u1"));
    eventually(|| script.calls() == 1).await;

    harness.session.sign_in(Identity::new("u2"));
    eventually(|| script.calls() == 2).await;

    watcher.abort();
  }
}
