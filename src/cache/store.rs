//! Per-entity cache store.

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use super::CacheEntry;
use crate::sync::Identity;

/// Ticket handed to a fetch when it starts. Tickets are issued in increasing
/// order; a fetch may only commit if no later ticket has committed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FetchTicket(u64);

struct Slot<T> {
  entry: CacheEntry<T>,
  /// Highest ticket whose data is (or was superseded by) the current entry
  committed: u64,
}

/// Holds one [`CacheEntry`] for a single entity type.
///
/// The entry is only ever replaced whole: through [`set`](Self::set),
/// [`set_fetched_data`](Self::set_fetched_data), [`commit`](Self::commit) or
/// [`clear`](Self::clear).
pub struct EntityCache<T> {
  slot: Mutex<Slot<T>>,
  issued: AtomicU64,
}

impl<T> Default for EntityCache<T> {
  fn default() -> Self {
    Self {
      slot: Mutex::new(Slot {
        entry: CacheEntry::empty(),
        committed: 0,
      }),
      issued: AtomicU64::new(0),
    }
  }
}

impl<T: Clone> EntityCache<T> {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, Slot<T>> {
    // Every write replaces the entry whole, so a poisoned slot is still consistent.
    self.slot.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Snapshot of the current entry.
  pub fn get(&self) -> CacheEntry<T> {
    self.lock().entry.clone()
  }

  pub fn is_fresh_for(&self, identity: &Identity) -> bool {
    self.lock().entry.is_fresh_for(identity)
  }

  /// Replace the entry with `update(current)`, atomically.
  pub fn set(&self, update: impl FnOnce(&CacheEntry<T>) -> CacheEntry<T>) {
    let mut slot = self.lock();
    slot.entry = update(&slot.entry);
  }

  /// Store a fetched collection for `identity`, stamped now.
  ///
  /// Counts as newer than every fetch started so far.
  pub fn set_fetched_data(&self, data: Vec<T>, identity: Identity) {
    let mut slot = self.lock();
    slot.entry = CacheEntry::fetched(data, Utc::now(), identity);
    slot.committed = self.issued.load(Ordering::SeqCst);
  }

  /// Reset to the initial empty entry. Fetches already in flight can no
  /// longer commit.
  pub fn clear(&self) {
    let mut slot = self.lock();
    slot.entry = CacheEntry::empty();
    slot.committed = self.issued.load(Ordering::SeqCst);
  }

  /// Issue a ticket for a fetch that is about to start.
  pub fn begin_fetch(&self) -> FetchTicket {
    FetchTicket(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
  }

  /// Store the result of the fetch holding `ticket`, unless a fetch started
  /// later has already committed. Returns whether the data was stored.
  pub fn commit(&self, ticket: FetchTicket, data: Vec<T>, identity: Identity) -> bool {
    let mut slot = self.lock();
    if ticket.0 <= slot.committed {
      debug!(
        ticket = ticket.0,
        committed = slot.committed,
        "dropping superseded fetch result"
      );
      return false;
    }
    slot.entry = CacheEntry::fetched(data, Utc::now(), identity);
    slot.committed = ticket.0;
    true
  }
}
