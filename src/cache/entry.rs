use chrono::{DateTime, Utc};

use super::Entity;
use crate::sync::Identity;

/// When, and for whom, a collection was fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
  pub fetched_at: DateTime<Utc>,
  pub fetched_by: Identity,
}

/// The last-known collection for one entity type.
///
/// `fetched_at` and `fetched_by` are carried together in [`Provenance`], so an
/// entry can never have one without the other.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
  data: Vec<T>,
  provenance: Option<Provenance>,
}

impl<T> Default for CacheEntry<T> {
  fn default() -> Self {
    Self::empty()
  }
}

impl<T> CacheEntry<T> {
  /// The initial entry: no data, never fetched.
  pub fn empty() -> Self {
    Self {
      data: Vec::new(),
      provenance: None,
    }
  }

  pub fn fetched(data: Vec<T>, fetched_at: DateTime<Utc>, fetched_by: Identity) -> Self {
    Self {
      data,
      provenance: Some(Provenance {
        fetched_at,
        fetched_by,
      }),
    }
  }

  pub fn data(&self) -> &[T] {
    &self.data
  }

  pub fn into_data(self) -> Vec<T> {
    self.data
  }

  pub fn provenance(&self) -> Option<&Provenance> {
    self.provenance.as_ref()
  }

  pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
    self.provenance.as_ref().map(|p| p.fetched_at)
  }

  pub fn fetched_by(&self) -> Option<&Identity> {
    self.provenance.as_ref().map(|p| &p.fetched_by)
  }

  /// Populated for `identity`. Freshness never expires with time.
  pub fn is_fresh_for(&self, identity: &Identity) -> bool {
    self.fetched_by() == Some(identity) && !self.data.is_empty()
  }

  /// Same provenance, different collection.
  pub fn with_data(&self, data: Vec<T>) -> Self {
    Self {
      data,
      provenance: self.provenance.clone(),
    }
  }
}

impl<T: Entity> CacheEntry<T> {
  /// Replace the record with the same id, or prepend it if it is new.
  pub fn upserted(&self, record: T) -> Self {
    let mut data = self.data.clone();
    match data.iter().position(|r| r.id() == record.id()) {
      Some(idx) => data[idx] = record,
      None => data.insert(0, record),
    }
    self.with_data(data)
  }

  /// Drop the record with `id`.
  pub fn without(&self, id: &str) -> Self {
    let data = self.data.iter().filter(|r| r.id() != id).cloned().collect();
    self.with_data(data)
  }
}
