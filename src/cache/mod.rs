//! Memory-resident entity caches.
//!
//! This module provides a per-entity cache that:
//! - Holds the last-known collection for one entity type
//! - Records when, and for which identity, the collection was fetched
//! - Orders writes from overlapping fetches by a monotonic generation ticket
//!
//! Nothing here performs I/O. Fetching is coordinated by [`crate::sync`].

mod entry;
mod registry;
mod store;
mod traits;

pub use entry::{CacheEntry, Provenance};
pub use registry::CacheRegistry;
pub use store::{EntityCache, FetchTicket};
pub use traits::Entity;
