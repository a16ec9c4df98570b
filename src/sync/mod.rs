//! Keeps entity caches in sync with the backend.
//!
//! A [`FetchCoordinator`] binds one entity cache to a fetcher and to the
//! signed-in [`Identity`]. It decides when a fetch is needed, makes sure only
//! one fetch per coordinator is in flight, and turns failures into local
//! state instead of errors.

mod coordinator;
mod error;
mod session;

pub use coordinator::{FetchCoordinator, FetchOutcome, FetchSnapshot, FetchState, LoadFuture};
pub use error::FetchError;
pub use session::{Identity, Session};
