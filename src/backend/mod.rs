//! The remote record store.
//!
//! [`Transport`] is the seam between the sync layer and the network: it moves
//! raw JSON records. Typed access goes through the helpers in this module,
//! which run every record through [`validate`] before it reaches a cache.

mod api_types;
mod pocketbase;
mod validate;

pub use pocketbase::PocketBaseClient;
pub use validate::{validate, validate_one};

use async_trait::async_trait;
use serde_json::Value;

use crate::cache::Entity;
use crate::sync::{FetchError, Identity};

/// Record store operations over raw JSON records.
///
/// An empty `filter` means "no filter parameter". Implementations must
/// reject a request that was cancelled on the client side with
/// [`FetchError::Cancelled`] so callers can tell it apart from a failure.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
  /// Exchange credentials for an identity.
  async fn authenticate(&self, email: &str, password: &str) -> Result<Identity, FetchError>;

  /// Every record of `collection` matching `filter`.
  async fn list(
    &self,
    collection: &str,
    filter: &str,
    sort: Option<&str>,
  ) -> Result<Vec<Value>, FetchError>;

  async fn create(&self, collection: &str, record: Value) -> Result<Value, FetchError>;

  async fn update(&self, collection: &str, id: &str, record: Value) -> Result<Value, FetchError>;

  async fn delete(&self, collection: &str, id: &str) -> Result<(), FetchError>;
}

/// List and validate a whole collection.
pub async fn fetch_all<T, B>(backend: &B, filter: &str) -> Result<Vec<T>, FetchError>
where
  T: Entity,
  B: Transport + ?Sized,
{
  let records = backend.list(T::COLLECTION, filter, T::SORT).await?;
  validate(T::COLLECTION, records)
}

pub async fn create<T, B>(backend: &B, record: &T) -> Result<T, FetchError>
where
  T: Entity,
  B: Transport + ?Sized,
{
  let body = to_body::<T>(record)?;
  let stored = backend.create(T::COLLECTION, body).await?;
  validate_one(T::COLLECTION, stored)
}

pub async fn update<T, B>(backend: &B, record: &T) -> Result<T, FetchError>
where
  T: Entity,
  B: Transport + ?Sized,
{
  let body = to_body::<T>(record)?;
  let stored = backend.update(T::COLLECTION, record.id(), body).await?;
  validate_one(T::COLLECTION, stored)
}

pub async fn delete<T, B>(backend: &B, id: &str) -> Result<(), FetchError>
where
  T: Entity,
  B: Transport + ?Sized,
{
  backend.delete(T::COLLECTION, id).await
}

fn to_body<T: Entity>(record: &T) -> Result<Value, FetchError> {
  serde_json::to_value(record).map_err(|e| FetchError::Validation {
    collection: T::COLLECTION.to_string(),
    index: 0,
    message: e.to_string(),
  })
}
