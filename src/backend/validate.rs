use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::sync::FetchError;

/// Deserialize raw records into `T`, failing on the first record that does
/// not match.
pub fn validate<T: DeserializeOwned>(
  collection: &str,
  records: Vec<Value>,
) -> Result<Vec<T>, FetchError> {
  records
    .into_iter()
    .enumerate()
    .map(|(index, record)| parse(collection, index, record))
    .collect()
}

/// Deserialize a single record returned by a create or update call.
pub fn validate_one<T: DeserializeOwned>(collection: &str, record: Value) -> Result<T, FetchError> {
  parse(collection, 0, record)
}

fn parse<T: DeserializeOwned>(collection: &str, index: usize, record: Value) -> Result<T, FetchError> {
  serde_json::from_value(record).map_err(|e| FetchError::Validation {
    collection: collection.to_string(),
    index,
    message: e.to_string(),
  })
}
