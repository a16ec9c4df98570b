use thiserror::Error;

/// Why a fetch did not produce a collection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
  /// Network or backend failure. Retryable through `refresh()`.
  #[error("failed to load {collection}: {message}")]
  Transport {
    collection: String,
    status: Option<u16>,
    message: String,
  },

  /// The backend answered, but a record did not match the expected shape.
  #[error("invalid {collection} record at index {index}: {message}")]
  Validation {
    collection: String,
    index: usize,
    message: String,
  },

  /// The request was cancelled on the client side. Never shown to the user.
  #[error("request for {collection} was cancelled")]
  Cancelled { collection: String },
}

impl FetchError {
  pub fn is_cancelled(&self) -> bool {
    matches!(self, FetchError::Cancelled { .. })
  }

  /// Short label for log fields
  pub fn kind(&self) -> &'static str {
    match self {
      FetchError::Transport { .. } => "transport",
      FetchError::Validation { .. } => "validation",
      FetchError::Cancelled { .. } => "cancelled",
    }
  }
}
