//! Serde types matching the record store's HTTP API.
//!
//! Records themselves stay as raw JSON here; they are typed later by
//! [`super::validate`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Record list endpoint
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiListResponse {
  #[serde(default)]
  pub page: u32,
  #[serde(default)]
  pub per_page: u32,
  #[serde(default)]
  pub total_items: i64,
  #[serde(default)]
  pub total_pages: i64,
  #[serde(default)]
  pub items: Vec<Value>,
}

impl ApiListResponse {
  /// No pages left after this one.
  pub fn is_last(&self) -> bool {
    self.items.is_empty() || i64::from(self.page) >= self.total_pages
  }
}

// ============================================================================
// Password authentication
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ApiAuthRequest<'a> {
  pub identity: &'a str,
  pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ApiAuthRecord {
  pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiAuthResponse {
  pub token: String,
  pub record: ApiAuthRecord,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorResponse {
  #[serde(default)]
  pub code: u16,
  #[serde(default)]
  pub message: String,
}
