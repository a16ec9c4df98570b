//! Domain record types and their cache / filter wiring.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::cache::{CacheRegistry, Entity, EntityCache};
use crate::filter::{FieldMap, Filterable, DATE_FORMAT};

/// A booked transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
  pub id: String,
  #[serde(default)]
  pub owner: String,
  pub processed_at: Timestamp,
  pub receiver: String,
  #[serde(default)]
  pub information: String,
  /// Category id, empty when unset
  #[serde(default)]
  pub category: String,
  /// Payment method id, empty when unset
  #[serde(default)]
  pub payment_method: String,
  pub transfer_amount: f64,
}

/// A recurring transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
  pub id: String,
  #[serde(default)]
  pub owner: String,
  pub receiver: String,
  #[serde(default)]
  pub information: String,
  #[serde(default)]
  pub category: String,
  #[serde(default)]
  pub payment_method: String,
  pub transfer_amount: f64,
  /// Day of the month the subscription is executed on
  pub execute_at: u32,
  pub next_execution: Timestamp,
  #[serde(default)]
  pub paused: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
  pub id: String,
  #[serde(default)]
  pub owner: String,
  pub name: String,
  #[serde(default)]
  pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethod {
  pub id: String,
  #[serde(default)]
  pub owner: String,
  pub name: String,
  #[serde(default)]
  pub provider: Option<String>,
  #[serde(default)]
  pub address: Option<String>,
  #[serde(default)]
  pub description: Option<String>,
}

/// Monthly spending limit for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
  pub id: String,
  #[serde(default)]
  pub owner: String,
  #[serde(default)]
  pub label: Option<String>,
  pub category: String,
  pub budget: f64,
}

/// Income / expense totals for one month (`date` is `yyyy-MM`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyBalance {
  pub id: String,
  #[serde(default)]
  pub owner: String,
  pub date: String,
  pub balance: f64,
  #[serde(default)]
  pub income: f64,
  #[serde(default)]
  pub expenses: f64,
}

// ============================================================================
// Entity implementations
// ============================================================================

impl Entity for Transaction {
  const COLLECTION: &'static str = "transactions";
  const SORT: Option<&'static str> = Some("-processed_at");

  fn id(&self) -> &str {
    &self.id
  }

  fn cache(registry: &CacheRegistry) -> &Arc<EntityCache<Self>> {
    &registry.transactions
  }
}

impl Entity for Subscription {
  const COLLECTION: &'static str = "subscriptions";
  const SORT: Option<&'static str> = Some("execute_at");

  fn id(&self) -> &str {
    &self.id
  }

  fn cache(registry: &CacheRegistry) -> &Arc<EntityCache<Self>> {
    &registry.subscriptions
  }
}

impl Entity for Category {
  const COLLECTION: &'static str = "categories";
  const SORT: Option<&'static str> = Some("name");

  fn id(&self) -> &str {
    &self.id
  }

  fn cache(registry: &CacheRegistry) -> &Arc<EntityCache<Self>> {
    &registry.categories
  }
}

impl Entity for PaymentMethod {
  const COLLECTION: &'static str = "payment_methods";
  const SORT: Option<&'static str> = Some("name");

  fn id(&self) -> &str {
    &self.id
  }

  fn cache(registry: &CacheRegistry) -> &Arc<EntityCache<Self>> {
    &registry.payment_methods
  }
}

impl Entity for Budget {
  const COLLECTION: &'static str = "budgets";

  fn id(&self) -> &str {
    &self.id
  }

  fn cache(registry: &CacheRegistry) -> &Arc<EntityCache<Self>> {
    &registry.budgets
  }
}

impl Entity for MonthlyBalance {
  const COLLECTION: &'static str = "monthly_balances";
  const SORT: Option<&'static str> = Some("-date");

  fn id(&self) -> &str {
    &self.id
  }

  fn cache(registry: &CacheRegistry) -> &Arc<EntityCache<Self>> {
    &registry.monthly_balances
  }
}

// ============================================================================
// Filterable implementations
// ============================================================================

impl Filterable for Transaction {
  fn field_map() -> FieldMap {
    FieldMap::transactions()
  }

  fn filter_timestamp(&self) -> Option<&str> {
    Some(self.processed_at.as_str())
  }

  fn category_id(&self) -> Option<&str> {
    non_empty(&self.category)
  }

  fn payment_method_id(&self) -> Option<&str> {
    non_empty(&self.payment_method)
  }

  fn price(&self) -> f64 {
    self.transfer_amount
  }

  fn text_fields(&self) -> [&str; 2] {
    [&self.receiver, &self.information]
  }
}

impl Filterable for Subscription {
  fn field_map() -> FieldMap {
    FieldMap::subscriptions()
  }

  fn filter_timestamp(&self) -> Option<&str> {
    Some(self.next_execution.as_str())
  }

  fn category_id(&self) -> Option<&str> {
    non_empty(&self.category)
  }

  fn payment_method_id(&self) -> Option<&str> {
    non_empty(&self.payment_method)
  }

  fn price(&self) -> f64 {
    self.transfer_amount
  }

  fn text_fields(&self) -> [&str; 2] {
    [&self.receiver, &self.information]
  }
}

fn non_empty(id: &str) -> Option<&str> {
  Some(id).filter(|id| !id.is_empty())
}

// ============================================================================
// Display (one table row per record)
// ============================================================================

impl fmt::Display for Transaction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{}  {:<24} {:>10.2}  {}",
      self.processed_at, self.receiver, self.transfer_amount, self.information
    )
  }
}

impl fmt::Display for Subscription {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{}  {:<24} {:>10.2}  day {:>2}{}",
      self.next_execution,
      self.receiver,
      self.transfer_amount,
      self.execute_at,
      if self.paused { "  (paused)" } else { "" }
    )
  }
}

impl fmt::Display for Category {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:<24} {}", self.name, self.description.as_deref().unwrap_or(""))
  }
}

impl fmt::Display for PaymentMethod {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:<24} {}", self.name, self.provider.as_deref().unwrap_or(""))
  }
}

impl fmt::Display for Budget {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{:<24} {:>10.2}",
      self.label.as_deref().unwrap_or(&self.category),
      self.budget
    )
  }
}

impl fmt::Display for MonthlyBalance {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{}  {:>10.2}  (+{:.2} / -{:.2})",
      self.date, self.balance, self.income, self.expenses
    )
  }
}

/// A backend date or datetime (`2022-01-15` or `2022-01-15 10:30:00.000Z`).
///
/// The stored text is kept as-is, since the backend compares date filters
/// against it as text. The calendar date is parsed once for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp {
  raw: String,
  date: NaiveDate,
}

impl Timestamp {
  /// A timestamp stored as a bare calendar date.
  pub fn from_date(date: NaiveDate) -> Self {
    Self {
      raw: date.format(DATE_FORMAT).to_string(),
      date,
    }
  }

  pub fn as_str(&self) -> &str {
    &self.raw
  }

  pub fn date(&self) -> NaiveDate {
    self.date
  }
}

impl TryFrom<String> for Timestamp {
  type Error = String;

  fn try_from(raw: String) -> Result<Self, Self::Error> {
    let date_part = raw.get(..10).unwrap_or(&raw);
    let date = NaiveDate::parse_from_str(date_part, DATE_FORMAT)
      .map_err(|e| format!("invalid date '{}': {}", raw, e))?;
    Ok(Self { raw, date })
  }
}

impl From<Timestamp> for String {
  fn from(timestamp: Timestamp) -> Self {
    timestamp.raw
  }
}

impl fmt::Display for Timestamp {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.date.format(DATE_FORMAT))
  }
}
