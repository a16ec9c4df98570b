//! Structured filters for entity collections.
//!
//! A [`FilterSpec`] is compiled into a backend query expression by
//! [`compile`], and applied to an already-fetched collection by
//! [`evaluate`]. Both sides implement the same per-dimension semantics, so a
//! collection narrowed in memory matches what the backend would have returned
//! for the compiled expression.

mod compiler;
mod evaluator;

pub use compiler::{build, compile, escape_keyword, Clause, CompareOp, Literal, QueryExpression};
pub use evaluator::{evaluate, matches, Filterable};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Calendar-date format used for every date literal in a query expression.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Optional-field filter. A missing field means "no constraint on this dimension".
///
/// `price_from <= price_to` is not enforced; an inverted range simply selects
/// nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub start_date: Option<NaiveDate>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub end_date: Option<NaiveDate>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub categories: Option<Vec<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub payment_methods: Option<Vec<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub price_from: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub price_to: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub keyword: Option<String>,
}

impl FilterSpec {
  /// True if no dimension would contribute a clause.
  pub fn is_empty(&self) -> bool {
    build(self, &FieldMap::transactions()).is_empty()
  }

  /// Id set for the category dimension, `None` when absent or empty.
  pub(crate) fn category_set(&self) -> Option<&[String]> {
    non_empty(self.categories.as_deref())
  }

  /// Id set for the payment-method dimension, `None` when absent or empty.
  pub(crate) fn payment_method_set(&self) -> Option<&[String]> {
    non_empty(self.payment_methods.as_deref())
  }

  /// Lower price bound, ignoring non-finite values.
  pub(crate) fn lower_price(&self) -> Option<f64> {
    self.price_from.filter(|p| p.is_finite())
  }

  /// Upper price bound, ignoring non-finite values.
  pub(crate) fn upper_price(&self) -> Option<f64> {
    self.price_to.filter(|p| p.is_finite())
  }

  /// The keyword trimmed, `None` when it is blank.
  pub(crate) fn search_keyword(&self) -> Option<&str> {
    trimmed(self.keyword.as_deref())
  }
}

/// Backend field names that back each filter dimension for one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMap {
  pub date: String,
  pub category: String,
  pub payment_method: String,
  pub price: String,
  /// The two text fields searched by the keyword clause.
  pub text: [String; 2],
}

impl FieldMap {
  pub fn new(
    date: impl Into<String>,
    category: impl Into<String>,
    payment_method: impl Into<String>,
    price: impl Into<String>,
    text: [&str; 2],
  ) -> Self {
    Self {
      date: date.into(),
      category: category.into(),
      payment_method: payment_method.into(),
      price: price.into(),
      text: text.map(String::from),
    }
  }

  pub fn transactions() -> Self {
    Self::new(
      "processed_at",
      "category",
      "payment_method",
      "transfer_amount",
      ["receiver", "information"],
    )
  }

  pub fn subscriptions() -> Self {
    Self::new(
      "next_execution",
      "category",
      "payment_method",
      "transfer_amount",
      ["receiver", "information"],
    )
  }
}

fn non_empty(ids: Option<&[String]>) -> Option<&[String]> {
  ids.filter(|ids| !ids.is_empty())
}

pub(crate) fn trimmed(keyword: Option<&str>) -> Option<&str> {
  keyword.map(str::trim).filter(|k| !k.is_empty())
}
