use chrono::NaiveDate;
use std::cmp::Ordering;

use super::{trimmed, FieldMap, FilterSpec, DATE_FORMAT};

/// Records that can be narrowed in memory by a [`FilterSpec`].
///
/// Each accessor returns the value of the backend field that the entity's
/// [`FieldMap`] names for that dimension.
pub trait Filterable {
  /// Backend field names for this entity type
  fn field_map() -> FieldMap
  where
    Self: Sized;

  /// The date field as the backend stores it (`2022-01-15` or
  /// `2022-01-15 10:30:00.000Z`)
  fn filter_timestamp(&self) -> Option<&str>;

  fn category_id(&self) -> Option<&str>;

  fn payment_method_id(&self) -> Option<&str>;

  fn price(&self) -> f64;

  /// The two text fields, in [`FieldMap::text`] order
  fn text_fields(&self) -> [&str; 2];
}

/// Check a single record against every present dimension of `spec`.
pub fn matches<T: Filterable>(spec: &FilterSpec, record: &T) -> bool {
  if let Some(start) = spec.start_date {
    if !compare_date(record, start).is_some_and(Ordering::is_ge) {
      return false;
    }
  }
  if let Some(end) = spec.end_date {
    if !compare_date(record, end).is_some_and(Ordering::is_le) {
      return false;
    }
  }
  if let Some(ids) = spec.category_set() {
    if !in_set(record.category_id(), ids) {
      return false;
    }
  }
  if let Some(ids) = spec.payment_method_set() {
    if !in_set(record.payment_method_id(), ids) {
      return false;
    }
  }
  if let Some(from) = spec.lower_price() {
    if record.price() < from {
      return false;
    }
  }
  if let Some(to) = spec.upper_price() {
    if record.price() > to {
      return false;
    }
  }
  if let Some(keyword) = spec.search_keyword() {
    if !contains_keyword(record, keyword) {
      return false;
    }
  }
  true
}

/// Narrow `records` to those satisfying `spec` and, if given, the instant
/// search `keyword`. The input slice is never modified.
pub fn evaluate<'a, T: Filterable>(
  spec: &FilterSpec,
  keyword: Option<&str>,
  records: &'a [T],
) -> Vec<&'a T> {
  let keyword = trimmed(keyword);
  records
    .iter()
    .filter(|record| matches(spec, *record))
    .filter(|record| keyword.map_or(true, |k| contains_keyword(*record, k)))
    .collect()
}

/// Compares the stored text against the date literal, as the backend does.
/// A timestamp later in the day therefore sorts after its own date.
fn compare_date<T: Filterable>(record: &T, date: NaiveDate) -> Option<Ordering> {
  let literal = date.format(DATE_FORMAT).to_string();
  record
    .filter_timestamp()
    .map(|stored| stored.cmp(literal.as_str()))
}

fn in_set(id: Option<&str>, ids: &[String]) -> bool {
  id.is_some_and(|id| ids.iter().any(|candidate| candidate == id))
}

/// Case-insensitive for ASCII letters only, like the backend's `~` operator.
fn contains_keyword<T: Filterable>(record: &T, keyword: &str) -> bool {
  let needle = keyword.to_ascii_lowercase();
  record
    .text_fields()
    .iter()
    .any(|field| field.to_ascii_lowercase().contains(&needle))
}
