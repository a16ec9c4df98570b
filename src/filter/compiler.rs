//! Filter compiler: [`FilterSpec`] -> backend query expression.
//!
//! The backend grammar is a flat conjunction of clauses joined by `&&`:
//! comparisons (`field >= "value"`), set membership as a parenthesized
//! OR-of-equalities, and substring search as `(a~'%kw%' || b~'%kw%')`.
//! Clauses are always emitted in the same order so that compiled strings can
//! be compared literally.

use chrono::NaiveDate;
use std::fmt;

use super::{FieldMap, FilterSpec, DATE_FORMAT};

/// Comparison operator of a [`Clause::Compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
  Gte,
  Lte,
}

impl CompareOp {
  pub fn as_str(&self) -> &'static str {
    match self {
      CompareOp::Gte => ">=",
      CompareOp::Lte => "<=",
    }
  }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
  /// Rendered quoted, as `yyyy-MM-dd`
  Date(NaiveDate),
  /// Rendered as an unquoted numeric literal
  Number(f64),
}

impl fmt::Display for Literal {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Literal::Date(date) => write!(f, "\"{}\"", date.format(DATE_FORMAT)),
      Literal::Number(n) => write!(f, "{}", n),
    }
  }
}

/// One self-contained boolean condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
  Compare {
    field: String,
    op: CompareOp,
    value: Literal,
  },
  /// `field` equals any of `ids`. Never constructed with an empty id list.
  AnyOf { field: String, ids: Vec<String> },
  /// Case-insensitive substring match of `keyword` against either field.
  Contains { fields: [String; 2], keyword: String },
}

impl fmt::Display for Clause {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Clause::Compare { field, op, value } => write!(f, "{} {} {}", field, op.as_str(), value),
      Clause::AnyOf { field, ids } => {
        let alternatives: Vec<String> = ids
          .iter()
          .map(|id| format!("{} = \"{}\"", field, id))
          .collect();
        write!(f, "({})", alternatives.join(" || "))
      }
      Clause::Contains { fields, keyword } => {
        let escaped = escape_keyword(keyword);
        write!(
          f,
          "({}~'%{}%' || {}~'%{}%')",
          fields[0], escaped, fields[1], escaped
        )
      }
    }
  }
}

/// An ordered conjunction of clauses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryExpression {
  clauses: Vec<Clause>,
}

impl QueryExpression {
  pub fn clauses(&self) -> &[Clause] {
    &self.clauses
  }

  pub fn is_empty(&self) -> bool {
    self.clauses.is_empty()
  }
}

impl fmt::Display for QueryExpression {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, clause) in self.clauses.iter().enumerate() {
      if i > 0 {
        f.write_str(" && ")?;
      }
      write!(f, "{}", clause)?;
    }
    Ok(())
  }
}

/// Escape embedded double quotes for interpolation into a keyword clause.
///
/// Single quotes are not escaped: a keyword containing `'` closes the
/// `~'%...%'` literal early and leaves the expression unterminated.
pub fn escape_keyword(keyword: &str) -> String {
  keyword.replace('"', "\\\"")
}

/// Build the clause list for `spec`, using the entity field names in `fields`.
///
/// Order: start date, end date, categories, payment methods, lower price,
/// upper price, keyword.
pub fn build(spec: &FilterSpec, fields: &FieldMap) -> QueryExpression {
  let mut clauses = Vec::new();

  if let Some(start) = spec.start_date {
    clauses.push(Clause::Compare {
      field: fields.date.clone(),
      op: CompareOp::Gte,
      value: Literal::Date(start),
    });
  }
  if let Some(end) = spec.end_date {
    clauses.push(Clause::Compare {
      field: fields.date.clone(),
      op: CompareOp::Lte,
      value: Literal::Date(end),
    });
  }
  if let Some(ids) = spec.category_set() {
    clauses.push(Clause::AnyOf {
      field: fields.category.clone(),
      ids: ids.to_vec(),
    });
  }
  if let Some(ids) = spec.payment_method_set() {
    clauses.push(Clause::AnyOf {
      field: fields.payment_method.clone(),
      ids: ids.to_vec(),
    });
  }
  if let Some(from) = spec.lower_price() {
    clauses.push(Clause::Compare {
      field: fields.price.clone(),
      op: CompareOp::Gte,
      value: Literal::Number(from),
    });
  }
  if let Some(to) = spec.upper_price() {
    clauses.push(Clause::Compare {
      field: fields.price.clone(),
      op: CompareOp::Lte,
      value: Literal::Number(to),
    });
  }
  if let Some(keyword) = spec.search_keyword() {
    clauses.push(Clause::Contains {
      fields: fields.text.clone(),
      keyword: keyword.to_string(),
    });
  }

  QueryExpression { clauses }
}

/// Compile `spec` into the backend query string. An empty string means "no filter".
pub fn compile(spec: &FilterSpec, fields: &FieldMap) -> String {
  build(spec, fields).to_string()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  #[test]
  fn test_empty_spec_compiles_to_empty_string() {
    assert_eq!(compile(&FilterSpec::default(), &FieldMap::transactions()), "");
    assert_eq!(compile(&FilterSpec::default(), &FieldMap::subscriptions()), "");
  }

  #[test]
  fn test_start_date_uses_mapped_field() {
    let spec = FilterSpec {
      start_date: Some(date(2022, 1, 1)),
      ..Default::default()
    };
    assert_eq!(
      compile(&spec, &FieldMap::transactions()),
      r#"processed_at >= "2022-01-01""#
    );
    assert_eq!(
      compile(&spec, &FieldMap::subscriptions()),
      r#"next_execution >= "2022-01-01""#
    );
  }

  #[test]
  fn test_categories_render_as_or_of_equalities() {
    let spec = FilterSpec {
      categories: Some(vec!["a".to_string(), "b".to_string()]),
      ..Default::default()
    };
    assert_eq!(
      compile(&spec, &FieldMap::transactions()),
      r#"(category = "a" || category = "b")"#
    );
  }

  #[test]
  fn test_empty_id_sets_emit_no_clause() {
    let spec = FilterSpec {
      categories: Some(vec![]),
      payment_methods: Some(vec![]),
      ..Default::default()
    };
    assert_eq!(compile(&spec, &FieldMap::transactions()), "");
  }

  #[test]
  fn test_keyword_is_escaped_and_wrapped() {
    let spec = FilterSpec {
      keyword: Some(r#"John "Doe""#.to_string()),
      ..Default::default()
    };
    assert_eq!(
      compile(&spec, &FieldMap::transactions()),
      r#"(receiver~'%John \"Doe\"%' || information~'%John \"Doe\"%')"#
    );
  }

  #[test]
  fn test_blank_keyword_emits_no_clause() {
    let spec = FilterSpec {
      keyword: Some("  \t ".to_string()),
      ..Default::default()
    };
    assert_eq!(compile(&spec, &FieldMap::transactions()), "");
  }

  #[test]
  fn test_keyword_is_trimmed() {
    let spec = FilterSpec {
      keyword: Some("  rent ".to_string()),
      ..Default::default()
    };
    assert_eq!(
      compile(&spec, &FieldMap::transactions()),
      "(receiver~'%rent%' || information~'%rent%')"
    );
  }

  #[test]
  fn test_single_quote_is_passed_through() {
    let spec = FilterSpec {
      keyword: Some("O'Brien".to_string()),
      ..Default::default()
    };
    assert_eq!(
      compile(&spec, &FieldMap::transactions()),
      "(receiver~'%O'Brien%' || information~'%O'Brien%')"
    );
    assert_eq!(escape_keyword("O'Brien"), "O'Brien");
  }

  #[test]
  fn test_prices_are_unquoted_numbers() {
    let spec = FilterSpec {
      price_from: Some(10.0),
      price_to: Some(99.5),
      ..Default::default()
    };
    assert_eq!(
      compile(&spec, &FieldMap::transactions()),
      "transfer_amount >= 10 && transfer_amount <= 99.5"
    );
  }

  #[test]
  fn test_inverted_price_range_still_compiles() {
    let spec = FilterSpec {
      price_from: Some(50.0),
      price_to: Some(5.0),
      ..Default::default()
    };
    assert_eq!(
      compile(&spec, &FieldMap::transactions()),
      "transfer_amount >= 50 && transfer_amount <= 5"
    );
  }

  #[test]
  fn test_all_fields_in_fixed_order() {
    let spec = FilterSpec {
      keyword: Some("shop".to_string()),
      price_to: Some(100.0),
      price_from: Some(1.0),
      payment_methods: Some(vec!["pm1".to_string()]),
      categories: Some(vec!["c1".to_string(), "c2".to_string()]),
      end_date: Some(date(2022, 12, 31)),
      start_date: Some(date(2022, 1, 1)),
    };
    let expected = [
      r#"processed_at >= "2022-01-01""#,
      r#"processed_at <= "2022-12-31""#,
      r#"(category = "c1" || category = "c2")"#,
      r#"(payment_method = "pm1")"#,
      "transfer_amount >= 1",
      "transfer_amount <= 100",
      "(receiver~'%shop%' || information~'%shop%')",
    ]
    .join(" && ");
    assert_eq!(compile(&spec, &FieldMap::transactions()), expected);
    assert_eq!(build(&spec, &FieldMap::transactions()).clauses().len(), 7);
  }

  #[test]
  fn test_custom_field_map() {
    let fields = FieldMap::new("booked_on", "cat", "pm", "amount", ["payee", "memo"]);
    let spec = FilterSpec {
      end_date: Some(date(2023, 2, 28)),
      keyword: Some("x".to_string()),
      ..Default::default()
    };
    assert_eq!(
      compile(&spec, &fields),
      r#"booked_on <= "2023-02-28" && (payee~'%x%' || memo~'%x%')"#
    );
  }
}
