//! Mirrors pagination state into two URL query parameters.

use url::Url;

use super::{InvariantViolation, Pagination, PaginationAction, PaginationState};

pub const PAGE_PARAM: &str = "page";
pub const ROWS_PER_PAGE_PARAM: &str = "rpp";

/// Result of binding pagination to a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageBinding {
  /// The clamped state to render with
  pub state: PaginationState,
  /// Set when the address bar must be rewritten to stay consistent with `state`
  pub rewrite: Option<Url>,
}

#[derive(Debug, Clone)]
pub struct UrlBinding {
  pagination: Pagination,
}

impl UrlBinding {
  pub fn new(pagination: Pagination) -> Self {
    Self { pagination }
  }

  pub fn pagination(&self) -> &Pagination {
    &self.pagination
  }

  /// Read `page` / `rpp` from `url` and clamp them for a collection of `count` rows.
  ///
  /// Missing parameters take their defaults silently. A supplied value that
  /// does not survive clamping unchanged (including one that fails to parse)
  /// produces a rewritten URL carrying the clamped state.
  pub fn read(&self, url: &Url, count: usize) -> PageBinding {
    let raw_page = param(url, PAGE_PARAM);
    let raw_rows = param(url, ROWS_PER_PAGE_PARAM);

    let requested = PaginationState {
      page: raw_page
        .as_deref()
        .and_then(|p| p.parse().ok())
        .unwrap_or(0),
      rows_per_page: raw_rows
        .as_deref()
        .and_then(|r| r.parse().ok())
        .unwrap_or_else(|| self.pagination.default_rows_per_page()),
    };
    let state = self.pagination.clamp(requested, count);

    let changed = |raw: &Option<String>, value: usize| {
      raw
        .as_deref()
        .is_some_and(|raw| raw != value.to_string())
    };
    let rewrite = if changed(&raw_page, state.page) || changed(&raw_rows, state.rows_per_page) {
      tracing::debug!(
        page = state.page,
        rows_per_page = state.rows_per_page,
        "clamped pagination parameters"
      );
      Some(self.write(url, state))
    } else {
      None
    };

    PageBinding { state, rewrite }
  }

  /// Write `state` into `url`, keeping every other query parameter.
  pub fn write(&self, url: &Url, state: PaginationState) -> Url {
    let others: Vec<(String, String)> = url
      .query_pairs()
      .filter(|(key, _)| key != PAGE_PARAM && key != ROWS_PER_PAGE_PARAM)
      .map(|(key, value)| (key.into_owned(), value.into_owned()))
      .collect();

    let mut out = url.clone();
    out
      .query_pairs_mut()
      .clear()
      .extend_pairs(others)
      .append_pair(PAGE_PARAM, &state.page.to_string())
      .append_pair(ROWS_PER_PAGE_PARAM, &state.rows_per_page.to_string());
    out
  }

  /// Apply a pagination action to the state carried by `url`.
  pub fn dispatch(
    &self,
    url: &Url,
    count: usize,
    action: PaginationAction,
  ) -> Result<PageBinding, InvariantViolation> {
    let current = self.read(url, count).state;
    let next = self.pagination.reduce(current, action)?;
    let state = self.pagination.clamp(next, count);
    Ok(PageBinding {
      state,
      rewrite: Some(self.write(url, state)),
    })
  }
}

fn param(url: &Url, name: &str) -> Option<String> {
  url
    .query_pairs()
    .find(|(key, _)| key == name)
    .map(|(_, value)| value.into_owned())
}
