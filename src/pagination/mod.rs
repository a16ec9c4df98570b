//! Table pagination: a small reducer over `{page, rows_per_page}`, the slice
//! derivation, and clamping against the size of the collection.

mod binding;

pub use binding::{PageBinding, UrlBinding, PAGE_PARAM, ROWS_PER_PAGE_PARAM};

use thiserror::Error;
use tracing::error;

/// A programming-contract breach. Callers are expected to surface it loudly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invariant violation: {0}")]
pub struct InvariantViolation(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationState {
  pub page: usize,
  pub rows_per_page: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationAction {
  ChangePage(usize),
  /// Always resets the page to 0
  ChangeRowsPerPage(usize),
}

/// The fixed set of allowed page sizes. The first option is the default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
  options: Vec<usize>,
}

impl Pagination {
  pub fn new(options: Vec<usize>) -> Result<Self, InvariantViolation> {
    if options.is_empty() {
      return Err(violation("rows-per-page option set is empty"));
    }
    if options.contains(&0) {
      return Err(violation("rows-per-page options must be positive"));
    }
    Ok(Self { options })
  }

  pub fn options(&self) -> &[usize] {
    &self.options
  }

  pub fn default_rows_per_page(&self) -> usize {
    self.options[0]
  }

  pub fn is_allowed(&self, rows_per_page: usize) -> bool {
    self.options.contains(&rows_per_page)
  }

  pub fn initial(&self) -> PaginationState {
    PaginationState {
      page: 0,
      rows_per_page: self.default_rows_per_page(),
    }
  }

  /// Apply `action` to `state`.
  ///
  /// Fails if the action would leave `rows_per_page` outside the option set.
  pub fn reduce(
    &self,
    state: PaginationState,
    action: PaginationAction,
  ) -> Result<PaginationState, InvariantViolation> {
    match action {
      PaginationAction::ChangePage(page) => Ok(PaginationState { page, ..state }),
      PaginationAction::ChangeRowsPerPage(rows_per_page) => {
        if !self.is_allowed(rows_per_page) {
          return Err(violation(format!(
            "rows per page {} is not one of {:?}",
            rows_per_page, self.options
          )));
        }
        Ok(PaginationState {
          page: 0,
          rows_per_page,
        })
      }
    }
  }

  /// Clamp a requested state against a collection of `count` rows.
  pub fn clamp(&self, requested: PaginationState, count: usize) -> PaginationState {
    let rows_per_page = if self.is_allowed(requested.rows_per_page) {
      requested.rows_per_page
    } else {
      self.default_rows_per_page()
    };
    PaginationState {
      page: requested.page.min(last_page(count, rows_per_page)),
      rows_per_page,
    }
  }
}

/// `ceil(count / rows_per_page) - 1`; -1 for an empty collection.
pub fn max_page(count: usize, rows_per_page: usize) -> i64 {
  if rows_per_page == 0 {
    return -1;
  }
  count.div_ceil(rows_per_page) as i64 - 1
}

/// The highest page that can actually be rendered, `max(max_page, 0)`.
pub fn last_page(count: usize, rows_per_page: usize) -> usize {
  max_page(count, rows_per_page).max(0) as usize
}

/// The rows shown on the state's page. Empty past the end of the collection.
pub fn slice<T>(collection: &[T], state: PaginationState) -> &[T] {
  let start = state
    .page
    .saturating_mul(state.rows_per_page)
    .min(collection.len());
  let end = start
    .saturating_add(state.rows_per_page)
    .min(collection.len());
  &collection[start..end]
}

fn violation(message: impl Into<String>) -> InvariantViolation {
  let message = message.into();
  error!(%message, "pagination invariant violated");
  InvariantViolation(message)
}
