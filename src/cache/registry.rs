use std::sync::Arc;
use tracing::info;

use super::{Entity, EntityCache};
use crate::entities::{Budget, Category, MonthlyBalance, PaymentMethod, Subscription, Transaction};

/// One cache per entity type, created once at startup and passed by reference
/// to everything that reads or fetches entity collections.
#[derive(Default)]
pub struct CacheRegistry {
  pub(crate) transactions: Arc<EntityCache<Transaction>>,
  pub(crate) subscriptions: Arc<EntityCache<Subscription>>,
  pub(crate) categories: Arc<EntityCache<Category>>,
  pub(crate) payment_methods: Arc<EntityCache<PaymentMethod>>,
  pub(crate) budgets: Arc<EntityCache<Budget>>,
  pub(crate) monthly_balances: Arc<EntityCache<MonthlyBalance>>,
}

impl CacheRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// The cache for entity type `T`.
  pub fn cache<T: Entity>(&self) -> Arc<EntityCache<T>> {
    Arc::clone(T::cache(self))
  }

  /// Reset every cache to its initial empty entry. Called on sign-out.
  pub fn clear_all(&self) {
    self.transactions.clear();
    self.subscriptions.clear();
    self.categories.clear();
    self.payment_methods.clear();
    self.budgets.clear();
    self.monthly_balances.clear();
    info!("cleared all entity caches");
  }
}
