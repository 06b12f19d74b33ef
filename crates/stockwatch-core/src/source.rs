//! Catalogue and manager-profile collaborators.

use std::{convert::Infallible, future::Future};

use serde::{Deserialize, Serialize};

use crate::product::{Product, ProductId};

// ─── Product catalogue ───────────────────────────────────────────────────────

/// Read access to current product stock.
pub trait ProductSource: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Every product whose stock is `<= threshold`.
  fn list_products_at_or_below(
    &self,
    threshold: u32,
  ) -> impl Future<Output = Result<Vec<Product>, Self::Error>> + Send + '_;

  /// Current stock for one product, or `None` if it no longer exists.
  fn get_current_stock(
    &self,
    product_id: ProductId,
  ) -> impl Future<Output = Result<Option<u32>, Self::Error>> + Send + '_;
}

/// Write access to the catalogue, for backends that own it.
///
/// Stock changes arrive through here; callers are expected to run a check
/// after each successful write.
pub trait ProductCatalog: ProductSource {
  /// Insert `product` or overwrite the name and stock of an existing one.
  fn upsert_product(
    &self,
    product: Product,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Overwrite the stock of an existing product. Returns `false` when the
  /// product does not exist.
  fn set_stock(
    &self,
    product_id: ProductId,
    stock: u32,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Remove a product. Its alert history is kept. Returns `false` when the
  /// product does not exist.
  fn remove_product(
    &self,
    product_id: ProductId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// The whole catalogue, ordered by id.
  fn list_products(&self) -> impl Future<Output = Result<Vec<Product>, Self::Error>> + Send + '_;
}

// ─── Manager profile ─────────────────────────────────────────────────────────

/// The slice of the manager profile the alerter cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertConfig {
  pub threshold: u32,
  /// Notification destination, passed to the transport unchanged.
  pub target:    String,
  pub enabled:   bool,
}

/// Where the current [`AlertConfig`] comes from.
pub trait ProfileSource: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The configured alert settings, or `None` when no manager profile exists.
  fn alert_config(
    &self,
  ) -> impl Future<Output = Result<Option<AlertConfig>, Self::Error>> + Send + '_;
}

/// A fixed profile, typically read from the local config file.
#[derive(Debug, Clone)]
pub struct StaticProfile(pub Option<AlertConfig>);

impl ProfileSource for StaticProfile {
  type Error = Infallible;

  async fn alert_config(&self) -> Result<Option<AlertConfig>, Infallible> {
    Ok(self.0.clone())
  }
}
