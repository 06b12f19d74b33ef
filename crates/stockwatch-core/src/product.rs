//! Products as seen by the alerter: an identity, a display name and a stock
//! count. The catalogue itself is owned elsewhere; the core only reads it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of a catalogue product.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ProductId(pub i64);

impl fmt::Display for ProductId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.0.fmt(f)
  }
}

impl From<i64> for ProductId {
  fn from(id: i64) -> Self { Self(id) }
}

/// A snapshot of one product row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
  pub id:    ProductId,
  pub name:  String,
  /// Units on hand. Written through [`ProductCatalog`](crate::source::ProductCatalog).
  pub stock: u32,
}

impl Product {
  /// Whether this product counts as low stock for `threshold`. The
  /// comparison is inclusive: a product sitting exactly at the threshold is
  /// low.
  pub fn is_low(&self, threshold: u32) -> bool { self.stock <= threshold }
}
