//! Error types for `stockwatch-core`.

use thiserror::Error;

/// A backend error carried across the core boundary without losing its
/// concrete type (reachable through [`std::error::Error::source`]).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  /// Missing or invalid notification target or threshold. Not retryable.
  #[error("configuration error: {0}")]
  Configuration(String),

  /// The alert ledger is unreachable or rejected a write.
  #[error("storage error: {0}")]
  Storage(#[source] BoxError),

  /// The product catalogue could not be read.
  #[error("product source error: {0}")]
  Products(#[source] BoxError),

  /// The manager profile service could not be read.
  #[error("profile source error: {0}")]
  Profile(#[source] BoxError),
}

impl Error {
  pub fn storage(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Storage(Box::new(e))
  }

  pub fn products(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Products(Box::new(e))
  }

  pub fn profile(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Profile(Box::new(e))
  }

  pub fn is_configuration(&self) -> bool {
    matches!(self, Self::Configuration(_))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
