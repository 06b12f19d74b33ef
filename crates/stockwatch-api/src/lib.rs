//! JSON REST API for stockwatch.
//!
//! Exposes an axum [`Router`] over an [`AlertEngine`] and the
//! [`ProfileSource`] that supplies its default settings. Stock writes go
//! through the engine's [`ProductCatalog`] and trigger a check. Auth and
//! transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", stockwatch_api::api_router(state))
//! ```

pub mod alerts;
pub mod error;
pub mod products;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, patch, post, put},
};
use stockwatch_core::{
  engine::AlertEngine,
  ledger::AlertLedger,
  source::{ProductCatalog, ProfileSource},
  transport::Transport,
};

pub use error::ApiError;

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through the alert handlers.
pub struct AppState<L, P, T, R> {
  pub engine:  Arc<AlertEngine<L, P, T>>,
  /// Source of the target and threshold used when a check request names
  /// neither.
  pub profile: Arc<R>,
}

impl<L, P, T, R> AppState<L, P, T, R> {
  pub fn new(engine: AlertEngine<L, P, T>, profile: R) -> Self {
    Self { engine: Arc::new(engine), profile: Arc::new(profile) }
  }
}

impl<L, P, T, R> Clone for AppState<L, P, T, R> {
  fn clone(&self) -> Self {
    Self { engine: self.engine.clone(), profile: self.profile.clone() }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<L, P, T, R>(state: AppState<L, P, T, R>) -> Router<()>
where
  L: AlertLedger + 'static,
  P: ProductCatalog + 'static,
  T: Transport + 'static,
  R: ProfileSource + 'static,
{
  Router::new()
    .route("/alerts", get(alerts::recent::<L, P, T, R>))
    .route("/alerts/check", post(alerts::check::<L, P, T, R>))
    .route("/alerts/products/{id}", get(alerts::status::<L, P, T, R>))
    .route("/alerts/test", post(alerts::send_test::<L, P, T, R>))
    .route("/products", get(products::list::<L, P, T, R>))
    .route(
      "/products/{id}",
      put(products::upsert::<L, P, T, R>).delete(products::remove::<L, P, T, R>),
    )
    .route("/products/{id}/stock", patch(products::set_stock::<L, P, T, R>))
    .with_state(state)
}
