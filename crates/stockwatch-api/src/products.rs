//! Handlers for `/products` endpoints.
//!
//! Every stock write is followed by a profile-driven check, so a drop to or
//! below the threshold alerts immediately and a restock resolves.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/products` | Whole catalogue, by id |
//! | `PUT`    | `/products/{id}` | Body: `{"name":"Coffee Mug","stock":4}` |
//! | `PATCH`  | `/products/{id}/stock` | Body: `{"stock":4}`; 404 if unknown |
//! | `DELETE` | `/products/{id}` | Alert history is kept; 404 if unknown |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use serde::{Deserialize, Serialize};
use stockwatch_core::{
  engine::{CheckError, CheckOutcome, CheckReport},
  ledger::AlertLedger,
  product::{Product, ProductId},
  source::{ProductCatalog, ProfileSource},
  transport::Transport,
};
use tracing::{info, warn};

use crate::{AppState, error::ApiError};

fn store_err(e: impl std::error::Error + Send + Sync + 'static) -> ApiError {
  ApiError::Store(Box::new(e))
}

// ─── Response ────────────────────────────────────────────────────────────────

/// The check that ran after a stock write. A failed check does not undo
/// the write.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TriggeredCheck {
  Disabled,
  Completed(CheckReport),
  Failed { error: String, completed: CheckReport },
}

impl From<Result<CheckOutcome, CheckError>> for TriggeredCheck {
  fn from(result: Result<CheckOutcome, CheckError>) -> Self {
    match result {
      Ok(CheckOutcome::Disabled) => Self::Disabled,
      Ok(CheckOutcome::Completed(report)) => Self::Completed(report),
      Err(e) => Self::Failed { error: e.cause.to_string(), completed: e.completed },
    }
  }
}

#[derive(Debug, Serialize)]
pub struct StockChange {
  pub product: Product,
  pub check:   TriggeredCheck,
}

async fn check_after_write<L, P, T, R>(state: &AppState<L, P, T, R>) -> TriggeredCheck
where
  L: AlertLedger,
  P: ProductCatalog,
  T: Transport,
  R: ProfileSource,
{
  let result = state.engine.run_configured(&*state.profile).await;
  if let Err(e) = &result {
    warn!(error = %e, "check after stock change did not complete");
  }
  result.into()
}

// ─── List ────────────────────────────────────────────────────────────────────

/// `GET /products`
pub async fn list<L, P, T, R>(
  State(state): State<AppState<L, P, T, R>>,
) -> Result<Json<Vec<Product>>, ApiError>
where
  L: AlertLedger,
  P: ProductCatalog,
  T: Transport,
  R: ProfileSource,
{
  let products = state.engine.products().list_products().await.map_err(store_err)?;
  Ok(Json(products))
}

// ─── Upsert ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UpsertBody {
  pub name:  String,
  pub stock: u32,
}

/// `PUT /products/{id}`
pub async fn upsert<L, P, T, R>(
  State(state): State<AppState<L, P, T, R>>,
  Path(id): Path<i64>,
  Json(body): Json<UpsertBody>,
) -> Result<Json<StockChange>, ApiError>
where
  L: AlertLedger,
  P: ProductCatalog,
  T: Transport,
  R: ProfileSource,
{
  let name = body.name.trim();
  if name.is_empty() {
    return Err(ApiError::BadRequest("product name must not be empty".into()));
  }

  let product = Product { id: ProductId(id), name: name.to_owned(), stock: body.stock };
  state
    .engine
    .products()
    .upsert_product(product.clone())
    .await
    .map_err(store_err)?;
  info!(product_id = %product.id, stock = product.stock, "product saved");

  let check = check_after_write(&state).await;
  Ok(Json(StockChange { product, check }))
}

// ─── Stock ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StockBody {
  pub stock: u32,
}

/// `PATCH /products/{id}/stock`
pub async fn set_stock<L, P, T, R>(
  State(state): State<AppState<L, P, T, R>>,
  Path(id): Path<i64>,
  Json(body): Json<StockBody>,
) -> Result<Json<StockChange>, ApiError>
where
  L: AlertLedger,
  P: ProductCatalog,
  T: Transport,
  R: ProfileSource,
{
  let product_id = ProductId(id);
  let catalog = state.engine.products();

  if !catalog.set_stock(product_id, body.stock).await.map_err(store_err)? {
    return Err(ApiError::NotFound(format!("product {product_id} not found")));
  }
  info!(%product_id, stock = body.stock, "stock updated");

  let check = check_after_write(&state).await;
  let product = catalog
    .list_products()
    .await
    .map_err(store_err)?
    .into_iter()
    .find(|p| p.id == product_id)
    .ok_or_else(|| ApiError::NotFound(format!("product {product_id} not found")))?;
  Ok(Json(StockChange { product, check }))
}

// ─── Remove ──────────────────────────────────────────────────────────────────

/// `DELETE /products/{id}`
pub async fn remove<L, P, T, R>(
  State(state): State<AppState<L, P, T, R>>,
  Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
  L: AlertLedger,
  P: ProductCatalog,
  T: Transport,
  R: ProfileSource,
{
  let product_id = ProductId(id);
  if !state.engine.products().remove_product(product_id).await.map_err(store_err)? {
    return Err(ApiError::NotFound(format!("product {product_id} not found")));
  }
  info!(%product_id, "product removed");
  Ok(StatusCode::NO_CONTENT)
}
