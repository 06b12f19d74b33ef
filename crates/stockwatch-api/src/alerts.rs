//! Handlers for `/alerts` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/alerts/check` | Optional body `{"target":"+1…","threshold":10}` |
//! | `GET`  | `/alerts` | Optional `?limit=N` (default 50, max 500) |
//! | `GET`  | `/alerts/products/{id}` | 404 if the product is unknown |
//! | `POST` | `/alerts/test` | Optional body `{"target":"+1…"}`; ledger untouched |

use axum::{
  Json,
  body::Bytes,
  extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use stockwatch_core::{
  engine::CheckOutcome,
  episode::{AlertEpisode, AlertStatus},
  ledger::AlertLedger,
  product::ProductId,
  source::{ProductSource, ProfileSource},
  transport::Transport,
};
use tracing::info;

use crate::{AppState, error::ApiError};

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;

/// An empty or all-whitespace body reads as `T::default()`.
fn optional_body<T: DeserializeOwned + Default>(body: &Bytes, what: &str) -> Result<T, ApiError> {
  if body.iter().all(u8::is_ascii_whitespace) {
    return Ok(T::default());
  }
  serde_json::from_slice(body)
    .map_err(|e| ApiError::BadRequest(format!("invalid {what} body: {e}")))
}

// ─── Check ───────────────────────────────────────────────────────────────────

/// Overrides for a manual check. Both fields or neither.
#[derive(Debug, Default, Deserialize)]
pub struct CheckBody {
  pub target:    Option<String>,
  pub threshold: Option<u32>,
}

/// `POST /alerts/check`
///
/// With an empty body the target and threshold come from the manager
/// profile; a disabled profile answers `{"status":"disabled"}`.
pub async fn check<L, P, T, R>(
  State(state): State<AppState<L, P, T, R>>,
  body: Bytes,
) -> Result<Json<CheckOutcome>, ApiError>
where
  L: AlertLedger,
  P: ProductSource,
  T: Transport,
  R: ProfileSource,
{
  let body: CheckBody = optional_body(&body, "check")?;

  let outcome = match (body.target, body.threshold) {
    (Some(target), Some(threshold)) => {
      info!(threshold, "manual low stock check");
      CheckOutcome::Completed(state.engine.run_check(&target, threshold).await?)
    }
    (None, None) => state.engine.run_configured(&*state.profile).await?,
    _ => {
      return Err(ApiError::BadRequest(
        "`target` and `threshold` must be given together".into(),
      ));
    }
  };
  Ok(Json(outcome))
}

// ─── Test message ────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct TestBody {
  pub target: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TestResult {
  pub delivered: bool,
}

/// `POST /alerts/test`
///
/// Sends a fixed test message. Without a `target` the profile's target is
/// used, even when its alerts are disabled.
pub async fn send_test<L, P, T, R>(
  State(state): State<AppState<L, P, T, R>>,
  body: Bytes,
) -> Result<Json<TestResult>, ApiError>
where
  L: AlertLedger,
  P: ProductSource,
  T: Transport,
  R: ProfileSource,
{
  let body: TestBody = optional_body(&body, "test")?;

  let target = match body.target {
    Some(target) => target,
    None => {
      state
        .profile
        .alert_config()
        .await
        .map_err(stockwatch_core::Error::profile)?
        .ok_or_else(|| ApiError::BadRequest("no manager profile is configured".into()))?
        .target
    }
  };

  let delivered = state.engine.send_test(&target).await?;
  Ok(Json(TestResult { delivered }))
}

// ─── Recent ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RecentParams {
  pub limit: Option<usize>,
}

/// `GET /alerts[?limit=N]`
pub async fn recent<L, P, T, R>(
  State(state): State<AppState<L, P, T, R>>,
  Query(params): Query<RecentParams>,
) -> Result<Json<Vec<AlertEpisode>>, ApiError>
where
  L: AlertLedger,
  P: ProductSource,
  T: Transport,
  R: ProfileSource,
{
  let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
  let episodes = state
    .engine
    .ledger()
    .recent(limit)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(episodes))
}

// ─── Product status ──────────────────────────────────────────────────────────

/// `GET /alerts/products/{id}`
pub async fn status<L, P, T, R>(
  State(state): State<AppState<L, P, T, R>>,
  Path(id): Path<i64>,
) -> Result<Json<AlertStatus>, ApiError>
where
  L: AlertLedger,
  P: ProductSource,
  T: Transport,
  R: ProfileSource,
{
  let product_id = ProductId(id);
  let status = state
    .engine
    .status(product_id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("product {product_id} not found")))?;
  Ok(Json(status))
}
