//! The alert engine: one low-stock check per invocation.
//!
//! Each [`AlertEngine::run_check`] first resolves episodes whose product has
//! recovered above the threshold, then walks every product at or below it and
//! sends at most one alert per open episode. The engine keeps no state between
//! invocations beyond the per-product locks it holds while one is in flight;
//! everything durable lives in the [`AlertLedger`].

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
  Error, Result,
  episode::{AlertStatus, NewEpisode},
  ledger::{AlertLedger, resolve_all_above},
  lock::KeyedLocks,
  product::{Product, ProductId},
  source::{ProductSource, ProfileSource},
  transport::Transport,
};

// ─── Results ─────────────────────────────────────────────────────────────────

/// Counts for one invocation of [`AlertEngine::run_check`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckReport {
  /// Alerts delivered and recorded as new open episodes.
  pub sent:       usize,
  /// Open episodes closed because stock recovered.
  pub resolved:   usize,
  /// Low-stock products skipped because an episode was already open.
  pub suppressed: usize,
  /// Low-stock products whose send was rejected; retried next invocation.
  pub failed:     usize,
  /// Alerts delivered but not recorded because a concurrent writer opened
  /// the episode first. The recipient received the message twice.
  pub duplicated: usize,
}

impl fmt::Display for CheckReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "sent={} resolved={} suppressed={} failed={} duplicated={}",
      self.sent, self.resolved, self.suppressed, self.failed, self.duplicated
    )
  }
}

/// A check that stopped on a fatal error. `completed` is exact for the work
/// finished before the failure.
#[derive(Debug, Error)]
#[error("alert check stopped ({completed}): {cause}")]
pub struct CheckError {
  #[source]
  pub cause:     Error,
  pub completed: CheckReport,
}

impl CheckError {
  fn new(cause: Error, completed: CheckReport) -> Self { Self { cause, completed } }
}

impl From<Error> for CheckError {
  fn from(cause: Error) -> Self { Self::new(cause, CheckReport::default()) }
}

/// Result of [`AlertEngine::run_configured`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckOutcome {
  /// Alerts are switched off in the manager profile; nothing was touched.
  Disabled,
  Completed(CheckReport),
}

/// What happened to a single low-stock product during the scan phase.
enum Decision {
  Sent,
  Suppressed,
  Failed,
  Duplicated,
}

// ─── Message ─────────────────────────────────────────────────────────────────

/// Body of the transport test message sent by [`AlertEngine::send_test`].
pub const TEST_MESSAGE: &str =
  "Test message from stockwatch. WhatsApp low stock alerts are working.";

/// The alert text for `product` at `threshold`.
pub fn message_for(product: &Product, threshold: u32) -> String {
  format!(
    "LOW STOCK ALERT\n\nProduct: {}\nCurrent stock: {}\nThreshold: {}\n\nPlease restock this item soon.",
    product.name, product.stock, threshold
  )
}

// ─── Engine ──────────────────────────────────────────────────────────────────

pub struct AlertEngine<L, P, T> {
  ledger:    Arc<L>,
  products:  Arc<P>,
  transport: Arc<T>,
  locks:     KeyedLocks<(ProductId, u32)>,
}

impl<L, P, T> AlertEngine<L, P, T>
where
  L: AlertLedger,
  P: ProductSource,
  T: Transport,
{
  pub fn new(ledger: Arc<L>, products: Arc<P>, transport: Arc<T>) -> Self {
    Self { ledger, products, transport, locks: KeyedLocks::new() }
  }

  pub fn ledger(&self) -> &L { &self.ledger }

  pub fn products(&self) -> &P { &self.products }

  pub fn transport(&self) -> &T { &self.transport }

  /// Run one check for `target` at `threshold`.
  ///
  /// The resolve phase always runs before the scan phase. A transport
  /// rejection leaves the product without an episode so the next invocation
  /// retries it. Storage and catalogue failures abort the check.
  pub async fn run_check(
    &self,
    target: &str,
    threshold: u32,
  ) -> Result<CheckReport, CheckError> {
    if target.trim().is_empty() {
      return Err(Error::Configuration("notification target is not set".into()).into());
    }

    let mut report = CheckReport::default();

    report.resolved = resolve_all_above(&*self.ledger, &*self.products, threshold)
      .await
      .map_err(|cause| stopped(cause, report))?;
    if report.resolved > 0 {
      info!(threshold, resolved = report.resolved, "resolved alerts after restock");
    }

    let low = self
      .products
      .list_products_at_or_below(threshold)
      .await
      .map_err(|e| stopped(Error::products(e), report))?;

    for product in &low {
      match self.alert_product(target, threshold, product).await {
        Ok(Decision::Sent) => report.sent += 1,
        Ok(Decision::Suppressed) => report.suppressed += 1,
        Ok(Decision::Failed) => report.failed += 1,
        Ok(Decision::Duplicated) => report.duplicated += 1,
        Err(cause) => return Err(stopped(cause, report)),
      }
    }

    info!(threshold, %report, "low stock check finished");
    Ok(report)
  }

  /// Fetch the alert settings from `profile` and run a check with them.
  pub async fn run_configured<R>(&self, profile: &R) -> Result<CheckOutcome, CheckError>
  where
    R: ProfileSource,
  {
    let config = profile
      .alert_config()
      .await
      .map_err(Error::profile)?
      .ok_or_else(|| Error::Configuration("no manager profile is configured".into()))?;

    if !config.enabled {
      debug!("alerts disabled in manager profile; skipping check");
      return Ok(CheckOutcome::Disabled);
    }

    self
      .run_check(&config.target, config.threshold)
      .await
      .map(CheckOutcome::Completed)
  }

  /// Send [`TEST_MESSAGE`] to `target` and report whether the transport
  /// accepted it. The ledger is not consulted or written.
  pub async fn send_test(&self, target: &str) -> Result<bool> {
    if target.trim().is_empty() {
      return Err(Error::Configuration("notification target is not set".into()));
    }
    let delivered = self.transport.send(target, TEST_MESSAGE).await;
    if delivered {
      info!("test message delivered");
    } else {
      warn!("test message rejected by transport");
    }
    Ok(delivered)
  }

  /// Alert bookkeeping for one product, or `None` if it is not in the
  /// catalogue.
  pub async fn status(&self, product_id: ProductId) -> Result<Option<AlertStatus>> {
    let Some(current_stock) = self
      .products
      .get_current_stock(product_id)
      .await
      .map_err(Error::products)?
    else {
      return Ok(None);
    };

    let history = self
      .ledger
      .episodes_for_product(product_id)
      .await
      .map_err(Error::storage)?;

    Ok(Some(AlertStatus::from_history(product_id, current_stock, &history)))
  }

  /// Find-send-record for one product, serialised per `(product, threshold)`.
  async fn alert_product(
    &self,
    target: &str,
    threshold: u32,
    product: &Product,
  ) -> Result<Decision> {
    let _guard = self.locks.lock((product.id, threshold)).await;

    let existing = self
      .ledger
      .find_open_episode(product.id, threshold)
      .await
      .map_err(Error::storage)?;
    if existing.is_some() {
      debug!(product_id = %product.id, stock = product.stock, "alert already active");
      return Ok(Decision::Suppressed);
    }

    let message = message_for(product, threshold);
    if !self.transport.send(target, &message).await {
      warn!(product_id = %product.id, name = %product.name, "failed to deliver low stock alert");
      return Ok(Decision::Failed);
    }

    let opened = self
      .ledger
      .open_episode(NewEpisode {
        product_id:    product.id,
        threshold,
        stock_at_open: product.stock,
        target:        target.to_owned(),
      })
      .await
      .map_err(Error::storage)?;

    match opened {
      Some(episode) => {
        info!(
          product_id = %product.id,
          name = %product.name,
          stock = product.stock,
          episode_id = %episode.episode_id,
          "low stock alert sent"
        );
        Ok(Decision::Sent)
      }
      None => {
        // Another process recorded the episode between our lookup and insert.
        warn!(product_id = %product.id, threshold, "episode opened concurrently; alert duplicated");
        Ok(Decision::Duplicated)
      }
    }
  }
}

fn stopped(cause: Error, completed: CheckReport) -> CheckError {
  error!(error = %cause, %completed, "low stock check failed");
  CheckError::new(cause, completed)
}
