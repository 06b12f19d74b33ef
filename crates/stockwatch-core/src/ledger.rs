//! The `AlertLedger` trait: durable bookkeeping of alert episodes.
//!
//! The trait is implemented by storage backends (e.g.
//! `stockwatch-store-sqlite`). It carries no business logic; the decisions
//! about when to open and resolve live in [`crate::engine`].

use std::future::Future;

use tracing::debug;
use uuid::Uuid;

use crate::{
  Error, Result,
  episode::{AlertEpisode, NewEpisode},
  product::ProductId,
  source::ProductSource,
};

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over an alert ledger backend.
///
/// Episodes are append/update-only: the only permitted mutation is the
/// one-way transition from open to resolved.
///
/// Implementations must guarantee at most one open episode per
/// `(product_id, threshold)`. A backend that can enforce this structurally
/// (e.g. a partial unique index) reports a rejected insert as `Ok(None)` from
/// [`open_episode`](Self::open_episode).
pub trait AlertLedger: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The open episode for `(product_id, threshold)`, if any. Should more than
  /// one exist, any of them may be returned.
  fn find_open_episode(
    &self,
    product_id: ProductId,
    threshold: u32,
  ) -> impl Future<Output = Result<Option<AlertEpisode>, Self::Error>> + Send + '_;

  /// Persist a new open episode stamped with the current time.
  ///
  /// Returns `None` when an open episode already exists for the same
  /// `(product_id, threshold)`.
  fn open_episode(
    &self,
    input: NewEpisode,
  ) -> impl Future<Output = Result<Option<AlertEpisode>, Self::Error>> + Send + '_;

  /// Every open episode recorded under `threshold`.
  fn open_episodes(
    &self,
    threshold: u32,
  ) -> impl Future<Output = Result<Vec<AlertEpisode>, Self::Error>> + Send + '_;

  /// Mark the given episodes resolved, stamping `resolved_at` once.
  /// Already-resolved or unknown ids are skipped. Returns the number of
  /// episodes that actually transitioned.
  fn resolve_episodes(
    &self,
    ids: Vec<Uuid>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// The `limit` most recently opened episodes, newest first.
  fn recent(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<AlertEpisode>, Self::Error>> + Send + '_;

  /// Full episode history for one product, newest first.
  fn episodes_for_product(
    &self,
    product_id: ProductId,
  ) -> impl Future<Output = Result<Vec<AlertEpisode>, Self::Error>> + Send + '_;
}

// ─── Bulk resolution ─────────────────────────────────────────────────────────

/// Resolve every open episode at `threshold` whose product's current stock
/// is now strictly above `threshold`.
///
/// Episodes recorded under other thresholds are untouched. Episodes whose
/// product has disappeared from the catalogue stay open. Running this twice
/// with no stock change in between resolves nothing the second time.
pub async fn resolve_all_above<L, P>(
  ledger: &L,
  products: &P,
  threshold: u32,
) -> Result<usize>
where
  L: AlertLedger + ?Sized,
  P: ProductSource + ?Sized,
{
  let open = ledger
    .open_episodes(threshold)
    .await
    .map_err(Error::storage)?;

  let mut recovered = Vec::new();
  for episode in open {
    let stock = products
      .get_current_stock(episode.product_id)
      .await
      .map_err(Error::products)?;

    match stock {
      Some(stock) if stock > threshold => recovered.push(episode.episode_id),
      Some(_) => {}
      None => debug!(
        product_id = %episode.product_id,
        episode_id = %episode.episode_id,
        "product missing from catalogue; leaving episode open"
      ),
    }
  }

  if recovered.is_empty() {
    return Ok(0);
  }

  ledger
    .resolve_episodes(recovered)
    .await
    .map_err(Error::storage)
}
