//! Alert episodes: the audit record of every low-stock alert ever raised.
//!
//! An episode covers one continuous stretch of a product sitting at or below
//! a threshold. It is opened when an alert is delivered and resolved once the
//! product's stock is observed above that same threshold again. Episodes are
//! never deleted; resolution is the only mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::product::ProductId;

// ─── Status ──────────────────────────────────────────────────────────────────

/// Lifecycle status of an episode. `Resolved` carries the resolution
/// timestamp, so a resolved episode without one cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EpisodeStatus {
  Open,
  Resolved { at: DateTime<Utc> },
}

impl EpisodeStatus {
  pub fn is_resolved(&self) -> bool { matches!(self, Self::Resolved { .. }) }

  pub fn resolved_at(&self) -> Option<DateTime<Utc>> {
    match self {
      Self::Open => None,
      Self::Resolved { at } => Some(*at),
    }
  }
}

// ─── Episode ─────────────────────────────────────────────────────────────────

/// One alert episode as persisted by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertEpisode {
  pub episode_id:    Uuid,
  /// Weak reference; the product may since have been removed.
  pub product_id:    ProductId,
  pub threshold:     u32,
  /// Stock observed when the alert went out. Historical, never updated.
  pub stock_at_open: u32,
  pub target:        String,
  pub opened_at:     DateTime<Utc>,
  #[serde(flatten)]
  pub status:        EpisodeStatus,
}

impl AlertEpisode {
  pub fn is_open(&self) -> bool { !self.status.is_resolved() }
}

/// Input to [`crate::ledger::AlertLedger::open_episode`].
/// `episode_id` and `opened_at` are always assigned by the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEpisode {
  pub product_id:    ProductId,
  pub threshold:     u32,
  pub stock_at_open: u32,
  pub target:        String,
}

// ─── Per-product summary ─────────────────────────────────────────────────────

/// Alert bookkeeping for a single product, computed on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertStatus {
  pub product_id:         ProductId,
  pub current_stock:      u32,
  /// Open episodes across every threshold.
  pub unresolved:         usize,
  pub resolved:           usize,
  /// `true` when no episode is open, i.e. the next low-stock observation
  /// would produce a send.
  pub can_send_new_alert: bool,
}

impl AlertStatus {
  pub fn from_history(
    product_id: ProductId,
    current_stock: u32,
    history: &[AlertEpisode],
  ) -> Self {
    let unresolved = history.iter().filter(|e| e.is_open()).count();
    Self {
      product_id,
      current_stock,
      unresolved,
      resolved: history.len() - unresolved,
      can_send_new_alert: unresolved == 0,
    }
  }
}
