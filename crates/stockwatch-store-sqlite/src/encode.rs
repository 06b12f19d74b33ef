//! Encoding and decoding helpers between domain types and the plain values
//! stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings with fixed microsecond precision, so
//! lexical order matches chronological order. UUIDs are hyphenated lowercase
//! strings.

use chrono::{DateTime, SecondsFormat, Utc};
use stockwatch_core::{
  episode::{AlertEpisode, EpisodeStatus},
  product::{Product, ProductId},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawEpisode::from_row`].
pub const EPISODE_COLUMNS: &str = "episode_id, product_id, threshold, stock_at_open, \
                                   target, opened_at, resolved, resolved_at";

/// Raw values read directly from an `alert_episodes` row.
pub struct RawEpisode {
  pub episode_id:    String,
  pub product_id:    i64,
  pub threshold:     u32,
  pub stock_at_open: u32,
  pub target:        String,
  pub opened_at:     String,
  pub resolved:      bool,
  pub resolved_at:   Option<String>,
}

impl RawEpisode {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      episode_id:    row.get(0)?,
      product_id:    row.get(1)?,
      threshold:     row.get(2)?,
      stock_at_open: row.get(3)?,
      target:        row.get(4)?,
      opened_at:     row.get(5)?,
      resolved:      row.get(6)?,
      resolved_at:   row.get(7)?,
    })
  }

  pub fn into_episode(self) -> Result<AlertEpisode> {
    let status = match (self.resolved, self.resolved_at) {
      (false, None) => EpisodeStatus::Open,
      (true, Some(at)) => EpisodeStatus::Resolved { at: decode_dt(&at)? },
      (true, None) => {
        return Err(Error::Corrupt(self.episode_id, "resolved without resolved_at"));
      }
      (false, Some(_)) => {
        return Err(Error::Corrupt(self.episode_id, "resolved_at set on open episode"));
      }
    };

    Ok(AlertEpisode {
      episode_id: decode_uuid(&self.episode_id)?,
      product_id: ProductId(self.product_id),
      threshold: self.threshold,
      stock_at_open: self.stock_at_open,
      target: self.target,
      opened_at: decode_dt(&self.opened_at)?,
      status,
    })
  }
}

pub fn product_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Product> {
  Ok(Product {
    id:    ProductId(row.get(0)?),
    name:  row.get(1)?,
    stock: row.get(2)?,
  })
}
