//! [`SqliteStore`], the SQLite implementation of [`AlertLedger`] and
//! [`ProductSource`].

use std::path::Path;

use chrono::Utc;
use rusqlite::{OptionalExtension as _, types::Value};
use tracing::debug;
use uuid::Uuid;

use stockwatch_core::{
  episode::{AlertEpisode, EpisodeStatus, NewEpisode},
  ledger::AlertLedger,
  product::{Product, ProductId},
  source::{ProductCatalog, ProductSource},
};

use crate::{
  Result,
  encode::{EPISODE_COLUMNS, RawEpisode, encode_dt, encode_uuid, product_from_row},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// Product catalogue and alert ledger backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, used by tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Execute a raw statement; lets tests exercise the schema's guards.
  #[cfg(test)]
  pub(crate) async fn execute_raw(&self, sql: &'static str) -> Result<usize> {
    Ok(self.conn.call(move |conn| Ok(conn.execute(sql, [])?)).await?)
  }

  // ── Episode queries ───────────────────────────────────────────────────────

  /// Run `SELECT <episode columns> FROM alert_episodes <tail>` with `args`
  /// bound positionally.
  async fn select_episodes(
    &self,
    tail: &'static str,
    args: Vec<Value>,
  ) -> Result<Vec<AlertEpisode>> {
    let raws: Vec<RawEpisode> = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT {EPISODE_COLUMNS} FROM alert_episodes {tail}");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(args), RawEpisode::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEpisode::into_episode).collect()
  }
}

// ─── AlertLedger impl ────────────────────────────────────────────────────────

impl AlertLedger for SqliteStore {
  type Error = crate::Error;

  async fn find_open_episode(
    &self,
    product_id: ProductId,
    threshold: u32,
  ) -> Result<Option<AlertEpisode>> {
    let episodes = self
      .select_episodes(
        "WHERE product_id = ?1 AND threshold = ?2 AND resolved = 0 LIMIT 1",
        vec![Value::Integer(product_id.0), Value::Integer(threshold.into())],
      )
      .await?;
    Ok(episodes.into_iter().next())
  }

  async fn open_episode(&self, input: NewEpisode) -> Result<Option<AlertEpisode>> {
    let episode = AlertEpisode {
      episode_id:    Uuid::new_v4(),
      product_id:    input.product_id,
      threshold:     input.threshold,
      stock_at_open: input.stock_at_open,
      target:        input.target,
      opened_at:     Utc::now(),
      status:        EpisodeStatus::Open,
    };

    let id_str     = encode_uuid(episode.episode_id);
    let product_id = episode.product_id.0;
    let threshold  = episode.threshold;
    let stock      = episode.stock_at_open;
    let target     = episode.target.clone();
    let opened_at  = encode_dt(episode.opened_at);

    let inserted = self
      .conn
      .call(move |conn| {
        let result = conn.execute(
          "INSERT INTO alert_episodes (
             episode_id, product_id, threshold, stock_at_open, target, opened_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, product_id, threshold, stock, target, opened_at],
        );
        match result {
          Ok(_) => Ok(true),
          // The partial unique index: an open episode already exists.
          Err(rusqlite::Error::SqliteFailure(e, _))
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
          {
            Ok(false)
          }
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    if !inserted {
      debug!(
        product_id = %episode.product_id,
        threshold = episode.threshold,
        "open episode already recorded"
      );
      return Ok(None);
    }
    Ok(Some(episode))
  }

  async fn open_episodes(&self, threshold: u32) -> Result<Vec<AlertEpisode>> {
    self
      .select_episodes(
        "WHERE threshold = ?1 AND resolved = 0 ORDER BY opened_at, rowid",
        vec![Value::Integer(threshold.into())],
      )
      .await
  }

  async fn resolve_episodes(&self, ids: Vec<Uuid>) -> Result<usize> {
    if ids.is_empty() {
      return Ok(0);
    }
    let ids: Vec<String> = ids.into_iter().map(encode_uuid).collect();
    let now = encode_dt(Utc::now());

    let resolved = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut count = 0;
        {
          let mut stmt = tx.prepare(
            "UPDATE alert_episodes SET resolved = 1, resolved_at = ?2
             WHERE episode_id = ?1 AND resolved = 0",
          )?;
          for id in &ids {
            count += stmt.execute(rusqlite::params![id, now])?;
          }
        }
        tx.commit()?;
        Ok(count)
      })
      .await?;
    Ok(resolved)
  }

  async fn recent(&self, limit: usize) -> Result<Vec<AlertEpisode>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    self
      .select_episodes(
        "ORDER BY opened_at DESC, rowid DESC LIMIT ?1",
        vec![Value::Integer(limit)],
      )
      .await
  }

  async fn episodes_for_product(&self, product_id: ProductId) -> Result<Vec<AlertEpisode>> {
    self
      .select_episodes(
        "WHERE product_id = ?1 ORDER BY opened_at DESC, rowid DESC",
        vec![Value::Integer(product_id.0)],
      )
      .await
  }
}

// ─── ProductSource impl ──────────────────────────────────────────────────────

impl ProductSource for SqliteStore {
  type Error = crate::Error;

  async fn list_products_at_or_below(&self, threshold: u32) -> Result<Vec<Product>> {
    let products = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT product_id, name, stock FROM products WHERE stock <= ?1 ORDER BY product_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![threshold], product_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(products)
  }

  async fn get_current_stock(&self, product_id: ProductId) -> Result<Option<u32>> {
    let stock: Option<u32> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT stock FROM products WHERE product_id = ?1",
              rusqlite::params![product_id.0],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;
    Ok(stock)
  }
}

// ─── ProductCatalog impl ─────────────────────────────────────────────────────

impl ProductCatalog for SqliteStore {
  async fn upsert_product(&self, product: Product) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO products (product_id, name, stock) VALUES (?1, ?2, ?3)
           ON CONFLICT (product_id) DO UPDATE SET name = excluded.name, stock = excluded.stock",
          rusqlite::params![product.id.0, product.name, product.stock],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn set_stock(&self, product_id: ProductId, stock: u32) -> Result<bool> {
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE products SET stock = ?2 WHERE product_id = ?1",
          rusqlite::params![product_id.0, stock],
        )?)
      })
      .await?;
    Ok(changed == 1)
  }

  async fn list_products(&self) -> Result<Vec<Product>> {
    let products = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT product_id, name, stock FROM products ORDER BY product_id")?;
        let rows = stmt
          .query_map([], product_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(products)
  }

  async fn remove_product(&self, product_id: ProductId) -> Result<bool> {
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM products WHERE product_id = ?1",
          rusqlite::params![product_id.0],
        )?)
      })
      .await?;
    Ok(changed == 1)
  }
}
