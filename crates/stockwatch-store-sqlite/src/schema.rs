//! SQL schema for the stockwatch SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS products (
    product_id  INTEGER PRIMARY KEY,
    name        TEXT    NOT NULL,
    stock       INTEGER NOT NULL CHECK (stock >= 0)
);

CREATE INDEX IF NOT EXISTS products_stock_idx ON products(stock);

-- Alert episodes are an audit log: rows are inserted, resolved once, and
-- never deleted. product_id is a weak reference (no foreign key) so history
-- outlives catalogue deletions.
CREATE TABLE IF NOT EXISTS alert_episodes (
    episode_id    TEXT    PRIMARY KEY,
    product_id    INTEGER NOT NULL,
    threshold     INTEGER NOT NULL CHECK (threshold >= 0),
    stock_at_open INTEGER NOT NULL CHECK (stock_at_open >= 0),
    target        TEXT    NOT NULL,
    opened_at     TEXT    NOT NULL,   -- RFC 3339 UTC, fixed width
    resolved      INTEGER NOT NULL DEFAULT 0 CHECK (resolved IN (0, 1)),
    resolved_at   TEXT,
    CHECK ((resolved = 0) = (resolved_at IS NULL))
);

-- At most one open episode per (product, threshold). A second concurrent
-- insert fails with a constraint violation.
CREATE UNIQUE INDEX IF NOT EXISTS alert_episodes_open_idx
    ON alert_episodes(product_id, threshold) WHERE resolved = 0;

CREATE INDEX IF NOT EXISTS alert_episodes_product_idx ON alert_episodes(product_id);
CREATE INDEX IF NOT EXISTS alert_episodes_opened_idx  ON alert_episodes(opened_at);

CREATE TRIGGER IF NOT EXISTS alert_episodes_no_delete
BEFORE DELETE ON alert_episodes
BEGIN
    SELECT RAISE(ABORT, 'alert episodes are never deleted');
END;

CREATE TRIGGER IF NOT EXISTS alert_episodes_frozen
BEFORE UPDATE OF episode_id, product_id, threshold, stock_at_open, target, opened_at
ON alert_episodes
BEGIN
    SELECT RAISE(ABORT, 'alert episode snapshot columns are immutable');
END;

CREATE TRIGGER IF NOT EXISTS alert_episodes_resolve_once
BEFORE UPDATE OF resolved, resolved_at ON alert_episodes
WHEN OLD.resolved = 1
BEGIN
    SELECT RAISE(ABORT, 'alert episode is already resolved');
END;

PRAGMA user_version = 1;
";
