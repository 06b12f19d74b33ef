//! Error type for `stockwatch-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A row violates an invariant the schema should have prevented.
  #[error("corrupt episode row {0}: {1}")]
  Corrupt(String, &'static str),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
