//! Error type for `stockwatch-remote`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("failed to build HTTP client: {0}")]
  Client(#[source] reqwest::Error),

  #[error("request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("GET {url} → {status}")]
  Status { url: String, status: u16 },

  #[error("missing setting: {0}")]
  MissingSetting(&'static str),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
