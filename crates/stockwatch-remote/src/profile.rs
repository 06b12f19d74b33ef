//! Alert settings read from the manager profile service.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use stockwatch_core::source::{AlertConfig, ProfileSource};

use crate::{Error, Result};

fn default_threshold() -> u32 { 10 }

fn enabled_by_default() -> bool { true }

/// `GET /manager/profile` response body.
#[derive(Debug, Deserialize)]
struct ProfileEnvelope {
  manager: Option<ManagerProfile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManagerProfile {
  /// E.164 phone number; empty when the manager has not set one.
  #[serde(default)]
  contact:                 String,
  #[serde(default = "default_threshold")]
  low_stock_threshold:     u32,
  #[serde(default = "enabled_by_default")]
  whatsapp_alerts_enabled: bool,
}

impl From<ManagerProfile> for AlertConfig {
  fn from(p: ManagerProfile) -> Self {
    AlertConfig {
      threshold: p.low_stock_threshold,
      target:    p.contact,
      enabled:   p.whatsapp_alerts_enabled,
    }
  }
}

/// A [`ProfileSource`] backed by the manager profile HTTP service.
#[derive(Clone)]
pub struct HttpProfileSource {
  client:   Client,
  base_url: String,
}

impl HttpProfileSource {
  pub fn new(base_url: impl Into<String>) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(10))
      .build()
      .map_err(Error::Client)?;
    Ok(Self { client, base_url: base_url.into() })
  }

  fn url(&self) -> String {
    format!("{}/manager/profile", self.base_url.trim_end_matches('/'))
  }
}

impl ProfileSource for HttpProfileSource {
  type Error = Error;

  async fn alert_config(&self) -> Result<Option<AlertConfig>> {
    let url = self.url();
    let resp = self.client.get(&url).send().await?;

    if resp.status() == StatusCode::NOT_FOUND {
      return Ok(None);
    }
    if !resp.status().is_success() {
      return Err(Error::Status { url, status: resp.status().as_u16() });
    }

    let envelope: ProfileEnvelope = resp.json().await?;
    Ok(envelope.manager.map(AlertConfig::from))
  }
}
