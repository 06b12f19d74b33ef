//! WhatsApp delivery through the Twilio Messages API.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use stockwatch_core::transport::Transport;
use tracing::{info, warn};

use crate::{Error, Result};

const WHATSAPP_SCHEME: &str = "whatsapp:";

fn default_from() -> String { "whatsapp:+14155238886".to_string() }

fn default_api_base() -> String { "https://api.twilio.com".to_string() }

/// Twilio account settings, deserialised from the `[twilio]` config table.
#[derive(Debug, Clone, Deserialize)]
pub struct TwilioConfig {
  pub account_sid: String,
  pub auth_token:  String,
  /// Sender address; defaults to the Twilio WhatsApp sandbox number.
  #[serde(default = "default_from")]
  pub from:        String,
  #[serde(default = "default_api_base")]
  pub api_base:    String,
}

/// Prefix `target` with `whatsapp:` unless it already carries it.
pub fn whatsapp_address(target: &str) -> String {
  let target = target.trim();
  if target.starts_with(WHATSAPP_SCHEME) {
    target.to_string()
  } else {
    format!("{WHATSAPP_SCHEME}{target}")
  }
}

/// The subset of Twilio's message resource we log.
#[derive(Debug, Deserialize)]
struct MessageResource {
  sid:    String,
  status: Option<String>,
}

/// A [`Transport`] that posts each alert as a WhatsApp message.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct WhatsAppTransport {
  client: Client,
  config: TwilioConfig,
}

impl WhatsAppTransport {
  /// Build the transport. Missing credentials are rejected here rather than
  /// on the first send.
  pub fn new(config: TwilioConfig) -> Result<Self> {
    if config.account_sid.trim().is_empty() {
      return Err(Error::MissingSetting("twilio.account_sid"));
    }
    if config.auth_token.trim().is_empty() {
      return Err(Error::MissingSetting("twilio.auth_token"));
    }

    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .map_err(Error::Client)?;
    Ok(Self { client, config })
  }

  fn messages_url(&self) -> String {
    format!(
      "{}/2010-04-01/Accounts/{}/Messages.json",
      self.config.api_base.trim_end_matches('/'),
      self.config.account_sid
    )
  }
}

impl Transport for WhatsAppTransport {
  async fn send(&self, target: &str, message: &str) -> bool {
    let to = whatsapp_address(target);

    let resp = self
      .client
      .post(self.messages_url())
      .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
      .form(&[
        ("To", to.as_str()),
        ("From", self.config.from.as_str()),
        ("Body", message),
      ])
      .send()
      .await;

    let resp = match resp {
      Ok(resp) => resp,
      Err(e) => {
        warn!(to = %to, error = %e, "whatsapp send failed");
        return false;
      }
    };

    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      warn!(to = %to, %status, body = %body, "whatsapp send rejected");
      return false;
    }

    match resp.json::<MessageResource>().await {
      Ok(msg) => info!(
        to = %to,
        sid = %msg.sid,
        status = msg.status.as_deref().unwrap_or("unknown"),
        "whatsapp message accepted"
      ),
      Err(e) => info!(to = %to, error = %e, "whatsapp message accepted; unreadable receipt"),
    }
    true
  }
}
