//! Server wiring for stockwatch: configuration, profile selection, and the
//! authenticated HTTP application.

pub mod auth;

use std::{path::PathBuf, sync::Arc};

use axum::{Router, middleware};
use config::{ConfigError, Environment, Source};
use serde::Deserialize;
use stockwatch_api::{AppState, api_router};
use stockwatch_core::{
  ledger::AlertLedger,
  source::{AlertConfig, ProductCatalog, ProfileSource, StaticProfile},
  transport::Transport,
};
use stockwatch_remote::{HttpProfileSource, TwilioConfig};
use tower_http::trace::TraceLayer;

use auth::{AuthConfig, require_auth};

// ─── Configuration ───────────────────────────────────────────────────────────

fn default_host() -> String { "127.0.0.1".to_string() }

fn default_port() -> u16 { 8080 }

fn enabled_by_default() -> bool { true }

/// Runtime server configuration, deserialised from `stockwatch.toml` and
/// `STOCKWATCH_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:               String,
  #[serde(default = "default_port")]
  pub port:               u16,
  pub store_path:         PathBuf,
  pub auth_username:      String,
  pub auth_password_hash: String,
  pub twilio:             TwilioConfig,
  #[serde(default)]
  pub profile:            ProfileConfig,
}

impl ServerConfig {
  pub fn auth(&self) -> AuthConfig {
    AuthConfig {
      username:      self.auth_username.clone(),
      password_hash: self.auth_password_hash.clone(),
    }
  }
}

/// Where default alert settings come from. Either `url` (the manager profile
/// service) or a fixed `target` and `threshold`; with neither, checks must
/// name both explicitly.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileConfig {
  pub url:       Option<String>,
  pub target:    Option<String>,
  pub threshold: Option<u32>,
  #[serde(default = "enabled_by_default")]
  pub enabled:   bool,
}

impl ProfileConfig {
  pub fn source(&self) -> stockwatch_remote::Result<ConfiguredProfile> {
    if let Some(url) = &self.url {
      return Ok(ConfiguredProfile::Remote(HttpProfileSource::new(url.clone())?));
    }
    let fixed = match (&self.target, self.threshold) {
      (Some(target), Some(threshold)) => Some(AlertConfig {
        threshold,
        target: target.clone(),
        enabled: self.enabled,
      }),
      (None, None) => None,
      (Some(_), None) => return Err(stockwatch_remote::Error::MissingSetting("profile.threshold")),
      (None, Some(_)) => return Err(stockwatch_remote::Error::MissingSetting("profile.target")),
    };
    Ok(ConfiguredProfile::Static(StaticProfile(fixed)))
  }
}

/// Read `file` layered under `STOCKWATCH_*` environment variables; nested
/// keys use `__`, e.g. `STOCKWATCH_TWILIO__AUTH_TOKEN`.
pub fn load_config<F>(file: F) -> Result<ServerConfig, ConfigError>
where
  F: Source + Send + Sync + 'static,
{
  read_config(file, environment())
}

fn environment() -> Environment {
  Environment::with_prefix("STOCKWATCH")
    .prefix_separator("_")
    .separator("__")
}

fn read_config<F>(file: F, env: Environment) -> Result<ServerConfig, ConfigError>
where
  F: Source + Send + Sync + 'static,
{
  config::Config::builder()
    .add_source(file)
    .add_source(env)
    .build()?
    .try_deserialize()
}

// ─── Profile source ──────────────────────────────────────────────────────────

/// The [`ProfileSource`] selected by [`ProfileConfig`].
pub enum ConfiguredProfile {
  Remote(HttpProfileSource),
  Static(StaticProfile),
}

impl ProfileSource for ConfiguredProfile {
  type Error = stockwatch_remote::Error;

  async fn alert_config(&self) -> stockwatch_remote::Result<Option<AlertConfig>> {
    match self {
      Self::Remote(source) => source.alert_config().await,
      Self::Static(source) => Ok(source.alert_config().await.unwrap_or_else(|e| match e {})),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// The full application: the alert API under `/api`, behind Basic auth,
/// with request tracing.
pub fn app<L, P, T, R>(state: AppState<L, P, T, R>, auth: AuthConfig) -> Router
where
  L: AlertLedger + 'static,
  P: ProductCatalog + 'static,
  T: Transport + 'static,
  R: ProfileSource + 'static,
{
  Router::new()
    .nest("/api", api_router(state))
    .layer(middleware::from_fn_with_state(Arc::new(auth), require_auth))
    .layer(TraceLayer::new_for_http())
}
