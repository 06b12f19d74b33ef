//! stockwatch server binary.
//!
//! Reads `stockwatch.toml` (or the path given with `--config`), opens the
//! SQLite store, and either serves the alert API or runs a single check.
//!
//! # Password hash generation
//!
//! To generate the argon2 PHC string for `auth_password_hash`:
//!
//! ```
//! cargo run -p stockwatch-server -- hash-password
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::{Parser, Subcommand};
use rand_core::OsRng;
use stockwatch_api::AppState;
use stockwatch_core::engine::{AlertEngine, CheckOutcome};
use stockwatch_remote::WhatsAppTransport;
use stockwatch_server::{ServerConfig, load_config};
use stockwatch_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

type Engine = AlertEngine<SqliteStore, SqliteStore, WhatsAppTransport>;

#[derive(Parser)]
#[command(author, version, about = "Low-stock WhatsApp alerter")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "stockwatch.toml", global = true)]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the alert API over HTTP.
  Serve,

  /// Run one low-stock check, print the report as JSON, and exit.
  ///
  /// Without `--target`/`--threshold` the configured profile is used.
  Check {
    #[arg(long, requires = "threshold")]
    target:    Option<String>,
    #[arg(long, requires = "target")]
    threshold: Option<u32>,
  },

  /// Print the argon2 hash for a password entered on stdin and exit.
  HashPassword,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  match cli.command {
    Command::HashPassword => hash_password(),
    Command::Serve => serve(read_config(&cli.config)?).await,
    Command::Check { target, threshold } => {
      check(read_config(&cli.config)?, target.zip(threshold)).await
    }
  }
}

fn read_config(path: &Path) -> anyhow::Result<ServerConfig> {
  load_config(config::File::from(path).required(false))
    .with_context(|| format!("failed to load configuration from {path:?}"))
}

async fn open_engine(cfg: &ServerConfig) -> anyhow::Result<Engine> {
  let store_path = expand_tilde(&cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let store = Arc::new(store);

  let transport =
    WhatsAppTransport::new(cfg.twilio.clone()).context("failed to configure WhatsApp transport")?;

  Ok(AlertEngine::new(store.clone(), store, Arc::new(transport)))
}

async fn serve(cfg: ServerConfig) -> anyhow::Result<()> {
  let engine = open_engine(&cfg).await?;
  let profile = cfg.profile.source().context("invalid [profile] settings")?;

  let app = stockwatch_server::app(AppState::new(engine, profile), cfg.auth());
  let address = format!("{}:{}", cfg.host, cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

async fn check(cfg: ServerConfig, explicit: Option<(String, u32)>) -> anyhow::Result<()> {
  let engine = open_engine(&cfg).await?;

  let outcome = match explicit {
    Some((target, threshold)) => engine
      .run_check(&target, threshold)
      .await
      .map(CheckOutcome::Completed),
    None => {
      let profile = cfg.profile.source().context("invalid [profile] settings")?;
      engine.run_configured(&profile).await
    }
  }
  .context("low stock check failed")?;

  println!("{}", serde_json::to_string_pretty(&outcome)?);
  Ok(())
}

fn hash_password() -> anyhow::Result<()> {
  let password = read_password()?;
  let salt = SaltString::generate(&mut OsRng);
  let hash = Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
    .to_string();
  println!("{hash}");
  Ok(())
}

/// Read a password line from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
