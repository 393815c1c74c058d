//! Bulletin server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! subscriber store, and serves the newsletter API over HTTP until Ctrl+C or
//! SIGTERM.

mod settings;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use bulletin_api::AppState;
use bulletin_remote::{HttpContentProvider, HttpMailTransport, MailApiConfig};
use bulletin_store_sqlite::SqliteStore;
use clap::Parser;
use tokio::{net::TcpListener, sync::watch};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::settings::ServerConfig;

#[derive(Parser)]
#[command(author, version, about = "Bulletin newsletter server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let server_cfg = ServerConfig::load(
    config::File::from(cli.config).required(false),
    ServerConfig::environment(),
  )
  .context("failed to load configuration")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }

  // Open SQLite store.
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let delivery = server_cfg.delivery_config();
  let mail_timeout = server_cfg.mail_timeout();
  let content_timeout = server_cfg.content_timeout();
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  // Collaborators.
  let transport = HttpMailTransport::new(MailApiConfig {
    base_url: server_cfg.mail.api_base_url,
    api_key:  server_cfg.mail.api_key,
    sender:   server_cfg.mail.sender,
    timeout:  mail_timeout,
  })
  .context("failed to build mail client")?;
  let content =
    HttpContentProvider::new(&server_cfg.content.api_base_url, content_timeout)
      .context("failed to build content client")?;

  // Build application state.
  let (shutdown_tx, shutdown_rx) = watch::channel(false);
  let state = AppState::new(
    Arc::new(store),
    Arc::new(transport),
    Arc::new(content),
    delivery,
  )
  .with_shutdown(shutdown_rx);

  let app = bulletin_api::router(state);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(async move {
      shutdown_signal().await;
      tracing::info!("shutdown signal received; draining requests");
      shutdown_tx.send_replace(true);
    })
    .await
    .context("server error")?;

  Ok(())
}

/// Resolves on Ctrl+C or, on unix, SIGTERM.
async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = tokio::signal::ctrl_c().await {
      tracing::error!(error = %e, "failed to listen for Ctrl+C");
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    use tokio::signal::unix::{SignalKind, signal};
    match signal(SignalKind::terminate()) {
      Ok(mut sig) => {
        sig.recv().await;
      }
      Err(e) => {
        tracing::error!(error = %e, "failed to listen for SIGTERM");
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    () = ctrl_c => {},
    () = terminate => {},
  }
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
