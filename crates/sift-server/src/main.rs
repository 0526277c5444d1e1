//! sift server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) under `SIFT_*`
//! environment overrides, opens the SQLite store, and serves the public
//! surface on `port` and the private surface on `private_port`.

use std::path::PathBuf;

use anyhow::Context as _;
use axum::Router;
use clap::Parser;
use sift_server::ServerConfig;
use tokio::{net::TcpListener, sync::watch};
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "sift interest registry")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml", env = "SIFT_CONFIG")]
  config: PathBuf,
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
  let cfg = ServerConfig::load(&cli.config)?;
  let app = sift_server::build(&cfg).await?;

  let (stop_tx, stop_rx) = watch::channel(false);
  tokio::spawn(async move {
    if let Err(e) = tokio::signal::ctrl_c().await {
      warn!(error = %e, "failed to listen for ctrl-c");
      return;
    }
    info!("shutting down");
    let _ = stop_tx.send(true);
  });

  let public = serve("public", &cfg.host, cfg.port, app.public, stop_rx.clone());
  let private = serve("private", &cfg.host, cfg.private_port, app.private, stop_rx);
  tokio::try_join!(public, private)?;

  app.service.close().await.context("failed to close store")?;
  Ok(())
}

async fn serve(
  surface: &str,
  host: &str,
  port: u16,
  router: Router,
  mut stop: watch::Receiver<bool>,
) -> anyhow::Result<()> {
  let address = format!("{host}:{port}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {surface} surface to {address}"))?;
  info!(surface, "listening on http://{address}");

  axum::serve(listener, router)
    .with_graceful_shutdown(async move {
      let _ = stop.wait_for(|stopped| *stopped).await;
    })
    .await
    .with_context(|| format!("{surface} server error"))
}
