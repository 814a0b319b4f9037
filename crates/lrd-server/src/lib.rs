//! HTTP and WebSocket server for the lrd livereload engine.
//!
//! Three pieces cooperate here:
//!
//! - a change detector from `lrd-watch`, feeding root-relative paths in,
//! - the hub task, which owns the connection set and broadcasts reloads,
//! - per-connection WebSocket sessions speaking the livereload protocol.
//!
//! The axum router exposes the WebSocket endpoint at `/livereload` and
//! serves the document root for everything else, so a page and its reload
//! channel come from the same origin.

mod app;
mod error;
mod hub;
mod protocol;
mod session;
mod state;
mod static_files;

use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use lrd_watch::ChangeEvent;
pub use lrd_watch::WatchMode;

use crate::hub::{Hub, HubHandle};
use crate::state::AppState;

/// How often the hub sweeps out failed connection records.
const COMPACT_INTERVAL: Duration = Duration::from_secs(300);

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on. Stock livereload clients expect 35729.
    pub port: u16,
    /// Document root, served at `/` and watched for changes.
    pub root: PathBuf,
    /// Change detection strategy.
    pub watch_mode: WatchMode,
    /// Pause between polling walks.
    pub poll_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 35729,
            root: PathBuf::from("."),
            watch_mode: WatchMode::Auto,
            poll_interval: lrd_watch::DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Create server configuration from lrd config.
#[must_use]
pub fn server_config_from_config(config: &lrd_config::Config) -> ServerConfig {
    ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        root: config.site_resolved.root.clone(),
        watch_mode: match config.watch.strategy {
            lrd_config::WatchStrategy::Auto => WatchMode::Auto,
            lrd_config::WatchStrategy::Native => WatchMode::Native,
            lrd_config::WatchStrategy::Poll => WatchMode::Poll,
        },
        poll_interval: config.watch.poll_interval(),
    }
}

/// Run the server.
///
/// Starts change detection on the document root, spawns the connection
/// hub, and serves HTTP until a shutdown signal arrives.
///
/// # Errors
///
/// Returns an error if the document root is invalid, change detection
/// cannot be established, or the listener fails to bind.
pub async fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let (watcher, events) =
        lrd_watch::spawn_watcher(&config.root, config.watch_mode, config.poll_interval)?;
    let root = config.root.canonicalize()?;

    let hub = Hub::spawn();
    spawn_event_forwarder(hub.clone(), events);
    spawn_compaction(hub.clone());

    let state = Arc::new(AppState {
        hub: hub.clone(),
        root,
    });
    let app = app::create_router(state);

    let addr = SocketAddr::from_str(&format!("{}:{}", config.host, config.port))?;
    tracing::info!(
        address = %addr,
        watcher = watcher.strategy_name(),
        "Starting livereload server"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    hub.quit().await;

    Ok(())
}

/// Wait for the shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server");
}

/// Forward change events into the hub until the detector ends.
fn spawn_event_forwarder(hub: HubHandle, mut events: mpsc::Receiver<ChangeEvent>) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let path = change_path(&event.path);
            tracing::info!(%path, "file changed");
            hub.file_changed(path).await;
        }
        tracing::debug!("change event stream ended");
    });
}

/// Periodically sweep failed connection records out of the hub.
fn spawn_compaction(hub: HubHandle) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(COMPACT_INTERVAL);
        loop {
            interval.tick().await;
            hub.compact().await;
        }
    });
}

/// Render a root-relative path for the reload message.
///
/// Always forward slashes, whatever the platform separator is.
fn change_path(path: &Path) -> String {
    let mut rendered = String::new();
    for component in path.components() {
        if let Component::Normal(name) = component {
            if !rendered.is_empty() {
                rendered.push('/');
            }
            rendered.push_str(&name.to_string_lossy());
        }
    }
    rendered
}
