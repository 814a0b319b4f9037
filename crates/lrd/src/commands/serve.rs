//! `lrd serve` command implementation.

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use lrd_config::{CliSettings, Config, WatchStrategy};
use lrd_server::{run_server, server_config_from_config};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the serve command.
#[derive(Args)]
pub(crate) struct ServeArgs {
    /// Path to configuration file (default: auto-discover lrd.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Document root to serve and watch (overrides config).
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Host to bind to (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Change detection strategy (overrides config).
    #[arg(long, value_enum)]
    watcher: Option<WatcherArg>,

    /// Polling interval in milliseconds (overrides config).
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Enable verbose output (debug-level logs).
    #[arg(short, long)]
    pub verbose: bool,
}

/// Change detection strategy as a CLI flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum WatcherArg {
    /// Native notifications when available, polling otherwise.
    Auto,
    /// Platform watcher only.
    Native,
    /// Fixed-interval tree walks only.
    Poll,
}

impl From<WatcherArg> for WatchStrategy {
    fn from(arg: WatcherArg) -> Self {
        match arg {
            WatcherArg::Auto => Self::Auto,
            WatcherArg::Native => Self::Native,
            WatcherArg::Poll => Self::Poll,
        }
    }
}

impl ServeArgs {
    /// Execute the serve command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the server fails to start.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        // Build CLI settings from args
        let cli_settings = CliSettings {
            host: self.host,
            port: self.port,
            root: self.root,
            strategy: self.watcher.map(WatchStrategy::from),
            poll_interval_ms: self.poll_interval_ms,
        };

        // Load config
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        if let Some(path) = &config.config_path {
            tracing::debug!(config = %path.display(), "configuration loaded");
        }

        // Print startup info
        output.info(&format!(
            "Starting server on {}:{}",
            config.server.host, config.server.port
        ));
        output.info(&format!(
            "Document root: {}",
            config.site_resolved.root.display()
        ));
        match config.watch.strategy {
            WatchStrategy::Auto => output.info("Change detection: auto"),
            WatchStrategy::Native => output.info("Change detection: native notifications"),
            WatchStrategy::Poll => output.info(&format!(
                "Change detection: polling every {}ms",
                config.watch.poll_interval_ms
            )),
        }

        // Build server config and run
        let server_config = server_config_from_config(&config);
        run_server(server_config)
            .await
            .map_err(|e| CliError::Server(e.to_string()))?;

        output.success("Server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn watcher_flag_maps_onto_strategies() {
        assert_eq!(WatchStrategy::from(WatcherArg::Auto), WatchStrategy::Auto);
        assert_eq!(
            WatchStrategy::from(WatcherArg::Native),
            WatchStrategy::Native
        );
        assert_eq!(WatchStrategy::from(WatcherArg::Poll), WatchStrategy::Poll);
    }

    #[test]
    fn serve_args_parse() {
        let cli = crate::Cli::try_parse_from([
            "lrd",
            "serve",
            "--watcher",
            "poll",
            "--port",
            "4000",
            "--poll-interval-ms",
            "250",
        ])
        .unwrap();

        let crate::Commands::Serve(args) = cli.command;
        assert_eq!(args.watcher, Some(WatcherArg::Poll));
        assert_eq!(args.port, Some(4000));
        assert_eq!(args.poll_interval_ms, Some(250));
        assert!(!args.verbose);
    }
}
