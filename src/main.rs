//! SORMAS usage exporter - Entry Point
//!
//! Counts SORMAS table rows on an interval and serves them as Prometheus gauges.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

use sormas_usage_exporter::db::PostgresCounter;
use sormas_usage_exporter::metrics::{self as usage_metrics, AppState};
use sormas_usage_exporter::{Config, GaugeSet, RefreshLoop, VERSION};

/// Prometheus exporter for SORMAS database usage counts
#[derive(Parser)]
#[command(name = "sormas-usage-exporter")]
#[command(version = VERSION)]
#[command(about = "Exports SORMAS table row counts as Prometheus gauges")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database host
    #[arg(long)]
    host: Option<String>,

    /// Database user
    #[arg(long)]
    user: Option<String>,

    /// Database password
    #[arg(long)]
    password: Option<String>,

    /// Database port
    #[arg(long)]
    port: Option<u16>,

    /// Database name
    #[arg(long)]
    dbname: Option<String>,

    /// Seconds between gathering
    #[arg(long)]
    delay: Option<u64>,

    /// Directory to write the metrics snapshot file into
    #[arg(long)]
    path: Option<PathBuf>,

    /// Address to serve /metrics on
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Log format: json or pretty
    #[arg(long)]
    log_format: Option<String>,
}

impl Cli {
    /// Override configuration fields with the flags that were given
    fn apply(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.database.host = host.clone();
        }
        if let Some(user) = &self.user {
            config.database.user = user.clone();
        }
        if let Some(password) = &self.password {
            config.database.password = password.clone();
        }
        if let Some(port) = self.port {
            config.database.port = port;
        }
        if let Some(dbname) = &self.dbname {
            config.database.dbname = dbname.clone();
        }
        if let Some(delay) = self.delay {
            config.refresh.interval_secs = delay;
        }
        if let Some(path) = &self.path {
            config.refresh.output_dir = Some(path.clone());
        }
        if let Some(listen) = self.listen {
            config.http.bind_addr = listen;
        }
        if let Some(format) = &self.log_format {
            config.logging.format = format.clone();
        }
    }
}

/// Application entry point
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => Config::default(),
    };
    cli.apply(&mut config);
    config.validate()?;

    sormas_usage_exporter::util::init_tracing(&config.logging)?;

    info!(
        version = VERSION,
        config_path = ?cli.config,
        "Starting SORMAS usage exporter"
    );

    let self_metrics = if config.http.self_metrics {
        let handle = usage_metrics::init_metrics()?;
        usage_metrics::spawn_upkeep(handle.clone(), Duration::from_secs(5));
        Some(handle)
    } else {
        None
    };

    let counter = PostgresCounter::connect(&config.database)
        .await
        .context("Failed to connect to database")?;

    let gauges = Arc::new(GaugeSet::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let refresh = RefreshLoop::new(counter, gauges.clone(), &config.refresh);
    let mut refresh_task = tokio::spawn(refresh.run(shutdown_rx.clone()));

    let mut http_rx = shutdown_rx;
    let mut http_task = tokio::spawn(usage_metrics::serve(
        config.http.bind_addr,
        AppState::new(gauges, self_metrics),
        async move {
            let _ = http_rx.changed().await;
        },
    ));

    tokio::select! {
        result = &mut refresh_task => {
            let _ = shutdown_tx.send(true);
            result.context("Refresh task panicked")?.map_err(|e| {
                error!(error = %e, "Refresh loop failed");
                e
            })?;
        }
        result = &mut http_task => {
            let _ = shutdown_tx.send(true);
            result
                .context("HTTP task panicked")?
                .context("Metrics endpoint failed")?;
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received, stopping");
            let _ = shutdown_tx.send(true);
            refresh_task.await.context("Refresh task panicked")??;
            http_task.await.context("HTTP task panicked")??;
        }
    }

    info!("Exporter stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
