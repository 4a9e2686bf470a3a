//! Smart shelf service - main entry point
//!
//! Loads the bootstrap config, restores the baseline snapshot and cached
//! catalog, starts every device channel and monitor loop under the task
//! supervisor, then serves the HTTP/SSE surface until shutdown.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use smartshelf::api::{self, AppContext};
use smartshelf::badge_reader::BadgeReader;
use smartshelf::baseline::{BaselineCommitter, BaselineStore};
use smartshelf::checkout::Checkout;
use smartshelf::collaborators::{AudioSink, CloudClient, ProcessAudio, SharedPresence};
use smartshelf::config::ShelfConfig;
use smartshelf::device::{BleConnector, LoadcellChannel, UnitQueues};
use smartshelf::environment::{EnvSensorChannel, VoiceChannel};
use smartshelf::fanout::Fanout;
use smartshelf::mode::ModeController;
use smartshelf::supervisor::spawn_supervised;
use smartshelf::watchdog::DepartureWatchdog;
use smartshelf::SharedState;
use smartshelf_common::config::{load_toml_or_default, resolve_config_path, CONFIG_ENV_VAR};
use smartshelf_common::slots::LoadcellUnit;

/// Delay before a stopped loop is started again
const RESTART_DELAY: Duration = Duration::from_secs(5);

/// Payment flag poll interval
const PAYMENT_POLL: Duration = Duration::from_secs(1);

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "smartshelf")]
#[command(about = "Sensor-state core of an unattended smart shelf")]
#[command(version)]
struct Args {
    /// Config file (TOML)
    #[arg(short, long, env = "SMARTSHELF_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "SMARTSHELF_PORT")]
    port: Option<u16>,

    /// Folder for the baseline snapshot and catalog cache
    #[arg(short, long, env = "SMARTSHELF_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR);
    let mut config: ShelfConfig =
        load_toml_or_default(config_path.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting smart shelf {} on port {}", config.shelf_id, config.port);
    match &config_path {
        Some(path) => info!("Config file: {}", path.display()),
        None => info!("No config file, running on built-in defaults"),
    }
    info!("Data folder: {}", config.data_dir.display());

    tokio::fs::create_dir_all(&config.data_dir)
        .await
        .with_context(|| format!("Failed to create data folder {}", config.data_dir.display()))?;

    // Restore baseline and cached catalog
    let store = BaselineStore::new(config.baseline_path());
    let verified = store.load();
    info!("Baseline restored: {:?}", verified);

    let cloud = Arc::new(
        CloudClient::new(config.cloud.clone(), config.cache_dir())
            .context("Failed to initialize cloud client")?,
    );
    let catalog = cloud.cached_catalog();
    let badges = cloud.cached_badges();
    let initial_products = catalog.product_ids();
    info!("{} cached products, {} cached badges", initial_products.len(), badges.len());

    let state = Arc::new(SharedState::new(verified, catalog, badges));
    let committer = BaselineCommitter::spawn(state.clone(), store);
    let audio: Arc<dyn AudioSink> = Arc::new(ProcessAudio::new(config.audio.clone()));
    let presence = Arc::new(SharedPresence::default());
    let queues = UnitQueues::new(config.loadcell.enqueue_wait());
    let fanout = Fanout::new(state.clone(), audio.clone());

    let modes = ModeController::new(
        config.shelf_id.clone(),
        state.clone(),
        queues.clone(),
        committer.clone(),
        cloud.clone(),
        cloud.clone(),
        audio.clone(),
        fanout.clone(),
        initial_products,
    );
    let checkout = Checkout::new(
        config.shelf_id.clone(),
        state.clone(),
        committer,
        queues.clone(),
        fanout.clone(),
        cloud.clone(),
        audio.clone(),
    );

    // Device channels
    match ble_connector().await {
        Some(connector) => {
            for unit in LoadcellUnit::ALL {
                let channel = Arc::new(LoadcellChannel::new(
                    unit,
                    config.loadcell.clone(),
                    connector.clone(),
                    queues.queue(unit),
                    state.clone(),
                    fanout.clone(),
                    audio.clone(),
                ));
                let name = match unit {
                    LoadcellUnit::Unit1 => "loadcell-unit1",
                    LoadcellUnit::Unit2 => "loadcell-unit2",
                };
                spawn_supervised(name, RESTART_DELAY, move || {
                    let channel = channel.clone();
                    async move { channel.run().await }
                });
            }

            if config.sensor.address.is_empty() {
                info!("No environmental sensor configured");
            } else {
                let sensor = Arc::new(EnvSensorChannel::new(
                    config.sensor.clone(),
                    connector,
                    state.clone(),
                    audio.clone(),
                ));
                spawn_supervised("env-sensor", RESTART_DELAY, move || {
                    let sensor = sensor.clone();
                    async move { sensor.run().await }
                });
            }
        }
        None => warn!("No BLE backend available, device channels not started"),
    }

    if config.sensor.voice_port.is_empty() {
        info!("No voice sensor port configured");
    } else {
        let voice = Arc::new(VoiceChannel::new(
            config.sensor.voice_port.clone(),
            config.sensor.voice_baud,
            state.clone(),
        ));
        spawn_supervised("voice", RESTART_DELAY, move || {
            let voice = voice.clone();
            async move { voice.run().await }
        });
    }

    // Monitor loops
    {
        let fanout = fanout.clone();
        let interval = config.health.backup_poll();
        spawn_supervised("backup-poll", RESTART_DELAY, move || {
            let fanout = fanout.clone();
            async move { fanout.run_backup_poll(interval).await }
        });
    }
    {
        let fanout = fanout.clone();
        let (stale_after, interval) = (config.health.stale_after(), config.health.check_interval());
        spawn_supervised("health-monitor", RESTART_DELAY, move || {
            let fanout = fanout.clone();
            async move { fanout.run_health_monitor(stale_after, interval).await }
        });
    }
    {
        let checkout = checkout.clone();
        spawn_supervised("payment-commit", RESTART_DELAY, move || {
            let checkout = checkout.clone();
            async move { checkout.run_commit_loop(PAYMENT_POLL).await }
        });
    }
    {
        let shelf_id = config.shelf_id.clone();
        let watchdog_config = config.watchdog.clone();
        let (state, presence, orders, audio) = (state.clone(), presence.clone(), cloud.clone(), audio.clone());
        spawn_supervised("departure-watchdog", RESTART_DELAY, move || {
            DepartureWatchdog::new(
                shelf_id.clone(),
                watchdog_config.clone(),
                state.clone(),
                presence.clone(),
                orders.clone(),
                audio.clone(),
            )
            .run()
        });
    }
    {
        let reader = Arc::new(BadgeReader::new(config.badge.input_path.clone(), modes.clone()));
        spawn_supervised("badge-reader", RESTART_DELAY, move || {
            let reader = reader.clone();
            async move { reader.run().await }
        });
    }

    // HTTP/SSE surface
    let app = api::create_router(AppContext {
        shelf_id: config.shelf_id.clone(),
        state,
        modes,
        checkout,
        presence,
        fanout,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

#[cfg(feature = "ble")]
async fn ble_connector() -> Option<Arc<dyn BleConnector>> {
    match smartshelf::device::btle::BtleConnector::new().await {
        Ok(connector) => Some(Arc::new(connector)),
        Err(e) => {
            tracing::error!("Bluetooth unavailable: {}", e);
            None
        }
    }
}

#[cfg(not(feature = "ble"))]
async fn ble_connector() -> Option<Arc<dyn BleConnector>> {
    warn!("Built without the `ble` feature");
    None
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
