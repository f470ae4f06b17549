//! VolMix GW - Rust implementation
//!
//! Gateway to control per-application volume from a MIDI macro keypad.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use volmix_gw::actions::{MemorySettingsStore, SettingsStore, SledSettingsStore};
use volmix_gw::audio::{system_directory, DEFAULT_HINT_CAPACITY};
use volmix_gw::config::{AppConfig, ConfigWatcher};
use volmix_gw::inspect;
use volmix_gw::keypad::{KeypadDriver, KeypadEvent};
use volmix_gw::paths::AppPaths;
use volmix_gw::router::Router;

/// VolMix Gateway - Hold a keypad button to ramp an application's volume
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (defaults to the detected app directory)
    #[arg(short, long, env = "VOLMIX_CONFIG")]
    config: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// List available MIDI input ports
    #[arg(long)]
    list_ports: bool,

    /// List applications with an audio session
    #[arg(long)]
    list_sessions: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let paths = AppPaths::detect();
    if let Err(e) = paths.ensure_directories() {
        eprintln!("[paths] {:#}", e);
    }
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| paths.config.to_string_lossy().to_string());

    let _log_guard = init_logging(&args.log_level, &paths.logs_dir)?;

    info!("Starting VolMix GW v{}...", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", config_path);
    info!(
        "State directory: {} ({})",
        paths.state_dir.display(),
        if paths.is_portable() { "portable" } else { "installed" }
    );

    if args.list_ports {
        let pattern = AppConfig::load(&config_path).await.ok().map(|c| c.midi.input_port);
        inspect::list_ports_formatted(pattern.as_deref());
        return Ok(());
    }

    if args.list_sessions {
        match system_directory(DEFAULT_HINT_CAPACITY) {
            Ok(directory) => inspect::list_sessions_formatted(&directory),
            Err(e) => println!("Audio service unavailable: {}", e),
        }
        return Ok(());
    }

    let (config_watcher, initial_config) = ConfigWatcher::new(config_path.clone()).await?;
    info!("Configuration loaded successfully with hot-reload enabled");

    let directory = system_directory(initial_config.audio.cache_capacity)
        .context("Audio session service unavailable")?;
    let store = open_settings_store(&paths.settings_db_path());

    let router = Router::new(&initial_config, directory, store);

    run_app(router, &initial_config, config_watcher, shutdown_signal()).await?;

    info!("VolMix GW shutdown complete");
    Ok(())
}

async fn run_app(
    mut router: Router,
    config: &AppConfig,
    mut config_watcher: ConfigWatcher,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    info!("Starting main application loop...");

    let mut keypad = KeypadDriver::new(config.midi.input_port.clone());
    keypad.connect()?;
    let mut keypad_rx = take_receiver(&mut keypad)?;
    info!("Keypad connected");

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(event) = keypad_rx.recv() => {
                debug!("Keypad event: raw={:02X?} after {:?}", event.raw_data, event.timestamp.elapsed());
                router.handle_edge(event.edge).await;
            }

            Some(new_config) = config_watcher.next_config() => {
                if new_config.midi.input_port != keypad.input_port_name() {
                    match reconnect_keypad(&new_config.midi.input_port) {
                        Ok((driver, rx)) => {
                            keypad = driver;
                            keypad_rx = rx;
                        }
                        Err(e) => warn!("Keeping keypad on '{}': {:#}", keypad.input_port_name(), e),
                    }
                }
                router.reload(&new_config).await;
                info!("Router rebuilt after configuration reload");
            }

            _ = &mut shutdown => {
                break;
            }
        }
    }

    router.shutdown().await;
    keypad.disconnect();
    Ok(())
}

fn reconnect_keypad(input_port: &str) -> Result<(KeypadDriver, mpsc::Receiver<KeypadEvent>)> {
    let mut driver = KeypadDriver::new(input_port);
    driver.connect()?;
    let rx = take_receiver(&mut driver)?;
    info!("Keypad reconnected to '{}'", input_port);
    Ok((driver, rx))
}

fn take_receiver(keypad: &mut KeypadDriver) -> Result<mpsc::Receiver<KeypadEvent>> {
    keypad
        .take_event_receiver()
        .context("Keypad event receiver already taken")
}

/// Sled store, or an in-memory one when the database is locked or corrupt
fn open_settings_store(path: &Path) -> Arc<dyn SettingsStore> {
    match SledSettingsStore::open(path) {
        Ok(store) => {
            info!("Action settings stored in {}", path.display());
            Arc::new(store)
        }
        Err(e) => {
            warn!("{:#}; action settings will not survive a restart", e);
            Arc::new(MemorySettingsStore::new())
        }
    }
}

fn init_logging(level: &str, logs_dir: &Path) -> Result<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let file_appender = tracing_appender::rolling::daily(logs_dir, "volmix-gw.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for CTRL+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
