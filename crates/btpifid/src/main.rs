//! btpifid - Wi-Fi provisioning peripheral daemon

use anyhow::{Context, Result};
use btpifi::config::DEFAULT_CONFIG_PATH;
use btpifi::transport::BusEvent;
use btpifi::{
    Application, Config, LocalBus, ManagedObjects, Peripheral, Properties, PropertyBag,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod console;
mod nmcli;

use nmcli::NmcliProvider;

type Daemon = Application<LocalBus, NmcliProvider>;

#[derive(Parser)]
#[command(name = "btpifid")]
#[command(about = "BLE Wi-Fi provisioning peripheral")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Export the peripheral and run until interrupted
    Run,
    /// Print the object tree and advertisement as JSON
    Dump,
    /// Drive the peripheral from stdin like a GATT client
    Console,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("btpifid={0},btpifi={0}", log_level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config).await,
        Commands::Dump => dump(config),
        Commands::Console => run_console(config).await,
    }
}

fn build(config: &Config) -> Result<Daemon> {
    let name = config.resolve_device_name();
    let settings = config.peripheral_settings(name)?;
    let provider = NmcliProvider::new(config.peripheral.wifi_interface.clone(), &config.wifi);
    let runtime = Handle::try_current().context("no tokio runtime")?;
    let peripheral = Peripheral::build(&settings, provider, runtime)?;
    Ok(Application::new(Arc::new(LocalBus::new()), peripheral))
}

async fn run(config: Config) -> Result<()> {
    let mut app = build(&config)?;
    let mut events = app.bus().subscribe();
    app.start()?;
    info!(
        "Advertising as {:?}, press Ctrl-C to stop",
        app.peripheral().advertisement.local_name()
    );

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(BusEvent::PropertiesChanged { path, changed }) => {
                    debug!("{} changed {:?}", path, changed.names().collect::<Vec<_>>());
                }
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => warn!("Event stream lagged by {}", missed),
                Err(RecvError::Closed) => break,
            },
            signal = tokio::signal::ctrl_c() => {
                signal.context("waiting for Ctrl-C")?;
                break;
            }
        }
    }

    info!("Shutting down");
    app.stop()?;
    Ok(())
}

#[derive(Serialize)]
struct Dump {
    objects: ManagedObjects,
    advertisement: PropertyBag,
    ad_data: String,
}

fn dump(config: Config) -> Result<()> {
    let app = build(&config)?;
    let peripheral = app.peripheral();
    let dump = Dump {
        objects: peripheral.manager.get_managed_objects(),
        advertisement: peripheral.advertisement.properties(),
        ad_data: hex::encode(peripheral.advertisement.to_ad_data()),
    };
    println!("{}", serde_json::to_string_pretty(&dump)?);
    Ok(())
}

async fn run_console(config: Config) -> Result<()> {
    let mut app = build(&config)?;
    app.start()?;
    let result = console::run(&app).await;
    app.stop()?;
    result
}
