#[macro_use]
pub mod error; // Error macros and wire-level error types

pub mod config; // Configuration management
pub mod coordinator; // Polling coordinator and response cache
pub mod crc; // Voltronic and Modbus CRC16
pub mod decoded; // Decoded response maps
pub mod device; // execute/write against one endpoint
pub mod endpoint; // Connection strings
pub mod modbus; // Modbus RTU framing, register map, mimicry
pub mod options; // Command line options parsing
pub mod prelude; // Common imports and types
pub mod queue; // Half-duplex command queue
pub mod snapshot; // Typed telemetry views
pub mod transport; // Serial, TCP and Modbus links
pub mod voltronic; // Voltronic ASCII protocol

// Get the package version from Cargo.toml
const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

use crate::coordinator::Coordinator;
use crate::device::{Device, LinkOptions};
use crate::prelude::*;
use crate::voltronic::Setting;

use std::time::Duration;

/// Initializes env_logger with the timestamped single-line format.
/// `RUST_LOG` wins over `level` when set.
pub fn init_logging(level: &str) {
    if let Err(e) = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.module_path().unwrap_or(""),
                record.args()
            )
        })
        .write_style(env_logger::WriteStyle::Never)
        .try_init()
    {
        eprintln!("Failed to initialize logging: {}", e);
    }
}

/// Runs a single command or setting write against `--endpoint` and prints
/// the decoded result as JSON.
pub async fn one_shot(options: &Options) -> Result<Decoded> {
    let endpoint: Endpoint = match &options.endpoint {
        Some(endpoint) => endpoint.parse()?,
        None => bail!("--endpoint is required for --command and --set"),
    };

    let link_options = LinkOptions {
        unit_id: options.unit_id,
        ..LinkOptions::default()
    };
    let device = Device::new(endpoint, &link_options);

    let decoded = if let Some(setting) = &options.setting {
        let setting: Setting = setting.parse()?;
        device.write(&setting).await
    } else if let Some(command) = &options.command {
        device.execute(command).await
    } else {
        bail!("nothing to do: pass --command or --set");
    };

    Ok(decoded)
}

/// Main application entry point
///
/// With `--command`/`--set` this performs one exchange and exits. Otherwise
/// it loads the config and polls until the shutdown signal or the runtime
/// limit, whichever comes first.
pub async fn app(mut shutdown_rx: broadcast::Receiver<()>, options: Options) -> Result<()> {
    if options.is_one_shot() {
        init_logging("info");
        let decoded = one_shot(&options).await?;
        println!("{}", serde_json::to_string_pretty(&decoded)?);
        return Ok(());
    }

    // the logger needs the configured level, so the file is read first
    let config = Config::load(&options.config_file)?;
    init_logging(&config.loglevel);

    info!(
        "inverter-link {} starting with config file: {}",
        CARGO_PKG_VERSION, options.config_file
    );
    config.log_summary();
    let config = ConfigWrapper::from_config(config);

    info!("  Creating Coordinator...");
    let coordinator = Coordinator::new(config.clone())?;
    let coordinator_clone = coordinator.clone();
    let coordinator_handle = tokio::spawn(async move {
        if let Err(e) = coordinator_clone.start().await {
            error!("Coordinator task failed: {}", e);
        }
    });

    info!("Waiting for shutdown signal...");
    match options.runtime {
        Some(secs) => {
            tokio::select! {
                _ = shutdown_rx.recv() => info!("Shutdown signal received"),
                _ = tokio::time::sleep(Duration::from_secs(secs)) => info!("Runtime limit of {}s reached", secs),
            }
        }
        None => {
            let _ = shutdown_rx.recv().await;
            info!("Shutdown signal received");
        }
    }

    coordinator.stop();
    if let Err(e) = coordinator_handle.await {
        error!("Error waiting for coordinator task: {}", e);
    }

    info!("Application shutdown complete");
    Ok(())
}

/// Application entry point: wires Ctrl-C to the shutdown channel and runs
/// `app`.
pub async fn run(options: Options) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl+c: {}", e);
        }
        let _ = shutdown_tx_clone.send(());
    });

    app(shutdown_rx, options).await
}
