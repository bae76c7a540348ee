use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

use upping::audio::{TonePlayer, default_player};
use upping::config::{Cli, load_settings};
use upping::error::ConfigError;
use upping::logging::init_logging;
use upping::monitor::{Console, Monitor};
use upping::probe::build_sampler;
use upping::version::VERSION;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.log_dir.as_deref());
    info!(version = VERSION, "Starting upping...");

    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Invalid configuration. Exiting.");
            return Err(e.into());
        }
    };

    let sampler = build_sampler(settings.probe, settings.timeout).map_err(|source| {
        ConfigError::ProbeSetup {
            kind: settings.probe.as_str(),
            source,
        }
    })?;

    let player: Option<Arc<dyn TonePlayer>> = settings
        .audio
        .is_enabled()
        .then(|| Arc::from(default_player()));

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, shutting down.");
                let _ = shutdown_tx.send(());
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for interrupt; running until killed.");
                // Keep the sender alive so the monitor does not read this as shutdown.
                std::future::pending::<()>().await;
                drop(shutdown_tx);
            }
        }
    });

    let console = Console::for_mode(settings.display);
    let mut monitor = Monitor::new(settings, sampler, console, player);
    monitor.run(shutdown_rx).await;
    Ok(())
}
