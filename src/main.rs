use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use orderbook_mirror::MirrorError;
use orderbook_mirror::command::{Intent, spawn_command_reader};
use orderbook_mirror::config::{AppConfig, Cli};
use orderbook_mirror::tls::build_tls_config;
use orderbook_mirror::websocket::{SessionController, SessionSettings};

#[tokio::main]
async fn main() -> Result<(), MirrorError> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let app_config = AppConfig::from_cli(cli)?;
    std::fs::create_dir_all(&app_config.output_dir)?;

    let tls_config = build_tls_config(
        &app_config.server_ca,
        &app_config.client_cert,
        &app_config.client_key,
    )?;

    let settings = SessionSettings {
        url: app_config.websocket_url.clone(),
        authorization: app_config.credentials.authorization(),
        output_dir: app_config.output_dir.clone(),
        timers: app_config.timers,
        retry: app_config.retry,
    };
    info!(
        url = %settings.url,
        user = app_config.credentials.username(),
        output_dir = %settings.output_dir.display(),
        autosave = ?settings.timers.autosave,
        resnapshot = ?settings.timers.resnapshot,
        "Starting order book mirror"
    );

    let controller = SessionController::new(settings, Arc::new(tls_config));

    let intents = controller.intents();
    spawn_command_reader(intents.clone())?;
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, shutting down");
            let _ = intents.send(Intent::Exit);
        }
    });

    controller.run().await;

    Ok(())
}

/// Initializes logging. `RUST_LOG` wins over `--debug`.
fn init_tracing(debug: bool) {
    let default_filter = if debug {
        "info,orderbook_mirror=debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
