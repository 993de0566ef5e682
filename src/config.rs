//! Command-line and environment configuration.
//!
//! Every option can be given as a flag or through an environment variable
//! (`MIRROR_*`). Empty environment values are treated as absent.
//! [`AppConfig::from_cli`] validates the parsed values and converts them
//! into the settings the session controller and scheduler use.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use zeroize::Zeroizing;

use crate::auth::Credentials;
use crate::scheduler::TimerSettings;
use crate::websocket::RetryPolicy;

/// Default order book stream endpoint.
pub const DEFAULT_WEBSOCKET_URL: &str = "wss://isot.okte.sk:8443/api/v1/idm/ws?topics=orderbook";

/// Default directory for saved snapshots.
pub const DEFAULT_OUTPUT_DIR: &str = "orderbook-snapshots";

/// Raw command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "orderbook-mirror")]
#[command(about = "Mirror a remote intraday order book over an authenticated WebSocket stream")]
pub struct Cli {
    /// Username for HTTP Basic authentication
    #[arg(long, env = "MIRROR_USERNAME")]
    pub username: String,

    /// Password for HTTP Basic authentication
    #[arg(long, env = "MIRROR_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Path to the client certificate (PEM)
    #[arg(long, env = "MIRROR_CLIENT_CERT")]
    pub client_cert: PathBuf,

    /// Path to the client private key (PEM)
    #[arg(long, env = "MIRROR_CLIENT_KEY")]
    pub client_key: PathBuf,

    /// Path to the CA certificate used to verify the server (PEM)
    #[arg(long, env = "MIRROR_SERVER_CA")]
    pub server_ca: PathBuf,

    /// WebSocket endpoint
    #[arg(long, env = "MIRROR_WEBSOCKET_URL", default_value = DEFAULT_WEBSOCKET_URL)]
    pub url: String,

    /// Directory for saved snapshots
    #[arg(long, env = "MIRROR_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Autosave interval in seconds (0 disables autosave)
    #[arg(long, env = "MIRROR_AUTO_SAVE", default_value_t = 60)]
    pub auto_save: u64,

    /// Request a fresh snapshot every N seconds (disabled by default)
    #[arg(long, env = "MIRROR_RESNAPSHOT_INTERVAL")]
    pub send_request_periodically: Option<u64>,

    /// Seconds to wait before reconnecting after a session ends
    #[arg(long, env = "MIRROR_RECONNECT_DELAY", default_value_t = 5)]
    pub reconnect_delay: u64,

    /// Show debug output
    #[arg(long)]
    pub debug: bool,
}

/// Validated application configuration.
#[derive(Debug)]
pub struct AppConfig {
    pub websocket_url: String,
    pub credentials: Credentials,
    pub client_cert: PathBuf,
    pub client_key: PathBuf,
    pub server_ca: PathBuf,
    pub output_dir: PathBuf,
    pub timers: TimerSettings,
    pub retry: RetryPolicy,
    pub debug: bool,
}

impl AppConfig {
    /// Validates parsed arguments.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Config`](crate::MirrorError::Config) if the
    /// username or URL is empty, the reconnect delay is zero, or a periodic
    /// snapshot interval of zero is given.
    pub fn from_cli(cli: Cli) -> crate::Result<Self> {
        if cli.username.trim().is_empty() {
            return Err(config_error("username must not be empty"));
        }
        if cli.url.trim().is_empty() {
            return Err(config_error("url must not be empty"));
        }
        if cli.reconnect_delay == 0 {
            return Err(config_error("reconnect-delay must be at least 1 second"));
        }
        if cli.send_request_periodically == Some(0) {
            return Err(config_error(
                "send-request-periodically must be at least 1 second when set",
            ));
        }

        let autosave = (cli.auto_save > 0).then(|| Duration::from_secs(cli.auto_save));
        let resnapshot = cli.send_request_periodically.map(Duration::from_secs);

        Ok(Self {
            websocket_url: cli.url,
            credentials: Credentials::new(cli.username, Zeroizing::new(cli.password)),
            client_cert: cli.client_cert,
            client_key: cli.client_key,
            server_ca: cli.server_ca,
            output_dir: cli.output_dir,
            timers: TimerSettings {
                autosave,
                resnapshot,
            },
            retry: RetryPolicy::fixed(Duration::from_secs(cli.reconnect_delay)),
            debug: cli.debug,
        })
    }
}

fn config_error(message: &str) -> crate::MirrorError {
    crate::MirrorError::Config(message.to_string())
}
