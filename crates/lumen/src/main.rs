//! Lumen device agent.
//!
//! Connects a device to its cloud channel, registers it, and serves inbound
//! actions until the channel closes.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tokio::sync::watch;

use lumen_lib::channel::DeviceChannel;
use lumen_lib::config::{ChannelConfig, DeviceConfig};
use lumen_telemetry::{init_logging, log_shutdown, log_startup, LogFormat, TelemetryConfig};

#[derive(Parser, Debug)]
#[command(name = "lumen", about = "Lumen device agent — cloud device channel client", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Connection address flags shared by `run` and `endpoint`.
#[derive(Args, Debug)]
struct ChannelArgs {
    /// Connection scheme (wss or ws).
    #[arg(long, default_value = "wss")]
    scheme: String,

    /// Device channel host.
    #[arg(long, default_value = "api.artik.cloud")]
    host: String,

    /// API version path segment.
    #[arg(long, default_value = "v1.1")]
    api_version: String,

    /// Endpoint path segment.
    #[arg(long, default_value = "websocket")]
    path: String,

    /// Do not request server-side send acknowledgments.
    #[arg(long)]
    no_ack: bool,
}

impl ChannelArgs {
    fn to_config(&self) -> ChannelConfig {
        ChannelConfig {
            scheme: self.scheme.clone(),
            host: self.host.clone(),
            version: self.api_version.clone(),
            path: self.path.clone(),
            ack: !self.no_ack,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Connect to the device channel and serve inbound actions.
    Run {
        /// Path to the device credentials file (JSON with deviceId/deviceToken).
        #[arg(long, default_value = "config.json")]
        config: PathBuf,

        /// Device identifier (overrides the credentials file).
        #[arg(long, env = "LUMEN_DEVICE_ID")]
        device_id: Option<String>,

        /// Device authentication token (overrides the credentials file).
        #[arg(long, env = "LUMEN_DEVICE_TOKEN")]
        device_token: Option<String>,

        #[command(flatten)]
        channel: ChannelArgs,

        /// Log level.
        #[arg(long, default_value = "info")]
        log_level: String,

        /// Log format (json or pretty).
        #[arg(long, default_value = "pretty")]
        log_format: String,
    },

    /// Print the resolved device channel endpoint URL.
    Endpoint {
        #[command(flatten)]
        channel: ChannelArgs,
    },
}

/// Resolve device credentials from the file and any flag/env overrides.
fn resolve_device(
    path: &Path,
    device_id: Option<String>,
    device_token: Option<String>,
) -> Result<DeviceConfig, String> {
    match (device_id, device_token) {
        (Some(device_id), Some(device_token)) => Ok(DeviceConfig {
            device_id,
            device_token,
        }),
        (device_id, device_token) => {
            let mut config = DeviceConfig::load(path)
                .map_err(|e| format!("failed to load device config {}: {}", path.display(), e))?;

            if let Some(device_id) = device_id {
                config.device_id = device_id;
            }
            if let Some(device_token) = device_token {
                config.device_token = device_token;
            }

            Ok(config)
        }
    }
}

/// Run the agent until the channel closes or Ctrl-C fires.
async fn run_agent(
    config: PathBuf,
    device_id: Option<String>,
    device_token: Option<String>,
    channel: ChannelArgs,
    log_level: String,
    log_format: String,
) -> ExitCode {
    let Some(format) = LogFormat::parse(&log_format) else {
        eprintln!(
            "error: invalid log format: {} (expected json or pretty)",
            log_format
        );
        return ExitCode::from(1);
    };

    let device = match resolve_device(&config, device_id, device_token) {
        Ok(device) => device,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(1);
        }
    };

    let telemetry = TelemetryConfig::new()
        .with_log_level(log_level)
        .with_log_format(format);

    if let Err(e) = init_logging(&telemetry) {
        eprintln!("error: {}", e);
        return ExitCode::from(1);
    }

    log_startup!(device_id = %device.device_id, "lumen starting");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    let channel = DeviceChannel::new(channel.to_config(), device);
    match channel.run(shutdown_rx).await {
        Ok(()) => {
            log_shutdown!("lumen stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "device channel failed");
            ExitCode::from(1)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            device_id,
            device_token,
            channel,
            log_level,
            log_format,
        } => run_agent(config, device_id, device_token, channel, log_level, log_format).await,
        Commands::Endpoint { channel } => {
            println!("{}", channel.to_config().endpoint_url());
            ExitCode::SUCCESS
        }
    }
}
