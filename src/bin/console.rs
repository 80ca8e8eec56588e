//! Headless console client.
//!
//! Connects to a vehicle server (or runs demo mode), prints every
//! collaborator event and sends each stdin line as a command. `quit` ends
//! the session.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use drivelink::events::{self, AckKind, Collaborator};
use drivelink::{ClientConfig, Role, TelemetrySample, VehicleClient};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "drivelink-console", version)]
#[command(about = "Console operator client for the vehicle-control server")]
struct Cli {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server host, overrides the configuration file
    #[arg(long)]
    host: Option<String>,

    /// Server port, overrides the configuration file
    #[arg(long)]
    port: Option<u16>,

    /// Connect as admin with this password
    #[arg(long)]
    admin_password: Option<String>,

    /// Start in demo mode instead of connecting
    #[arg(long)]
    demo: bool,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Prints events to stdout.
struct Console;

impl Collaborator for Console {
    fn on_log(&mut self, message: &str) {
        println!("[log] {message}");
    }

    fn on_telemetry(&mut self, sample: &TelemetrySample, is_demo: bool) {
        let source = if is_demo { "demo" } else { "live" };
        println!("[{source}] {sample}");
    }

    fn on_connected(&mut self, client_id: &str, role: Role) {
        println!("[session] connected as {client_id} ({role})");
    }

    fn on_disconnected(&mut self, reason: &str) {
        println!("[session] disconnected: {reason}");
    }

    fn on_command_ack(&mut self, kind: AckKind, data: &str) {
        println!("[ack:{kind}] {data}");
    }

    fn on_authorization_changed(&mut self, can_send_commands: bool) {
        let mode = if can_send_commands { "enabled" } else { "disabled" };
        println!("[session] commands {mode}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("drivelink={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = load_config(&cli)?;
    let (client, events) = VehicleClient::new(config).context("invalid configuration")?;

    let delivery = tokio::spawn(async move {
        events::deliver(events, &mut Console).await;
    });

    if cli.demo {
        client.start_demo()?;
    } else if let Err(e) = client.connect().await {
        warn!(error = %e, "Connect failed");
        for suggestion in e.recovery_suggestions() {
            eprintln!("  - {suggestion}");
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("cannot read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("quit") {
            break;
        }
        if let Err(e) = client.send_command(line).await {
            eprintln!("command failed: {e}");
        }
    }

    if let Err(e) = client.disconnect().await {
        info!(error = %e, "Nothing to disconnect");
    }
    drop(client);
    delivery.await.context("event delivery task failed")?;
    Ok(())
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::from_path(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ClientConfig::default(),
    };

    if let Some(host) = &cli.host {
        config.server.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(password) = &cli.admin_password {
        config.role = Role::Admin;
        config.password = Some(password.clone());
    }

    config.validate()?;
    Ok(config)
}
