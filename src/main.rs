//! Connect6 bridge - headless CLI.
//!
//! Runs the turn-synchronization session against a real serial port,
//! printing status lines to stdout.

#![warn(missing_docs)]

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, ColorArg, Command};
use connect6_bridge::{
    BridgeConfig, SerialLink, SessionControl, SessionEvent, available_ports, init_files,
    run_session,
};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            color,
            port,
            baud,
            quiet_secs,
        } => run(config, color, port, baud, quiet_secs).await,
        Command::Ports => list_ports(),
    }
}

/// Print the serial ports visible on this machine.
fn list_ports() -> Result<()> {
    let ports = available_ports().context("enumerating serial ports")?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        println!("{port}");
    }
    Ok(())
}

/// Run one game session to completion.
async fn run(
    config_path: Option<std::path::PathBuf>,
    color: Option<ColorArg>,
    port: Option<String>,
    baud: Option<u32>,
    quiet_secs: Option<f64>,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => BridgeConfig::from_file(path)?,
        None => BridgeConfig::default(),
    };
    if let Some(color) = color {
        config.set_color(color.into());
    }
    if let Some(port) = port {
        config.set_port(port);
    }
    if let Some(baud) = baud {
        config.set_baud(baud);
    }
    if let Some(quiet_secs) = quiet_secs {
        config.set_quiet_secs(quiet_secs);
    }
    config.validate()?;

    init_files(&config)
        .await
        .context("initializing game files")?;

    let link = SerialLink::open(config.port(), *config.baud(), config.read_timeout())
        .context("opening serial port")?;

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let control = SessionControl::new();

    // Ctrl-C requests a clean stop; the session unwinds at its next poll.
    {
        let control = control.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("ctrl-c received, requesting stop");
                control.request_stop();
            }
        });
    }

    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                SessionEvent::Status(line) => println!("{line}"),
                SessionEvent::Stalled => println!("[stalled - press ctrl-c to stop]"),
                SessionEvent::Fatal(message) => eprintln!("fatal: {message}"),
                SessionEvent::BoardUpdated(_) => {}
            }
        }
    });

    let end = run_session(config, Box::new(link), event_tx, control).await?;
    let _ = printer.await;
    println!("Session ended: {end}");
    Ok(())
}
