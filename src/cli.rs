//! Command-line interface for the Connect6 bridge.

use clap::{Parser, Subcommand, ValueEnum};
use connect6_bridge::Stone;

/// Connect6 bridge - mediates a physical board, a search engine, and a
/// serial actuator
#[derive(Parser, Debug)]
#[command(name = "connect6_bridge")]
#[command(about = "Turn synchronization bridge for a physical Connect6 board", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a game session headlessly, printing status lines to stdout
    Run {
        /// Path to a TOML configuration file
        #[arg(short, long)]
        config: Option<std::path::PathBuf>,

        /// Color the local side plays
        #[arg(long, value_enum)]
        color: Option<ColorArg>,

        /// Serial port name (e.g. /dev/ttyUSB0)
        #[arg(short, long)]
        port: Option<String>,

        /// Serial baud rate
        #[arg(short, long)]
        baud: Option<u32>,

        /// Quiet duration in seconds before a board change settles
        #[arg(long)]
        quiet_secs: Option<f64>,
    },

    /// List the serial ports visible on this machine
    Ports,
}

/// Local color as a CLI argument.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorArg {
    /// Black moves first.
    Black,
    /// White moves second.
    White,
}

impl From<ColorArg> for Stone {
    fn from(color: ColorArg) -> Self {
        match color {
            ColorArg::Black => Stone::Black,
            ColorArg::White => Stone::White,
        }
    }
}
