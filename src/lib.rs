//! Connect6 bridge - turn synchronization for a physical board.
//!
//! This library mediates a two-player Connect6 game between three external
//! collaborators: a board-sensing system that rewrites a plain-text sensor
//! file whenever the physical board changes, a move-search engine launched
//! as a child process, and an actuator reached over a serial link that
//! places stones and acknowledges completion.
//!
//! # Architecture
//!
//! - **Board**: the grid model, sensor-file parsing, and diffing
//! - **Sensor**: the stabilization detector with its quiet-window debounce
//! - **History**: the persisted move-record file the engine consumes
//! - **Engine**: child-process invocation and output parsing
//! - **Serial**: the line transport and the commit/acknowledge handshake
//! - **Orchestrator**: the state machine sequencing all of the above
//!
//! # Example
//!
//! ```no_run
//! use connect6_bridge::{
//!     BridgeConfig, SerialLink, SessionControl, init_files, run_session,
//! };
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let mut config = BridgeConfig::default();
//! config.set_port("/dev/ttyUSB0".to_string());
//! config.validate()?;
//!
//! init_files(&config).await?;
//! let link = SerialLink::open(config.port(), *config.baud(), config.read_timeout())?;
//! let (event_tx, mut event_rx) = mpsc::unbounded_channel();
//! let control = SessionControl::new();
//!
//! let end = run_session(config, Box::new(link), event_tx, control).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod board;
mod config;
mod engine;
mod history;
mod orchestrator;
mod sensor;
mod serial;
mod session;

// Crate-level exports - Board model
pub use board::{Cell, Grid, GridParseError, Point, Stone};

// Crate-level exports - Configuration
pub use config::{BridgeConfig, ConfigError};

// Crate-level exports - Engine invocation
pub use engine::{EngineError, EngineMove, EngineRunner};

// Crate-level exports - Move history
pub use history::{HistoryError, HistoryFile, MoveRecord};

// Crate-level exports - Stabilization detection
pub use sensor::{SensorWatcher, Settlement, WatchError};

// Crate-level exports - Serial commit protocol
pub use serial::{LinkError, MoveLink, SerialLink, available_ports, commit_move};

// Crate-level exports - Session state and orchestration
pub use orchestrator::{
    Orchestrator, SessionError, SessionEvent, StatusLine, TurnState, run_session,
};
pub use session::{GameSession, SessionControl, SessionEnd, init_files};
