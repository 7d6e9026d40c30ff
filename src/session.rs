//! Session state owned by the orchestrator, plus the shared control flags
//! the front end uses to interrupt it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, instrument};

use crate::board::{Grid, Stone};
use crate::config::BridgeConfig;

/// How a session ended when it was not aborted by a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum SessionEnd {
    /// The front end requested a stop.
    #[display("stopped")]
    Stopped,
    /// The front end requested a reset; files were reinitialized.
    #[display("reset")]
    Reset,
}

/// Shared stop/reset flags, checked inside every wait loop so an interrupt
/// is observed within one poll interval or one serial read timeout.
#[derive(Debug, Clone, Default)]
pub struct SessionControl {
    stop: Arc<AtomicBool>,
    reset: Arc<AtomicBool>,
}

impl SessionControl {
    /// Creates a fresh control handle with both flags clear.
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the running session to unwind and stop.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Asks the running session to unwind, reinitialize all files, and
    /// return to the initial state.
    pub fn request_reset(&self) {
        self.reset.store(true, Ordering::SeqCst);
    }

    /// Whether a stop has been requested.
    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Whether a reset has been requested.
    pub fn reset_requested(&self) -> bool {
        self.reset.load(Ordering::SeqCst)
    }

    /// Whether either flag is raised.
    pub fn interrupted(&self) -> bool {
        self.stop_requested() || self.reset_requested()
    }

    /// Clears the reset flag once the session has unwound from it.
    pub fn acknowledge_reset(&self) {
        self.reset.store(false, Ordering::SeqCst);
    }
}

/// The mutable game state of one session.
///
/// Single-writer: only the orchestrator task mutates this. `committed` is
/// always a grid that has been fully translated into history-file records;
/// `current` may be transiently ahead of it mid-detection.
#[derive(Debug, Clone)]
pub struct GameSession {
    local: Stone,
    current: Grid,
    committed: Grid,
    turn: u32,
    first_move: bool,
}

impl GameSession {
    /// Creates a fresh session for the given local color and board size.
    pub fn new(local: Stone, size: usize) -> Self {
        Self {
            local,
            current: Grid::empty(size),
            committed: Grid::empty(size),
            turn: 1,
            first_move: true,
        }
    }

    /// The color the local side plays.
    pub fn local(&self) -> Stone {
        self.local
    }

    /// The most recent settled grid.
    pub fn current(&self) -> &Grid {
        &self.current
    }

    /// The last grid fully recorded in the history file.
    pub fn committed(&self) -> &Grid {
        &self.committed
    }

    /// The current round number, starting at 1.
    pub fn turn(&self) -> u32 {
        self.turn
    }

    /// Whether the game's irregular first half-turn is still pending.
    pub fn first_move(&self) -> bool {
        self.first_move
    }

    /// Installs a newly settled grid as `current`.
    pub fn install(&mut self, grid: Grid) {
        self.current = grid;
    }

    /// Marks `current` as fully recorded.
    pub fn commit(&mut self) {
        self.committed = self.current.clone();
    }

    /// Advances to the next round.
    pub fn advance_turn(&mut self) -> u32 {
        self.turn += 1;
        self.turn
    }

    /// Marks the irregular first half-turn as done.
    pub fn finish_opening(&mut self) {
        self.first_move = false;
    }

    /// Returns the session to its initial state, keeping the local color.
    pub fn reset(&mut self) {
        let size = self.current.size();
        self.current = Grid::empty(size);
        self.committed = Grid::empty(size);
        self.turn = 1;
        self.first_move = true;
    }
}

/// Initializes the three on-disk interfaces for a new game: the sensor file
/// becomes the all-zero grid, the history and engine-output files become
/// empty. Called at session start and on reset.
#[instrument(skip(config))]
pub async fn init_files(config: &BridgeConfig) -> std::io::Result<()> {
    let zeros = Grid::empty(*config.board_size()).to_sensor_text();
    tokio::fs::write(config.sensor_file(), zeros).await?;
    tokio::fs::write(config.history_file(), "").await?;
    tokio::fs::write(config.engine_output_file(), "").await?;
    debug!("game files initialized");
    Ok(())
}
