//! Stabilization detector for the externally written sensor file.
//!
//! The sensor file is rewritten wholesale by uncontrolled hardware, so the
//! only defense against reading a half-written snapshot is the quiet window:
//! raw content must stop changing for the configured duration before it is
//! parsed and diffed against the committed grid.

use std::path::PathBuf;
use std::time::Duration;

use derive_getters::Getters;
use derive_more::{Display, Error};
use tokio::time::{Instant, sleep};
use tracing::{debug, info, instrument, warn};

use crate::board::{Grid, GridParseError, Point, Stone};
use crate::config::BridgeConfig;
use crate::session::SessionControl;

/// A settled board update: the parsed grid, the changed points in row-major
/// order, and the single color of the newly placed stones.
#[derive(Debug, Clone, Getters)]
pub struct Settlement {
    /// The parsed candidate grid.
    grid: Grid,
    /// Changed points, in row-major scan order.
    placed: Vec<Point>,
    /// The single color of the newly placed stones.
    color: Stone,
}

impl Settlement {
    /// Consumes the settlement, yielding the parsed grid.
    pub fn into_grid(self) -> Grid {
        self.grid
    }
}

/// A settlement wait that ended without a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum WatchError {
    /// No sensor-file change within the stall window.
    #[display("no sensor-file change within the stall window")]
    Stalled,
    /// A stop or reset request arrived mid-wait.
    #[display("settlement wait interrupted")]
    Interrupted,
}

/// Why quiet-stable content was not accepted as a settlement.
#[derive(Debug, Display)]
enum Reject {
    #[display("unparseable board: {_0}")]
    Parse(GridParseError),
    #[display("expected {expected} changed cells, found {found}")]
    ChangeCount { expected: usize, found: usize },
    #[display("changed cells carry {found} distinct colors")]
    MixedColors { found: usize },
}

/// Polls the sensor file and decides when a board change has settled.
#[derive(Debug, Clone)]
pub struct SensorWatcher {
    path: PathBuf,
    size: usize,
    quiet: Duration,
    poll_interval: Duration,
    stall_timeout: Duration,
}

impl SensorWatcher {
    /// Creates a watcher with explicit parameters.
    pub fn new(
        path: impl Into<PathBuf>,
        size: usize,
        quiet: Duration,
        poll_interval: Duration,
        stall_timeout: Duration,
    ) -> Self {
        Self {
            path: path.into(),
            size,
            quiet,
            poll_interval,
            stall_timeout,
        }
    }

    /// Creates a watcher from the bridge configuration.
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(
            config.sensor_file(),
            *config.board_size(),
            config.quiet_duration(),
            config.poll_interval(),
            config.stall_timeout(),
        )
    }

    /// Waits until the sensor file settles into a valid update.
    ///
    /// A settlement requires the raw text to stay unchanged for the quiet
    /// duration, after which it must parse and its diff against `committed`
    /// must contain exactly `expected_changes` cells, all newly occupied by
    /// one color. Any rejection restarts the quiet window and polling
    /// continues. An unreadable file is treated as "no update".
    ///
    /// # Errors
    ///
    /// [`WatchError::Stalled`] after the stall window elapses without any
    /// raw change, or [`WatchError::Interrupted`] when `control` signals a
    /// stop or reset.
    #[instrument(skip(self, committed, control), fields(path = %self.path.display()))]
    pub async fn await_settlement(
        &self,
        committed: &Grid,
        expected_changes: usize,
        control: &SessionControl,
    ) -> Result<Settlement, WatchError> {
        let mut last_content: Option<String> = None;
        let mut last_change = Instant::now();
        let mut quiet_start: Option<Instant> = None;

        loop {
            if control.interrupted() {
                return Err(WatchError::Interrupted);
            }

            match tokio::fs::read_to_string(&self.path).await {
                Err(error) => {
                    debug!(%error, "sensor file unreadable, retrying");
                }
                Ok(content) if last_content.as_deref() != Some(content.as_str()) => {
                    debug!("sensor content changed, quiet timer reset");
                    last_content = Some(content);
                    last_change = Instant::now();
                    quiet_start = None;
                }
                Ok(content) => match quiet_start {
                    None => {
                        debug!(quiet = ?self.quiet, "sensor content stable, quiet timer started");
                        quiet_start = Some(Instant::now());
                    }
                    Some(start) if start.elapsed() >= self.quiet => {
                        match self.try_accept(&content, committed, expected_changes) {
                            Ok(settlement) => {
                                info!(
                                    placed = ?settlement.placed,
                                    color = %settlement.color,
                                    "settlement accepted"
                                );
                                return Ok(settlement);
                            }
                            Err(reject) => {
                                warn!(%reject, "settlement rejected, quiet timer restarted");
                                quiet_start = Some(Instant::now());
                            }
                        }
                    }
                    Some(_) => {}
                },
            }

            if last_change.elapsed() >= self.stall_timeout {
                warn!("sensor file stalled");
                return Err(WatchError::Stalled);
            }
            sleep(self.poll_interval).await;
        }
    }

    fn try_accept(
        &self,
        content: &str,
        committed: &Grid,
        expected_changes: usize,
    ) -> Result<Settlement, Reject> {
        let grid = Grid::parse(content, self.size).map_err(Reject::Parse)?;
        let placed = committed.diff(&grid);
        if placed.len() != expected_changes {
            return Err(Reject::ChangeCount {
                expected: expected_changes,
                found: placed.len(),
            });
        }

        // Only newly occupied cells count toward the color check; a change
        // back to empty contributes no color and fails the single-color rule.
        let mut colors: Vec<Stone> = Vec::new();
        for point in &placed {
            if let Some(stone) = grid.get(point.x, point.y).stone() {
                if !colors.contains(&stone) {
                    colors.push(stone);
                }
            }
        }
        let [color] = colors[..] else {
            return Err(Reject::MixedColors {
                found: colors.len(),
            });
        };
        Ok(Settlement {
            grid,
            placed,
            color,
        })
    }
}
