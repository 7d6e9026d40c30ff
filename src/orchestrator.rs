//! Turn orchestration: the state machine that sequences detection, history
//! recording, engine invocation, and the serial commit across each round.

use std::convert::Infallible;

use chrono::Local;
use derive_more::{Display, Error};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument};

use crate::board::{Grid, Stone};
use crate::config::BridgeConfig;
use crate::engine::{EngineError, EngineRunner};
use crate::history::{HistoryError, HistoryFile, MoveRecord};
use crate::sensor::{SensorWatcher, Settlement, WatchError};
use crate::serial::{LinkError, MoveLink, commit_move};
use crate::session::{GameSession, SessionControl, SessionEnd, init_files};

/// Where the orchestrator currently is in the turn cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum TurnState {
    /// Waiting for the opponent's single opening stone (local side is White).
    AwaitingOpeningMove,
    /// Running the external search engine.
    InvokingEngine,
    /// Waiting for the actuator to acknowledge the committed move.
    AwaitingCommitAck,
    /// Waiting for our own placement to settle on the sensed board.
    AwaitingOwnSettlement,
    /// Waiting for the opponent's placement to settle.
    AwaitingOpponentSettlement,
    /// Both sides have moved; the turn counter is being advanced.
    RoundComplete,
    /// Terminal state after a fatal error or an external stop.
    GameOver,
}

/// A timestamped human-readable status line for the front end.
#[derive(Debug, Clone)]
pub struct StatusLine {
    time: String,
    text: String,
}

impl StatusLine {
    /// Creates a status line stamped with the current local time.
    pub fn now(text: impl Into<String>) -> Self {
        Self {
            time: Local::now().format("%H:%M:%S").to_string(),
            text: text.into(),
        }
    }

    /// The message text without the timestamp.
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl std::fmt::Display for StatusLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.time, self.text)
    }
}

/// Messages pushed from the orchestrator task to the front end. One-way and
/// append-only; board snapshots cross the boundary as owned clones.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A human-readable status line.
    Status(StatusLine),
    /// The settled board changed; re-render from this snapshot.
    BoardUpdated(Grid),
    /// A settlement wait stalled; the session is parked until stop or reset.
    Stalled,
    /// The session aborted with a fatal error.
    Fatal(String),
}

/// A session-ending failure.
#[derive(Debug, Display, Error)]
pub enum SessionError {
    /// The engine run failed.
    #[display("engine failure: {source}")]
    Engine {
        /// The engine error.
        source: EngineError,
    },
    /// The serial commit failed.
    #[display("serial link failure: {source}")]
    Link {
        /// The link error.
        source: LinkError,
    },
    /// The history file could not be written or re-read.
    #[display("history failure: {source}")]
    History {
        /// The history error.
        source: HistoryError,
    },
    /// Reinitializing the game files failed.
    #[display("file initialization failed: {source}")]
    Init {
        /// The I/O error.
        source: std::io::Error,
    },
    /// The front end dropped its event receiver.
    #[display("event channel closed")]
    ChannelClosed,
}

/// Internal control flow of the turn loop: every wait and every fallible
/// operation resolves to one of these when it cannot make progress.
enum Halt {
    Interrupted,
    Stalled,
    Fatal(SessionError),
}

impl From<WatchError> for Halt {
    fn from(error: WatchError) -> Self {
        match error {
            WatchError::Interrupted => Halt::Interrupted,
            WatchError::Stalled => Halt::Stalled,
        }
    }
}

impl From<EngineError> for Halt {
    fn from(source: EngineError) -> Self {
        match source {
            EngineError::Interrupted => Halt::Interrupted,
            source => Halt::Fatal(SessionError::Engine { source }),
        }
    }
}

impl From<LinkError> for Halt {
    fn from(source: LinkError) -> Self {
        match source {
            LinkError::Interrupted => Halt::Interrupted,
            source => Halt::Fatal(SessionError::Link { source }),
        }
    }
}

impl From<HistoryError> for Halt {
    fn from(source: HistoryError) -> Self {
        Halt::Fatal(SessionError::History { source })
    }
}

impl From<SessionError> for Halt {
    fn from(error: SessionError) -> Self {
        Halt::Fatal(error)
    }
}

/// Drives one game session across the two-sided turn cycle.
pub struct Orchestrator {
    config: BridgeConfig,
    session: GameSession,
    history: HistoryFile,
    watcher: SensorWatcher,
    engine: EngineRunner,
    link: Box<dyn MoveLink>,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    control: SessionControl,
    state: TurnState,
}

impl Orchestrator {
    /// Creates an orchestrator for a validated configuration and an open
    /// link to the actuator.
    pub fn new(
        config: BridgeConfig,
        link: Box<dyn MoveLink>,
        event_tx: mpsc::UnboundedSender<SessionEvent>,
        control: SessionControl,
    ) -> Self {
        let session = GameSession::new(*config.color(), *config.board_size());
        let history = HistoryFile::new(config.history_file());
        let watcher = SensorWatcher::from_config(&config);
        let engine = EngineRunner::from_config(&config);
        let state = match session.local() {
            Stone::Black => TurnState::InvokingEngine,
            Stone::White => TurnState::AwaitingOpeningMove,
        };
        Self {
            config,
            session,
            history,
            watcher,
            engine,
            link,
            event_tx,
            control,
            state,
        }
    }

    /// Runs the session until it stops, resets, or fails.
    ///
    /// Stalls park the session (no further automated progress, no file
    /// mutation) until the front end stops or resets it. Fatal errors emit
    /// [`SessionEvent::Fatal`] and return the error.
    #[instrument(skip(self), fields(local = %self.session.local()))]
    pub async fn run(&mut self) -> Result<SessionEnd, SessionError> {
        match self.drive().await {
            Err(Halt::Interrupted) => self.unwind().await,
            Err(Halt::Stalled) => self.park().await,
            Err(Halt::Fatal(e)) => {
                self.enter(TurnState::GameOver);
                error!(error = %e, "session aborted");
                let _ = self.event_tx.send(SessionEvent::Fatal(e.to_string()));
                let _ = self
                    .event_tx
                    .send(SessionEvent::Status(StatusLine::now(format!("Error: {e}"))));
                Err(e)
            }
            Ok(never) => match never {},
        }
    }

    /// The turn loop proper. Only ever returns by halting.
    async fn drive(&mut self) -> Result<Infallible, Halt> {
        let local = self.session.local();
        self.status(format!("Game started, local side plays {local}"))?;

        match local {
            Stone::Black => {
                // Black opens: seed the history with the synthetic opening
                // marker so the engine proposes the first stone.
                self.history.begin(&MoveRecord::OpeningSentinel).await?;
                self.status("Opening as Black, engine moves first")?;
            }
            Stone::White => {
                self.status("Waiting for the opponent's opening stone")?;
                let settlement = self.await_board(1).await?;
                let record = self.record_for(&settlement)?;
                self.history.begin(&record).await?;
                self.status(format!("Recorded opponent opening: {record}"))?;
                self.adopt(settlement)?;
                self.session.finish_opening();
            }
        }

        loop {
            self.enter(TurnState::InvokingEngine);
            self.status(format!("Round {} started", self.session.turn()))?;
            self.status("Invoking engine")?;
            let proposed = self.engine.run(&self.control).await?;
            self.status(format!("Engine proposes {proposed}"))?;

            self.enter(TurnState::AwaitingCommitAck);
            self.status("Sending move to the actuator")?;
            commit_move(self.link.as_mut(), &proposed, &self.control).await?;
            self.status("Actuator acknowledged")?;

            self.enter(TurnState::AwaitingOwnSettlement);
            let expected = if self.session.first_move() && local == Stone::Black {
                1
            } else {
                2
            };
            self.status(format!(
                "Waiting for our placement, expecting {expected} stone(s)"
            ))?;
            let settlement = self.await_board(expected).await?;
            self.record_settlement(settlement, "our").await?;
            self.session.finish_opening();

            self.enter(TurnState::AwaitingOpponentSettlement);
            self.status("Waiting for the opponent, expecting 2 stones")?;
            let settlement = self.await_board(2).await?;
            self.record_settlement(settlement, "opponent").await?;

            self.enter(TurnState::RoundComplete);
            let next = self.history.advance_turn().await?;
            self.session.advance_turn();
            self.status(format!("Round {} complete", next - 1))?;
        }
    }

    async fn await_board(&self, expected_changes: usize) -> Result<Settlement, Halt> {
        let settlement = self
            .watcher
            .await_settlement(self.session.committed(), expected_changes, &self.control)
            .await?;
        Ok(settlement)
    }

    /// Appends the settlement to the history and commits it to the session.
    ///
    /// A settlement that resolved with a single changed cell is recorded as
    /// a single-stone record even mid-game; the engine's history parser
    /// relies on that shape for the opening and tolerates it elsewhere.
    async fn record_settlement(
        &mut self,
        settlement: Settlement,
        side: &str,
    ) -> Result<(), Halt> {
        let record = self.record_for(&settlement)?;
        self.history.record_move(&record).await?;
        self.status(format!("Recorded {side} move: {record}"))?;
        self.adopt(settlement)?;
        Ok(())
    }

    fn record_for(&self, settlement: &Settlement) -> Result<MoveRecord, Halt> {
        // The watcher only accepts diffs of the expected size, so a record
        // always exists; a miss here means its contract was broken.
        MoveRecord::from_placement(settlement.placed()).ok_or_else(|| {
            Halt::Fatal(SessionError::History {
                source: HistoryError::Malformed {
                    line: format!("{:?}", settlement.placed()),
                },
            })
        })
    }

    /// Installs the settled grid, snapshots it as committed, and tells the
    /// front end to redraw.
    fn adopt(&mut self, settlement: Settlement) -> Result<(), Halt> {
        self.session.install(settlement.into_grid());
        self.session.commit();
        self.event_tx
            .send(SessionEvent::BoardUpdated(self.session.current().clone()))
            .map_err(|_| Halt::Fatal(SessionError::ChannelClosed))?;
        Ok(())
    }

    /// Handles a stop or reset request observed inside a wait loop.
    async fn unwind(&mut self) -> Result<SessionEnd, SessionError> {
        self.enter(TurnState::GameOver);
        if self.control.reset_requested() {
            init_files(&self.config)
                .await
                .map_err(|source| SessionError::Init { source })?;
            self.session.reset();
            self.control.acknowledge_reset();
            self.status("Session reset, files reinitialized")?;
            info!("session reset");
            Ok(SessionEnd::Reset)
        } else {
            self.status("Session stopped")?;
            info!("session stopped");
            Ok(SessionEnd::Stopped)
        }
    }

    /// Parks a stalled session until the front end intervenes.
    async fn park(&mut self) -> Result<SessionEnd, SessionError> {
        self.event_tx
            .send(SessionEvent::Stalled)
            .map_err(|_| SessionError::ChannelClosed)?;
        self.status(format!(
            "No board activity for {}s, waiting for stop or reset",
            self.config.stall_timeout().as_secs()
        ))?;
        while !self.control.interrupted() {
            sleep(self.config.poll_interval()).await;
        }
        self.unwind().await
    }

    fn enter(&mut self, state: TurnState) {
        debug!(from = %self.state, to = %state, "state transition");
        self.state = state;
    }

    fn status(&self, text: impl Into<String>) -> Result<(), SessionError> {
        let line = StatusLine::now(text);
        info!(status = %line.text(), "status");
        self.event_tx
            .send(SessionEvent::Status(line))
            .map_err(|_| SessionError::ChannelClosed)
    }
}

/// Runs one session to completion: the library's single entry point for
/// front ends.
///
/// The caller owns the receiving end of `event_tx` and the `control`
/// handle; `link` is an already-open connection to the actuator. Game files
/// should be initialized (see [`init_files`]) before calling.
pub async fn run_session(
    config: BridgeConfig,
    link: Box<dyn MoveLink>,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    control: SessionControl,
) -> Result<SessionEnd, SessionError> {
    let mut orchestrator = Orchestrator::new(config, link, event_tx, control);
    orchestrator.run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_line_renders_time_then_text() {
        let line = StatusLine::now("Round 1 started");
        let rendered = line.to_string();
        assert!(rendered.ends_with(" - Round 1 started"));
        // HH:MM:SS prefix.
        assert_eq!(rendered.split(" - ").next().map(str::len), Some(8));
    }

    #[test]
    fn turn_states_display_by_name() {
        assert_eq!(TurnState::InvokingEngine.to_string(), "InvokingEngine");
        assert_eq!(TurnState::GameOver.to_string(), "GameOver");
    }
}
