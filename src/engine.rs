//! External search-engine invocation and output parsing.
//!
//! The engine is a separately built program: it reads the history file,
//! searches, and overwrites the engine-output file with its proposed move
//! pair. It communicates only through those files, never via stdio.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use derive_more::{Display, Error};
use tokio::process::Command;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, instrument, warn};

use crate::config::BridgeConfig;
use crate::session::SessionControl;

/// The engine's proposed move: four raw integers exactly as printed.
///
/// `-1` components are legal — the engine emits `x y -1 -1` for the
/// single-stone opening — and are transmitted over serial verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineMove {
    /// First stone, column.
    pub x1: i32,
    /// First stone, row.
    pub y1: i32,
    /// Second stone, column.
    pub x2: i32,
    /// Second stone, row.
    pub y2: i32,
}

impl EngineMove {
    /// Parses the first four whitespace-separated integers of the engine's
    /// output. Extra tokens (scores, debug output) are ignored.
    pub fn parse(text: &str) -> Result<Self, EngineError> {
        let malformed = || EngineError::MalformedOutput {
            content: text.trim().to_string(),
        };
        let mut tokens = text.split_whitespace();
        let mut next = || -> Result<i32, EngineError> {
            tokens
                .next()
                .ok_or_else(|| malformed())?
                .parse()
                .map_err(|_| malformed())
        };
        Ok(Self {
            x1: next()?,
            y1: next()?,
            x2: next()?,
            y2: next()?,
        })
    }

    /// The wire form sent to the actuator: `"x1 y1 x2 y2"`.
    pub fn to_line(&self) -> String {
        format!("{} {} {} {}", self.x1, self.y1, self.x2, self.y2)
    }
}

impl std::fmt::Display for EngineMove {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}) and ({}, {})",
            self.x1, self.y1, self.x2, self.y2
        )
    }
}

/// Engine invocation failure. All variants are fatal to the session: a
/// half-finished engine run cannot be resumed safely, so there is no retry.
#[derive(Debug, Display, Error)]
pub enum EngineError {
    /// The engine process could not be launched.
    #[display("failed to launch engine {command:?}: {source}")]
    Spawn {
        /// The program that failed to start.
        command: String,
        /// The spawn error.
        source: std::io::Error,
    },
    /// Polling the child process failed.
    #[display("failed to wait on engine: {source}")]
    Wait {
        /// The wait error.
        source: std::io::Error,
    },
    /// The engine did not exit within the configured timeout.
    #[display("engine did not exit within {secs}s")]
    Timeout {
        /// The configured timeout in seconds.
        secs: u64,
    },
    /// The engine exited with a non-zero status.
    #[display("engine exited with {status}")]
    Crashed {
        /// The exit status.
        status: std::process::ExitStatus,
    },
    /// The engine-output file could not be read.
    #[display("failed to read engine output {path:?}: {source}")]
    Output {
        /// The output file path.
        path: PathBuf,
        /// The read error.
        source: std::io::Error,
    },
    /// The output file held fewer than four integers.
    #[display("malformed engine output: {content:?}")]
    MalformedOutput {
        /// The offending content.
        content: String,
    },
    /// A stop or reset request arrived while the engine was running.
    #[display("engine run interrupted")]
    Interrupted,
}

/// Launches the engine process and parses its proposed move.
#[derive(Debug, Clone)]
pub struct EngineRunner {
    command: Vec<String>,
    dir: Option<PathBuf>,
    output_file: PathBuf,
    timeout: Duration,
    poll_interval: Duration,
}

impl EngineRunner {
    /// Creates a runner with explicit parameters. `command` must be
    /// non-empty; [`BridgeConfig::validate`] enforces this upstream.
    pub fn new(
        command: Vec<String>,
        dir: Option<PathBuf>,
        output_file: impl Into<PathBuf>,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            command,
            dir,
            output_file: output_file.into(),
            timeout,
            poll_interval,
        }
    }

    /// Creates a runner from the bridge configuration.
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(
            config.engine_command().clone(),
            config.engine_dir().as_ref().map(PathBuf::from),
            config.engine_output_file(),
            config.engine_timeout(),
            config.poll_interval(),
        )
    }

    /// Runs the engine to completion and parses the output file.
    ///
    /// The child is polled on the usual cadence so stop/reset requests are
    /// observed promptly; an interrupted or timed-out child is killed.
    #[instrument(skip(self, control), fields(command = ?self.command))]
    pub async fn run(&self, control: &SessionControl) -> Result<EngineMove, EngineError> {
        let program = self.command.first().cloned().unwrap_or_default();
        let mut cmd = Command::new(&program);
        cmd.args(self.command.get(1..).unwrap_or(&[]))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = &self.dir {
            cmd.current_dir(dir);
        }

        info!("launching engine");
        let mut child = cmd.spawn().map_err(|source| EngineError::Spawn {
            command: program,
            source,
        })?;
        let started = Instant::now();

        let status = loop {
            if control.interrupted() {
                warn!("engine run interrupted, killing child");
                let _ = child.kill().await;
                return Err(EngineError::Interrupted);
            }
            match child.try_wait().map_err(|source| EngineError::Wait { source })? {
                Some(status) => break status,
                None => {
                    if started.elapsed() >= self.timeout {
                        warn!(secs = self.timeout.as_secs(), "engine timed out, killing child");
                        let _ = child.kill().await;
                        return Err(EngineError::Timeout {
                            secs: self.timeout.as_secs(),
                        });
                    }
                    sleep(self.poll_interval).await;
                }
            }
        };

        if !status.success() {
            return Err(EngineError::Crashed { status });
        }
        debug!(elapsed = ?started.elapsed(), "engine exited cleanly");

        let content = tokio::fs::read_to_string(&self.output_file)
            .await
            .map_err(|source| EngineError::Output {
                path: self.output_file.clone(),
                source,
            })?;
        let proposed = EngineMove::parse(&content)?;
        info!(%proposed, "engine proposed a move");
        Ok(proposed)
    }
}
