//! Move-record codec and the persisted history file consumed by the engine.
//!
//! The file layout is: line 1 holds the turn counter as a bare integer, and
//! every following line is one half-turn record of four space-separated
//! integers. Single-stone placements carry a `-1 -1` tail; the synthetic
//! opening marker written before Black's first engine run is `-1 -1 -1 -1`.

use std::path::{Path, PathBuf};

use derive_more::{Display, Error};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use crate::board::Point;

/// One half-turn's stone placement(s), as persisted to the history file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveRecord {
    /// Synthetic marker written when the local side opens the game.
    OpeningSentinel,
    /// A single placed stone.
    Single(Point),
    /// Two placed stones, in row-major scan order.
    Pair(Point, Point),
}

impl MoveRecord {
    /// Builds a record from the changed points of a settlement.
    ///
    /// Returns `None` unless exactly one or two points are given.
    pub fn from_placement(placed: &[Point]) -> Option<Self> {
        match placed {
            [p] => Some(MoveRecord::Single(*p)),
            [a, b] => Some(MoveRecord::Pair(*a, *b)),
            _ => None,
        }
    }

    /// Parses one history-file line back into a record.
    pub fn parse_line(line: &str) -> Result<Self, HistoryError> {
        let malformed = || HistoryError::Malformed {
            line: line.to_string(),
        };
        let values: Vec<i32> = line
            .split_whitespace()
            .map(|t| t.parse::<i32>())
            .collect::<Result<_, _>>()
            .map_err(|_| malformed())?;
        let [x1, y1, x2, y2] = values[..] else {
            return Err(malformed());
        };
        let point = |x: i32, y: i32| {
            if x >= 0 && y >= 0 {
                Ok(Point::new(x as usize, y as usize))
            } else {
                Err(malformed())
            }
        };
        match (x1, y1, x2, y2) {
            (-1, -1, -1, -1) => Ok(MoveRecord::OpeningSentinel),
            (x, y, -1, -1) => Ok(MoveRecord::Single(point(x, y)?)),
            (x1, y1, x2, y2) => Ok(MoveRecord::Pair(point(x1, y1)?, point(x2, y2)?)),
        }
    }
}

impl std::fmt::Display for MoveRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MoveRecord::OpeningSentinel => write!(f, "-1 -1 -1 -1"),
            MoveRecord::Single(p) => write!(f, "{} {} -1 -1", p.x, p.y),
            MoveRecord::Pair(a, b) => write!(f, "{} {} {} {}", a.x, a.y, b.x, b.y),
        }
    }
}

/// History file failure.
#[derive(Debug, Display, Error)]
pub enum HistoryError {
    /// Underlying file I/O failed.
    #[display("history file I/O failed: {source}")]
    Io {
        /// The I/O error.
        source: std::io::Error,
    },
    /// The file content does not match the expected layout.
    #[display("malformed history content: {line:?}")]
    Malformed {
        /// The offending line.
        line: String,
    },
}

impl From<std::io::Error> for HistoryError {
    fn from(source: std::io::Error) -> Self {
        Self::Io { source }
    }
}

/// The persisted move-history file.
///
/// Writes are flush-complete before each method returns; the engine process
/// is only launched after that guarantee holds.
#[derive(Debug, Clone)]
pub struct HistoryFile {
    path: PathBuf,
}

impl HistoryFile {
    /// Creates a handle for the history file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The on-disk location of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Starts a new game: truncates the file and writes turn counter `1`
    /// followed by the bootstrap record.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn begin(&self, record: &MoveRecord) -> Result<(), HistoryError> {
        debug!(%record, "writing history bootstrap");
        self.write_all(&format!("1\n{record}\n")).await
    }

    /// Appends one record line.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn record_move(&self, record: &MoveRecord) -> Result<(), HistoryError> {
        debug!(%record, "appending move record");
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{record}\n").as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Increments the turn counter on line 1, preserving every record line.
    /// Returns the new counter value.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn advance_turn(&self) -> Result<u32, HistoryError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let (head, tail) = content.split_once('\n').unwrap_or((content.as_str(), ""));
        let counter: u32 = head.trim().parse().map_err(|_| HistoryError::Malformed {
            line: head.to_string(),
        })?;
        let next = counter + 1;
        self.write_all(&format!("{next}\n{tail}")).await?;
        debug!(turn = next, "turn counter advanced");
        Ok(next)
    }

    /// Truncates the file to empty.
    pub async fn clear(&self) -> Result<(), HistoryError> {
        self.write_all("").await
    }

    /// Reads the turn counter and all records back. Used for recovery and
    /// in tests; the steady-state loop only appends.
    pub async fn load(&self) -> Result<(u32, Vec<MoveRecord>), HistoryError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let mut lines = content.lines();
        let head = lines.next().ok_or_else(|| HistoryError::Malformed {
            line: String::new(),
        })?;
        let counter: u32 = head.trim().parse().map_err(|_| HistoryError::Malformed {
            line: head.to_string(),
        })?;
        let records = lines
            .filter(|l| !l.trim().is_empty())
            .map(MoveRecord::parse_line)
            .collect::<Result<_, _>>()?;
        Ok((counter, records))
    }

    async fn write_all(&self, content: &str) -> Result<(), HistoryError> {
        let mut file = tokio::fs::File::create(&self.path).await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
