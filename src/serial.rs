//! Serial line transport and the move-commit handshake.
//!
//! The actuator contract is deliberately thin: one outbound line of four
//! ASCII integers, then inbound lines until one equal to `"1"` confirms the
//! stones are physically placed. Everything else on the wire is noise.

use std::time::Duration;

use async_trait::async_trait;
use derive_more::{Display, Error};
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::time::{Instant, timeout};
use tokio_serial::{DataBits, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::{debug, info, instrument};

use crate::engine::EngineMove;
use crate::session::SessionControl;

/// Serial transport failure. Transport-level failures mid-commit are fatal
/// to the session.
#[derive(Debug, Display, Error)]
pub enum LinkError {
    /// The port could not be opened.
    #[display("failed to open serial port {port}: {source}")]
    Open {
        /// The port name.
        port: String,
        /// The underlying serial error.
        source: tokio_serial::Error,
    },
    /// Port enumeration failed.
    #[display("failed to enumerate serial ports: {source}")]
    Enumerate {
        /// The underlying serial error.
        source: tokio_serial::Error,
    },
    /// Reading or writing the open link failed.
    #[display("serial I/O failed: {source}")]
    Io {
        /// The I/O error.
        source: std::io::Error,
    },
    /// The link reported end-of-stream.
    #[display("serial link disconnected")]
    Disconnected,
    /// A stop or reset request arrived while waiting for acknowledgement.
    #[display("serial commit interrupted")]
    Interrupted,
}

impl From<std::io::Error> for LinkError {
    fn from(source: std::io::Error) -> Self {
        Self::Io { source }
    }
}

/// A line-oriented link to the actuator.
///
/// Implemented by [`SerialLink`] for real hardware; tests substitute a
/// scripted implementation, so the commit protocol never needs a port.
#[async_trait]
pub trait MoveLink: Send {
    /// Writes `line` to the link exactly as given.
    async fn send_line(&mut self, line: &str) -> Result<(), LinkError>;

    /// Reads one line, bounded by the link's per-read timeout.
    ///
    /// Returns `Ok(None)` when the timeout elapses with nothing received.
    async fn recv_line(&mut self) -> Result<Option<String>, LinkError>;
}

/// [`MoveLink`] over a physical serial port: 8 data bits, no parity,
/// 1 stop bit.
///
/// Received bytes accumulate in a buffer that persists across
/// [`MoveLink::recv_line`] calls, so a line whose bytes straddle a
/// read-timeout boundary is never lost. After a timeout an unterminated
/// tail is handed back as-is; the actuator is known to send its
/// acknowledgement without a final newline.
pub struct SerialLink {
    reader: ReadHalf<SerialStream>,
    writer: WriteHalf<SerialStream>,
    pending: Vec<u8>,
    read_timeout: Duration,
}

impl SerialLink {
    /// Opens `port` at `baud` with the fixed 8N1 framing.
    #[instrument(skip(read_timeout))]
    pub fn open(port: &str, baud: u32, read_timeout: Duration) -> Result<Self, LinkError> {
        let stream = tokio_serial::new(port, baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .open_native_async()
            .map_err(|source| LinkError::Open {
                port: port.to_string(),
                source,
            })?;
        info!(port, baud, "serial port opened");
        Ok(Self::from_stream(stream, read_timeout))
    }

    /// Wraps an already-open stream, such as one end of a pseudo-terminal
    /// pair.
    pub fn from_stream(stream: SerialStream, read_timeout: Duration) -> Self {
        let (read, write) = tokio::io::split(stream);
        Self {
            reader: read,
            writer: write,
            pending: Vec::new(),
            read_timeout,
        }
    }

    /// Drains one `\n`-terminated line from the pending buffer, if present.
    fn take_line(&mut self) -> Option<String> {
        let pos = self.pending.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.pending.drain(..=pos).collect();
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

#[async_trait]
impl MoveLink for SerialLink {
    async fn send_line(&mut self, line: &str) -> Result<(), LinkError> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn recv_line(&mut self) -> Result<Option<String>, LinkError> {
        let deadline = Instant::now() + self.read_timeout;
        loop {
            if let Some(line) = self.take_line() {
                return Ok(Some(line));
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let mut chunk = [0u8; 256];
            // `read` is cancellation-safe: a timeout here drops no bytes,
            // anything received before it fired is already in `pending`.
            match timeout(remaining, self.reader.read(&mut chunk)).await {
                Err(_elapsed) => break,
                Ok(Ok(0)) => return Err(LinkError::Disconnected),
                Ok(Ok(n)) => self.pending.extend_from_slice(&chunk[..n]),
                Ok(Err(source)) => return Err(LinkError::Io { source }),
            }
        }
        if self.pending.is_empty() {
            return Ok(None);
        }
        // The timeout elapsed on an unterminated line; yield it rather
        // than hold a newline-less acknowledgement hostage.
        let tail = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Ok(Some(tail))
    }
}

/// Commits the engine's move to the physical board.
///
/// Sends `"x1 y1 x2 y2\n"` once, then reads lines until one, after
/// trimming, equals exactly `"1"`. Read timeouts and non-matching lines are
/// discarded and reading continues; the loop has no overall time bound —
/// the acknowledgement is the only exit besides an interrupt or a
/// transport failure.
#[instrument(skip(link, control), fields(mv = %mv))]
pub async fn commit_move(
    link: &mut dyn MoveLink,
    mv: &EngineMove,
    control: &SessionControl,
) -> Result<(), LinkError> {
    link.send_line(&format!("{}\n", mv.to_line())).await?;
    debug!("move sent, waiting for acknowledgement");

    loop {
        if control.interrupted() {
            return Err(LinkError::Interrupted);
        }
        match link.recv_line().await? {
            None => debug!("read timed out, still waiting"),
            Some(line) => {
                if line.trim() == "1" {
                    info!("actuator acknowledged move");
                    return Ok(());
                }
                debug!(line = %line.trim(), "discarding unexpected line");
            }
        }
    }
}

/// Lists the serial ports visible on this machine.
pub fn available_ports() -> Result<Vec<String>, LinkError> {
    let ports =
        tokio_serial::available_ports().map_err(|source| LinkError::Enumerate { source })?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}
