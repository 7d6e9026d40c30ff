//! Shared test helpers: a scripted in-memory actuator link.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use connect6_bridge::{LinkError, MoveLink};

/// What `recv_line` yields once the reply script runs out.
enum Exhausted {
    /// An immediate acknowledgement.
    Ack,
    /// Timeouts forever.
    Timeout,
    /// A transport failure.
    Fail,
}

/// An in-memory [`MoveLink`] that records sent lines and replays a script
/// of replies. `Some(line)` is a received line, `None` a read timeout.
pub struct ScriptedLink {
    sent: Arc<Mutex<Vec<String>>>,
    replies: VecDeque<Option<String>>,
    exhausted: Exhausted,
}

impl ScriptedLink {
    /// Creates a link that plays `replies`, then acknowledges every
    /// subsequent read.
    pub fn acking(replies: Vec<Option<&str>>) -> Self {
        Self::new(replies, Exhausted::Ack)
    }

    /// Creates a link that plays `replies`, then times out forever.
    pub fn silent(replies: Vec<Option<&str>>) -> Self {
        Self::new(replies, Exhausted::Timeout)
    }

    /// Creates a link that plays `replies`, then fails with an I/O error.
    pub fn failing(replies: Vec<Option<&str>>) -> Self {
        Self::new(replies, Exhausted::Fail)
    }

    fn new(replies: Vec<Option<&str>>, exhausted: Exhausted) -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            replies: replies
                .into_iter()
                .map(|r| r.map(str::to_string))
                .collect(),
            exhausted,
        }
    }

    /// A handle to the lines sent so far, usable after the link is boxed.
    pub fn sent_handle(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.sent)
    }
}

#[async_trait]
impl MoveLink for ScriptedLink {
    async fn send_line(&mut self, line: &str) -> Result<(), LinkError> {
        self.sent.lock().expect("sent lock poisoned").push(line.to_string());
        Ok(())
    }

    async fn recv_line(&mut self) -> Result<Option<String>, LinkError> {
        match self.replies.pop_front() {
            Some(reply) => Ok(reply),
            None => match self.exhausted {
                Exhausted::Ack => Ok(Some("1\n".to_string())),
                Exhausted::Timeout => {
                    // Simulate a read timeout without spinning hot.
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Ok(None)
                }
                Exhausted::Fail => Err(LinkError::Io {
                    source: std::io::Error::new(
                        std::io::ErrorKind::BrokenPipe,
                        "scripted link failure",
                    ),
                }),
            },
        }
    }
}
