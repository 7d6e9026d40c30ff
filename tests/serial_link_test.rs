//! Line framing on the real serial link, driven over a pseudo-terminal
//! pair: bytes received before a read timeout must survive it.

#![cfg(unix)]

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::time::sleep;
use tokio_serial::SerialStream;

use connect6_bridge::{EngineMove, MoveLink, SerialLink, SessionControl, commit_move};

const READ_TIMEOUT: Duration = Duration::from_millis(100);

fn pair() -> (SerialLink, SerialStream) {
    let (ours, theirs) = SerialStream::pair().expect("pty pair");
    (SerialLink::from_stream(ours, READ_TIMEOUT), theirs)
}

#[tokio::test]
async fn ack_split_across_timeout_boundary_is_not_lost() {
    let (mut link, mut actuator) = pair();

    // The "1" arrives well before its newline, with read timeouts firing
    // in between; the acknowledgement must still be seen.
    let writer = tokio::spawn(async move {
        actuator.write_all(b"1").await.expect("write failed");
        actuator.flush().await.expect("flush failed");
        sleep(READ_TIMEOUT * 3).await;
        actuator.write_all(b"\n").await.expect("write failed");
        actuator.flush().await.expect("flush failed");
        actuator
    });

    let mv = EngineMove {
        x1: 2,
        y1: 4,
        x2: 5,
        y2: 6,
    };
    commit_move(&mut link, &mv, &SessionControl::new())
        .await
        .expect("commit failed");
    writer.await.expect("writer task failed");
}

#[tokio::test]
async fn buffered_bytes_split_into_lines() {
    let (mut link, mut actuator) = pair();
    actuator.write_all(b"ok\n1\n").await.expect("write failed");
    actuator.flush().await.expect("flush failed");

    assert_eq!(
        link.recv_line().await.expect("recv failed"),
        Some("ok\n".to_string())
    );
    assert_eq!(
        link.recv_line().await.expect("recv failed"),
        Some("1\n".to_string())
    );
}

#[tokio::test]
async fn unterminated_tail_is_yielded_after_the_timeout() {
    let (mut link, mut actuator) = pair();
    actuator.write_all(b"1").await.expect("write failed");
    actuator.flush().await.expect("flush failed");

    let line = link.recv_line().await.expect("recv failed");
    assert_eq!(line, Some("1".to_string()));
}

#[tokio::test]
async fn silent_link_times_out_with_none() {
    let (mut link, _actuator) = pair();
    assert_eq!(link.recv_line().await.expect("recv failed"), None);
}
