//! History-file layout and turn-counter maintenance.

use tempfile::TempDir;

use connect6_bridge::{HistoryFile, MoveRecord, Point};

fn history(dir: &TempDir) -> HistoryFile {
    HistoryFile::new(dir.path().join("Con6Input.txt"))
}

async fn content(dir: &TempDir) -> String {
    tokio::fs::read_to_string(dir.path().join("Con6Input.txt"))
        .await
        .expect("read failed")
}

#[tokio::test]
async fn black_bootstrap_writes_counter_and_sentinel() {
    let dir = TempDir::new().expect("temp dir");
    let history = history(&dir);
    history
        .begin(&MoveRecord::OpeningSentinel)
        .await
        .expect("begin failed");
    assert_eq!(content(&dir).await, "1\n-1 -1 -1 -1\n");
}

#[tokio::test]
async fn white_bootstrap_writes_opponent_opening() {
    let dir = TempDir::new().expect("temp dir");
    let history = history(&dir);
    history
        .begin(&MoveRecord::Single(Point::new(3, 3)))
        .await
        .expect("begin failed");
    assert_eq!(content(&dir).await, "1\n3 3 -1 -1\n");
}

#[tokio::test]
async fn records_append_and_round_trip() {
    let dir = TempDir::new().expect("temp dir");
    let history = history(&dir);
    history
        .begin(&MoveRecord::Single(Point::new(3, 3)))
        .await
        .expect("begin failed");
    history
        .record_move(&MoveRecord::Pair(Point::new(4, 4), Point::new(5, 5)))
        .await
        .expect("record failed");

    let (turn, records) = history.load().await.expect("load failed");
    assert_eq!(turn, 1);
    assert_eq!(
        records,
        vec![
            MoveRecord::Single(Point::new(3, 3)),
            MoveRecord::Pair(Point::new(4, 4), Point::new(5, 5)),
        ]
    );
}

#[tokio::test]
async fn advance_turn_rewrites_only_the_header() {
    let dir = TempDir::new().expect("temp dir");
    let history = history(&dir);
    history
        .begin(&MoveRecord::OpeningSentinel)
        .await
        .expect("begin failed");
    history
        .record_move(&MoveRecord::Pair(Point::new(2, 4), Point::new(5, 6)))
        .await
        .expect("record failed");

    let turn = history.advance_turn().await.expect("advance failed");
    assert_eq!(turn, 2);
    assert_eq!(content(&dir).await, "2\n-1 -1 -1 -1\n2 4 5 6\n");

    let turn = history.advance_turn().await.expect("advance failed");
    assert_eq!(turn, 3);
    assert_eq!(content(&dir).await, "3\n-1 -1 -1 -1\n2 4 5 6\n");
}

#[tokio::test]
async fn advance_turn_rejects_missing_counter() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("Con6Input.txt");
    tokio::fs::write(&path, "not a number\n0 0 1 1\n")
        .await
        .expect("write failed");

    let history = HistoryFile::new(path);
    assert!(history.advance_turn().await.is_err());
}

#[tokio::test]
async fn clear_truncates_the_file() {
    let dir = TempDir::new().expect("temp dir");
    let history = history(&dir);
    history
        .begin(&MoveRecord::OpeningSentinel)
        .await
        .expect("begin failed");
    history.clear().await.expect("clear failed");
    assert_eq!(content(&dir).await, "");
}
