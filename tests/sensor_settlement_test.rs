//! Settlement properties of the sensor-file watcher.
//!
//! These run against real files and short real durations: the quiet window
//! is tens of milliseconds so each test finishes quickly while still
//! exercising the debounce ordering.

use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;
use tokio::time::Instant;

use connect6_bridge::{Cell, Grid, Point, SensorWatcher, SessionControl, Stone, WatchError};

const QUIET: Duration = Duration::from_millis(100);
const POLL: Duration = Duration::from_millis(10);

fn sensor_path(dir: &TempDir) -> PathBuf {
    dir.path().join("Input.txt")
}

fn watcher(dir: &TempDir, stall: Duration) -> SensorWatcher {
    SensorWatcher::new(sensor_path(dir), 9, QUIET, POLL, stall)
}

fn grid_with(stones: &[(usize, usize, Stone)]) -> Grid {
    let mut grid = Grid::empty(9);
    for &(x, y, stone) in stones {
        grid.set(x, y, Cell::Occupied(stone));
    }
    grid
}

async fn write_grid(dir: &TempDir, grid: &Grid) {
    tokio::fs::write(sensor_path(dir), grid.to_sensor_text())
        .await
        .expect("write failed");
}

#[tokio::test]
async fn single_change_settles_with_its_coordinate() {
    let dir = TempDir::new().expect("temp dir");
    let committed = Grid::empty(9);
    write_grid(&dir, &grid_with(&[(3, 3, Stone::Black)])).await;

    let settlement = watcher(&dir, Duration::from_secs(5))
        .await_settlement(&committed, 1, &SessionControl::new())
        .await
        .expect("should settle");

    assert_eq!(settlement.placed(), &[Point::new(3, 3)]);
    assert_eq!(*settlement.color(), Stone::Black);
    assert_eq!(settlement.grid(), &grid_with(&[(3, 3, Stone::Black)]));
}

#[tokio::test]
async fn settlement_waits_quiet_duration_after_last_change() {
    let dir = TempDir::new().expect("temp dir");
    let committed = Grid::empty(9);
    write_grid(&dir, &grid_with(&[(0, 0, Stone::Black)])).await;

    // Rewrite the file mid-quiet-window; settlement must not fire until the
    // quiet duration has elapsed after this second write.
    let rewrite_delay = Duration::from_millis(30);
    let writer = {
        let dir_path = sensor_path(&dir);
        tokio::spawn(async move {
            tokio::time::sleep(rewrite_delay).await;
            let grid = grid_with(&[(5, 5, Stone::Black)]);
            tokio::fs::write(dir_path, grid.to_sensor_text())
                .await
                .expect("rewrite failed");
            Instant::now()
        })
    };

    let started = Instant::now();
    let settlement = watcher(&dir, Duration::from_secs(5))
        .await_settlement(&committed, 1, &SessionControl::new())
        .await
        .expect("should settle");
    let settled_at = Instant::now();
    let rewritten_at = writer.await.expect("writer task failed");

    assert_eq!(settlement.placed(), &[Point::new(5, 5)]);
    assert!(
        settled_at - rewritten_at >= QUIET,
        "settled {:?} after the last change, quiet window is {:?}",
        settled_at - rewritten_at,
        QUIET
    );
    assert!(settled_at - started >= rewrite_delay + QUIET);
}

#[tokio::test]
async fn mixed_colors_never_settle() {
    let dir = TempDir::new().expect("temp dir");
    let committed = Grid::empty(9);
    write_grid(
        &dir,
        &grid_with(&[(3, 3, Stone::Black), (4, 4, Stone::White)]),
    )
    .await;

    let result = watcher(&dir, Duration::from_millis(400))
        .await_settlement(&committed, 2, &SessionControl::new())
        .await;
    assert_eq!(result.unwrap_err(), WatchError::Stalled);
}

#[tokio::test]
async fn wrong_change_count_rejected_until_corrected() {
    let dir = TempDir::new().expect("temp dir");
    let committed = Grid::empty(9);
    // Two stones while one is expected.
    write_grid(
        &dir,
        &grid_with(&[(1, 1, Stone::Black), (2, 2, Stone::Black)]),
    )
    .await;

    let writer = {
        let path = sensor_path(&dir);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            let grid = grid_with(&[(1, 1, Stone::Black)]);
            tokio::fs::write(path, grid.to_sensor_text())
                .await
                .expect("rewrite failed");
        })
    };

    let settlement = watcher(&dir, Duration::from_secs(5))
        .await_settlement(&committed, 1, &SessionControl::new())
        .await
        .expect("should settle after correction");
    writer.await.expect("writer task failed");
    assert_eq!(settlement.placed(), &[Point::new(1, 1)]);
}

#[tokio::test]
async fn settled_content_does_not_settle_again() {
    let dir = TempDir::new().expect("temp dir");
    let committed = Grid::empty(9);
    let settled = grid_with(&[(3, 3, Stone::Black)]);
    write_grid(&dir, &settled).await;

    let control = SessionControl::new();
    let first = watcher(&dir, Duration::from_secs(5))
        .await_settlement(&committed, 1, &control)
        .await
        .expect("first settlement");

    // Against the updated committed grid, identical content has an empty
    // diff and must stall rather than re-trigger.
    let second = watcher(&dir, Duration::from_millis(400))
        .await_settlement(first.grid(), 1, &control)
        .await;
    assert_eq!(second.unwrap_err(), WatchError::Stalled);
}

#[tokio::test]
async fn missing_file_is_tolerated_until_it_appears() {
    let dir = TempDir::new().expect("temp dir");
    let committed = Grid::empty(9);

    let writer = {
        let path = sensor_path(&dir);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(80)).await;
            let grid = grid_with(&[(8, 0, Stone::White)]);
            tokio::fs::write(path, grid.to_sensor_text())
                .await
                .expect("write failed");
        })
    };

    let settlement = watcher(&dir, Duration::from_secs(5))
        .await_settlement(&committed, 1, &SessionControl::new())
        .await
        .expect("should settle once the file exists");
    writer.await.expect("writer task failed");
    assert_eq!(*settlement.color(), Stone::White);
}

#[tokio::test]
async fn stop_request_interrupts_the_wait() {
    let dir = TempDir::new().expect("temp dir");
    write_grid(&dir, &Grid::empty(9)).await;
    let control = SessionControl::new();

    let stopper = {
        let control = control.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            control.request_stop();
        })
    };

    let result = watcher(&dir, Duration::from_secs(60))
        .await_settlement(&Grid::empty(9), 2, &control)
        .await;
    stopper.await.expect("stopper task failed");
    assert_eq!(result.unwrap_err(), WatchError::Interrupted);
}
