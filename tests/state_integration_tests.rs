//! Integration tests for StateManager with state change events
//!
//! These tests verify that the StateManager correctly:
//! - Emits the events of a folder iteration in order
//! - Supports multiple subscribers
//! - Handles concurrent copies recorded from multiple threads
//! - Keeps run totals across folder iterations

use camino::Utf8PathBuf;
use copyrandom::{StateChange, StateManager};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::{Duration, timeout};

async fn next(rx: &mut broadcast::Receiver<StateChange>) -> StateChange {
    timeout(Duration::from_millis(100), rx.recv())
        .await
        .expect("Timeout waiting for event")
        .expect("Channel closed")
}

#[tokio::test]
async fn test_run_started_event_emitted() {
    let state = Arc::new(StateManager::new());
    let mut rx = state.subscribe();

    state.start_run(2, Duration::from_secs(5));

    let event = next(&mut rx).await;
    assert!(
        matches!(event, StateChange::RunStarted { folders_total: 2 }),
        "Expected RunStarted event, got: {:?}",
        event
    );
}

#[tokio::test]
async fn test_multiple_subscribers_receive_events() {
    let state = Arc::new(StateManager::new());
    let mut rx1 = state.subscribe();
    let mut rx2 = state.subscribe();
    let mut rx3 = state.subscribe();

    state.record_invalid("**: cover.jpg".to_string());

    for rx in [&mut rx1, &mut rx2, &mut rx3] {
        let event = next(rx).await;
        assert_eq!(
            event,
            StateChange::InvalidFile {
                line: "**: cover.jpg".to_string()
            }
        );
    }
}

#[tokio::test]
async fn test_folder_iteration_event_order() {
    let state = Arc::new(StateManager::new());
    state.start_run(1, Duration::from_secs(5));
    let mut rx = state.subscribe();

    let destination = Utf8PathBuf::from("/picks/Random Files");
    state.begin_folder(1, destination.clone(), 3);

    assert_eq!(
        next(&mut rx).await,
        StateChange::FolderStarted {
            index: 1,
            destination: Some(destination),
            quota: 3
        }
    );
    assert_eq!(
        next(&mut rx).await,
        StateChange::ProgressUpdated { copied: 0, quota: 3 }
    );
    assert_eq!(next(&mut rx).await, StateChange::StallTimerReset);

    state.record_copy("1: a/b.mp3".to_string(), "b.mp3".to_string(), 10);
    assert_eq!(
        next(&mut rx).await,
        StateChange::FileCopied {
            line: "1: a/b.mp3".to_string(),
            dest_name: "b.mp3".to_string()
        }
    );
    assert_eq!(
        next(&mut rx).await,
        StateChange::ProgressUpdated { copied: 1, quota: 3 }
    );
}

#[tokio::test]
async fn test_finish_folder_and_run_events() {
    let state = Arc::new(StateManager::new());
    state.start_run(1, Duration::from_secs(5));
    state.begin_folder(1, Utf8PathBuf::from("/picks"), 1);
    state.record_copy("1: x.txt".to_string(), "x.txt".to_string(), 42);

    let mut rx = state.subscribe();
    state.finish_folder("SUCCESS: 1/1 files copied".to_string(), "summary".to_string());
    state.finish_run();

    let mut found_folder_finished = false;
    let mut found_run_finished = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            StateChange::FolderFinished { status, summary } => {
                assert_eq!(status, "SUCCESS: 1/1 files copied");
                assert_eq!(summary, "summary");
                found_folder_finished = true;
            }
            StateChange::RunFinished {
                total_copied,
                total_bytes,
            } => {
                assert_eq!(total_copied, 1);
                assert_eq!(total_bytes, 42);
                found_run_finished = true;
            }
            _ => {}
        }
    }
    assert!(found_folder_finished, "Should receive FolderFinished event");
    assert!(found_run_finished, "Should receive RunFinished event");
    assert_eq!(state.read(|s| s.statuses.clone()), vec!["SUCCESS: 1/1 files copied"]);
}

#[tokio::test]
async fn test_concurrent_copy_recording() {
    let state = Arc::new(StateManager::new());
    state.start_run(1, Duration::from_secs(5));
    state.begin_folder(1, Utf8PathBuf::from("/picks"), 100);

    let mut handles = vec![];
    for i in 0..10 {
        let state_clone = state.clone();
        handles.push(tokio::spawn(async move {
            state_clone.record_copy(format!("{i}: f{i}"), format!("f{i}"), 5);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let snapshot = state.snapshot();
    assert_eq!(snapshot.copied, 10);
    assert_eq!(snapshot.total_copied, 10);
    assert_eq!(snapshot.total_bytes, 50);
}

#[tokio::test]
async fn test_totals_survive_folder_iterations() {
    let state = Arc::new(StateManager::new());
    state.start_run(2, Duration::from_secs(5));

    state.begin_folder(1, Utf8PathBuf::from("/picks/A"), 1);
    state.record_copy("1: a".to_string(), "a".to_string(), 3);
    state.finish_folder("SUCCESS: 1/1 files copied".to_string(), String::new());

    state.begin_folder(2, Utf8PathBuf::from("/picks/B"), 2);
    state.record_copy("1: b".to_string(), "b".to_string(), 4);

    let snapshot = state.snapshot();
    assert_eq!(snapshot.copied, 1);
    assert_eq!(snapshot.quota, 2);
    assert_eq!(snapshot.total_copied, 2);
    assert_eq!(snapshot.total_bytes, 7);
}

#[tokio::test]
async fn test_reset_run_state() {
    let state = Arc::new(StateManager::new());
    state.start_run(1, Duration::from_secs(5));
    state.begin_folder(1, Utf8PathBuf::from("/picks"), 1);
    state.request_stop();

    let mut rx = state.subscribe();
    state.reset_run_state();

    let mut found_reset = false;
    while let Ok(event) = rx.try_recv() {
        if event == StateChange::StateReset {
            found_reset = true;
        }
    }
    assert!(found_reset, "Should receive StateReset event");

    let snapshot = state.snapshot();
    assert!(!snapshot.is_running);
    assert!(!snapshot.stop_requested);
    assert_eq!(snapshot.folder_index, 0);
    assert!(snapshot.current_destination.is_none());
}

#[tokio::test]
async fn test_stall_tick_reports_remaining_window() {
    let state = Arc::new(StateManager::new());
    assert!(state.stall_tick().is_none());

    state.start_run(1, Duration::from_secs(5));
    state.begin_folder(1, Utf8PathBuf::from("/picks"), 1);

    match state.stall_tick() {
        Some(StateChange::StallTimerTick { remaining }) => {
            assert!(remaining <= Duration::from_secs(5));
        }
        other => panic!("Expected StallTimerTick, got {:?}", other),
    }
}
