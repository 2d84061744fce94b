// State management module
//
// This module provides the StateManager which wraps RunState with thread-safe access
// using Arc<RwLock<T>> and emits change events for whoever renders a run.

use crate::models::RunState;
use camino::Utf8PathBuf;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

/// Change events emitted when state is modified
///
/// These are the run's output stream: feed lines, progress, the stall timer
/// and the final status of every folder iteration.
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// A run has started
    RunStarted { folders_total: usize },

    /// A destination folder iteration has started
    FolderStarted {
        index: usize,
        destination: Option<Utf8PathBuf>,
        quota: usize,
    },

    /// A file was copied; `line` is the run log line
    FileCopied { line: String, dest_name: String },

    /// Progress within the current folder changed
    ProgressUpdated { copied: usize, quota: usize },

    /// A rejected file, reported when invalid files are shown
    InvalidFile { line: String },

    /// The stall window restarted after a copy
    StallTimerReset,

    /// Periodic stall window countdown
    StallTimerTick { remaining: Duration },

    /// A folder iteration ended; `summary` is the full status block
    FolderFinished { status: String, summary: String },

    /// The run has finished
    RunFinished { total_copied: usize, total_bytes: u64 },

    /// State has been reset
    StateReset,
}

/// Thread-safe state manager with event emission
///
/// - Provides thread-safe access to [`RunState`] via `Arc<RwLock<T>>`
/// - Detects state changes and emits [`StateChange`] events
/// - Supports subscribing to state changes via tokio broadcast channels
///
/// # Usage
///
/// Always use `StateManager` instead of accessing [`RunState`] directly:
/// - [`read()`](Self::read) for reading a few fields
/// - [`update()`](Self::update) for mutations with automatic event emission
/// - [`subscribe()`](Self::subscribe) for listening to state changes
///
/// # Related Types
///
/// - [`crate::services::Orchestrator`]: the writer during a run
/// - [`crate::control::RunController`]: hands the event stream to callers
pub struct StateManager {
    /// The run state protected by RwLock for thread-safe access
    state: Arc<RwLock<RunState>>,

    /// Broadcast channel for emitting state change events
    state_tx: broadcast::Sender<StateChange>,
}

impl StateManager {
    /// Create a new StateManager with default state
    ///
    /// The broadcast buffer holds 1024 events; a subscriber that falls
    /// further behind observes `RecvError::Lagged`.
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(1024);
        Self {
            state: Arc::new(RwLock::new(RunState::default())),
            state_tx,
        }
    }

    /// Get a clone of the current state
    pub fn snapshot(&self) -> RunState {
        self.state.read().unwrap().clone()
    }

    /// Execute a function with read access to the state
    ///
    /// # Example
    /// ```ignore
    /// let running = state_manager.read(|state| state.is_running);
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&RunState) -> R,
    {
        let state = self.state.read().unwrap();
        f(&state)
    }

    /// Update the state and emit change events
    ///
    /// 1. Captures the old state
    /// 2. Applies the update function
    /// 3. Detects what changed
    /// 4. Emits appropriate events
    ///
    /// Returns the events that were emitted.
    pub fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut RunState),
    {
        let mut state = self.state.write().unwrap();
        let old_state = state.clone();

        update_fn(&mut state);

        let changes = self.detect_changes(&old_state, &state);

        for change in &changes {
            // Ignore send errors - it's OK if no one is listening
            let _ = self.state_tx.send(change.clone());
        }

        changes
    }

    /// Subscribe to state change events
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    /// Send an event that is not derived from a state diff
    fn emit(&self, change: StateChange) -> StateChange {
        let _ = self.state_tx.send(change.clone());
        change
    }

    /// Detect what changed between two states and generate events
    fn detect_changes(&self, old: &RunState, new: &RunState) -> Vec<StateChange> {
        let mut changes = Vec::new();

        if old.is_running != new.is_running && new.is_running {
            changes.push(StateChange::RunStarted {
                folders_total: new.folders_total,
            });
        }

        if old.folder_index != new.folder_index && new.folder_index > 0 {
            changes.push(StateChange::FolderStarted {
                index: new.folder_index,
                destination: new.current_destination.clone(),
                quota: new.quota,
            });
        }

        if old.copied != new.copied || old.quota != new.quota {
            changes.push(StateChange::ProgressUpdated {
                copied: new.copied,
                quota: new.quota,
            });
        }

        if new.stall_reset_at.is_some() && old.stall_reset_at != new.stall_reset_at {
            changes.push(StateChange::StallTimerReset);
        }

        if old.is_running != new.is_running && !new.is_running {
            changes.push(StateChange::RunFinished {
                total_copied: new.total_copied,
                total_bytes: new.total_bytes,
            });
        }

        changes
    }

    // Convenience methods for common state updates

    /// Start a run over `folders_total` folder iterations
    pub fn start_run(&self, folders_total: usize, stall_timeout: Duration) -> Vec<StateChange> {
        self.update(|state| {
            state.reset_run_state();
            state.is_running = true;
            state.folders_total = folders_total;
            state.stall_timeout = stall_timeout;
        })
    }

    /// Enter folder iteration `index` (1-based)
    pub fn begin_folder(
        &self,
        index: usize,
        destination: Utf8PathBuf,
        quota: usize,
    ) -> Vec<StateChange> {
        self.update(|state| {
            state.reset_folder_progress();
            state.folder_index = index;
            state.current_destination = Some(destination);
            state.quota = quota;
            state.stall_reset_at = Some(Instant::now());
        })
    }

    /// Record a copied file
    pub fn record_copy(&self, line: String, dest_name: String, bytes: u64) -> Vec<StateChange> {
        let copied = self.emit(StateChange::FileCopied { line, dest_name });

        let mut changes = vec![copied];
        changes.extend(self.update(|state| {
            state.record_copy(bytes);
            state.stall_reset_at = Some(Instant::now());
        }));
        changes
    }

    /// Report a rejected file to the feed
    pub fn record_invalid(&self, line: String) -> Vec<StateChange> {
        vec![self.emit(StateChange::InvalidFile { line })]
    }

    /// Close the current folder iteration with its status
    pub fn finish_folder(&self, status: String, summary: String) -> Vec<StateChange> {
        let mut changes = self.update(|state| {
            state.statuses.push(status.clone());
            state.stall_reset_at = None;
        });
        changes.push(self.emit(StateChange::FolderFinished { status, summary }));
        changes
    }

    /// Mark the run as finished
    pub fn finish_run(&self) -> Vec<StateChange> {
        self.update(|state| {
            state.is_running = false;
            state.stall_reset_at = None;
        })
    }

    /// Flag that a stop was requested
    pub fn request_stop(&self) -> Vec<StateChange> {
        self.update(|state| {
            state.stop_requested = true;
        })
    }

    /// Emit a stall countdown tick if a folder iteration is active
    pub fn stall_tick(&self) -> Option<StateChange> {
        let remaining = self.read(|state| {
            if state.is_running {
                state.stall_remaining()
            } else {
                None
            }
        })?;
        Some(self.emit(StateChange::StallTimerTick { remaining }))
    }

    /// Reset all run state
    pub fn reset_run_state(&self) -> Vec<StateChange> {
        let mut changes = self.update(|state| {
            state.reset_run_state();
        });
        changes.push(self.emit(StateChange::StateReset));
        changes
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

// Make StateManager cloneable for sharing across threads
impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            state_tx: self.state_tx.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_manager() {
        let manager = StateManager::new();
        let state = manager.snapshot();

        assert!(!state.is_running);
        assert_eq!(state.copied, 0);
        assert!(state.statuses.is_empty());
    }

    #[test]
    fn test_update_with_change_detection() {
        let manager = StateManager::new();

        let changes = manager.update(|state| {
            state.is_running = true;
            state.quota = 10;
        });

        assert_eq!(changes.len(), 2);
        assert!(matches!(changes[0], StateChange::RunStarted { .. }));
        assert!(matches!(
            changes[1],
            StateChange::ProgressUpdated { copied: 0, quota: 10 }
        ));
    }

    #[test]
    fn test_run_lifecycle_events() {
        let manager = StateManager::new();

        let started = manager.start_run(2, Duration::from_secs(5));
        assert_eq!(started, vec![StateChange::RunStarted { folders_total: 2 }]);

        let folder = manager.begin_folder(1, Utf8PathBuf::from("/out/Mix"), 3);
        assert!(matches!(
            folder[0],
            StateChange::FolderStarted { index: 1, quota: 3, .. }
        ));
        assert!(folder.contains(&StateChange::ProgressUpdated { copied: 0, quota: 3 }));
        assert!(folder.contains(&StateChange::StallTimerReset));

        let copy = manager.record_copy("1: a.txt".to_string(), "a.txt".to_string(), 10);
        assert_eq!(
            copy[0],
            StateChange::FileCopied {
                line: "1: a.txt".to_string(),
                dest_name: "a.txt".to_string()
            }
        );
        assert!(copy.contains(&StateChange::ProgressUpdated { copied: 1, quota: 3 }));

        let finished = manager.finish_run();
        assert_eq!(
            finished,
            vec![StateChange::RunFinished {
                total_copied: 1,
                total_bytes: 10
            }]
        );
    }

    #[test]
    fn test_finish_folder_records_status() {
        let manager = StateManager::new();
        manager.start_run(1, Duration::from_secs(5));

        let changes = manager.finish_folder("TIMED OUT: 0/1 files copied".to_string(), "block".to_string());

        assert!(matches!(changes.last(), Some(StateChange::FolderFinished { .. })));
        assert_eq!(manager.snapshot().statuses, vec!["TIMED OUT: 0/1 files copied"]);
    }

    #[test]
    fn test_stall_tick_only_while_running() {
        let manager = StateManager::new();
        assert!(manager.stall_tick().is_none());

        manager.start_run(1, Duration::from_secs(30));
        assert!(manager.stall_tick().is_none());

        manager.begin_folder(1, Utf8PathBuf::from("/out"), 1);
        match manager.stall_tick() {
            Some(StateChange::StallTimerTick { remaining }) => {
                assert!(remaining <= Duration::from_secs(30));
            }
            other => panic!("expected a tick, got {other:?}"),
        }
    }

    #[test]
    fn test_request_stop() {
        let manager = StateManager::new();
        let changes = manager.request_stop();

        assert!(changes.is_empty());
        assert!(manager.read(|state| state.stop_requested));
    }

    #[test]
    fn test_reset_emits_state_reset() {
        let manager = StateManager::new();
        manager.start_run(1, Duration::from_secs(1));

        let changes = manager.reset_run_state();
        assert_eq!(changes.last(), Some(&StateChange::StateReset));
        assert!(!manager.snapshot().is_running);
    }

    #[tokio::test]
    async fn test_subscribe_receives_events() {
        let manager = StateManager::new();
        let mut rx = manager.subscribe();

        manager.record_invalid("**: bad.jpg".to_string());

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            StateChange::InvalidFile {
                line: "**: bad.jpg".to_string()
            }
        );
    }
}
