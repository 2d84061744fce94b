use camino::Utf8PathBuf;
use std::time::{Duration, Instant};

/// Observable progress of a run.
///
/// This is what a control surface renders: which folder iteration is active,
/// how many files of the current quota are in, and how much of the stall
/// window is left.
///
/// # Thread Safety
///
/// `RunState` is wrapped in `Arc<RwLock<RunState>>` by [`crate::state::StateManager`].
/// The orchestrator mutates it through [`StateManager::update`](crate::state::StateManager::update)
/// so that every mutation is turned into [`StateChange`](crate::state::StateChange) events.
#[derive(Clone, Debug)]
pub struct RunState {
    // Runtime state
    pub is_running: bool,
    pub stop_requested: bool,

    // Folder iteration
    pub folder_index: usize,
    pub folders_total: usize,
    pub current_destination: Option<Utf8PathBuf>,

    // Progress within the current folder
    pub copied: usize,
    pub quota: usize,

    // Aggregates across the run
    pub total_copied: usize,
    pub total_bytes: u64,
    pub statuses: Vec<String>,

    // Stall window
    pub stall_timeout: Duration,
    pub stall_reset_at: Option<Instant>,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            is_running: false,
            stop_requested: false,

            folder_index: 0,
            folders_total: 0,
            current_destination: None,

            copied: 0,
            quota: 0,

            total_copied: 0,
            total_bytes: 0,
            statuses: Vec::new(),

            stall_timeout: Duration::from_secs(10),
            stall_reset_at: None,
        }
    }
}

impl RunState {
    /// Reset everything a new run starts from.
    pub fn reset_run_state(&mut self) {
        self.is_running = false;
        self.stop_requested = false;
        self.folder_index = 0;
        self.folders_total = 0;
        self.current_destination = None;
        self.total_copied = 0;
        self.total_bytes = 0;
        self.statuses.clear();
        self.reset_folder_progress();
    }

    /// Reset per-folder progress before a new folder iteration.
    pub fn reset_folder_progress(&mut self) {
        self.copied = 0;
        self.quota = 0;
        self.stall_reset_at = None;
    }

    /// Record one copied file against the current folder and the run totals.
    pub fn record_copy(&mut self, bytes: u64) {
        self.copied += 1;
        self.total_copied += 1;
        self.total_bytes += bytes;
    }

    /// Time left before the current folder iteration stalls out.
    ///
    /// Returns `None` when no folder iteration is active.
    pub fn stall_remaining(&self) -> Option<Duration> {
        self.stall_reset_at
            .map(|reset| self.stall_timeout.saturating_sub(reset.elapsed()))
    }

    /// Short human readable summary of the run so far.
    pub fn run_summary(&self) -> String {
        if self.total_copied == 0 {
            return "No files copied".to_string();
        }

        let folders = if self.folders_total > 1 {
            format!(" across {} folders", self.folder_index)
        } else {
            String::new()
        };

        format!(
            "{} files copied{} ({:.2} MB)",
            self.total_copied,
            folders,
            self.total_bytes as f64 / 1_048_576.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state() {
        let state = RunState::default();
        assert!(!state.is_running);
        assert_eq!(state.copied, 0);
        assert!(state.stall_remaining().is_none());
    }

    #[test]
    fn test_record_copy() {
        let mut state = RunState {
            quota: 4,
            ..Default::default()
        };
        state.record_copy(100);
        state.record_copy(50);

        assert_eq!(state.copied, 2);
        assert_eq!(state.total_copied, 2);
        assert_eq!(state.total_bytes, 150);
    }

    #[test]
    fn test_reset_folder_progress_keeps_totals() {
        let mut state = RunState {
            quota: 2,
            stall_reset_at: Some(Instant::now()),
            ..Default::default()
        };
        state.record_copy(10);
        state.reset_folder_progress();

        assert_eq!(state.copied, 0);
        assert_eq!(state.quota, 0);
        assert!(state.stall_reset_at.is_none());
        assert_eq!(state.total_copied, 1);
    }

    #[test]
    fn test_reset_run_state() {
        let mut state = RunState {
            is_running: true,
            folder_index: 3,
            folders_total: 5,
            ..Default::default()
        };
        state.record_copy(10);
        state.statuses.push("SUCCESS: 1/1 files copied".to_string());
        state.reset_run_state();

        assert!(!state.is_running);
        assert_eq!(state.folder_index, 0);
        assert_eq!(state.total_copied, 0);
        assert!(state.statuses.is_empty());
    }

    #[test]
    fn test_stall_remaining_counts_down() {
        let state = RunState {
            stall_timeout: Duration::from_secs(60),
            stall_reset_at: Some(Instant::now()),
            ..Default::default()
        };
        let remaining = state.stall_remaining().unwrap();
        assert!(remaining <= Duration::from_secs(60));
        assert!(remaining > Duration::from_secs(50));
    }

    #[test]
    fn test_run_summary() {
        let mut state = RunState::default();
        assert_eq!(state.run_summary(), "No files copied");

        state.folders_total = 2;
        state.folder_index = 2;
        state.record_copy(1_048_576);
        assert_eq!(state.run_summary(), "1 files copied across 2 folders (1.00 MB)");
    }
}
