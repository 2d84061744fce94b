use crate::metrics::RunMetrics;
use crate::models::{ConfigError, RunConfig};
use crate::services::audio::{AudioProbe, DurationProbe};
use crate::services::copier::CopyEngine;
use crate::services::ledger::VisitationLedger;
use crate::services::provision::{ProvisionedFolder, provision_folder};
use crate::services::run_log::{PassFlags, RunLog, RunStatus, StatusBlock, local_now};
use crate::services::trash::{SystemTrash, Trash};
use crate::services::validity::ValidityChecker;
use crate::services::walker::{RejectReason, SelectionOutcome, StopSignal, WalkTools, Walker};
use crate::state::StateManager;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fs;
use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Failures that abort a run
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Search root {0} is not an accessible directory")]
    RootUnavailable(String),

    #[error("Destination {path} is not accessible: {source}")]
    DestinationUnavailable {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to provision a destination folder in {path}: {source}")]
    Provision {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write run log {path}: {source}")]
    LogWrite {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("Invalid filter: {0}")]
    Filter(#[from] regex::Error),
}

/// What a finished run did
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Terminal status of every folder iteration that ran
    pub statuses: Vec<RunStatus>,
    pub total_copied: usize,
    pub total_bytes: u64,
}

/// Feed line for a rejected file; the marker grows with the folder's copy count
pub fn invalid_feed_line(copied: usize, relative: &str) -> String {
    let marker = if copied >= 1000 {
        "****"
    } else if copied >= 100 {
        "***"
    } else {
        "**"
    };
    format!("{marker}: {relative}")
}

/// Drives the folder iterations of one run.
///
/// The run executes synchronously on the calling thread; progress is
/// published through the [`StateManager`] and cancellation is observed
/// through a [`StopSignal`].
pub struct Orchestrator {
    state: Arc<StateManager>,
    metrics: Arc<RunMetrics>,
    trash: Box<dyn Trash>,
    probe: Box<dyn DurationProbe>,
}

impl Orchestrator {
    pub fn new(state: Arc<StateManager>, metrics: Arc<RunMetrics>) -> Self {
        Self::with_services(
            state,
            metrics,
            Box::new(SystemTrash),
            Box::new(AudioProbe::new()),
        )
    }

    /// Build an orchestrator with explicit trash and duration probe backends
    pub fn with_services(
        state: Arc<StateManager>,
        metrics: Arc<RunMetrics>,
        trash: Box<dyn Trash>,
        probe: Box<dyn DurationProbe>,
    ) -> Self {
        Self {
            state,
            metrics,
            trash,
            probe,
        }
    }

    /// Run every folder iteration of `config` until done, stopped, or a
    /// fatal I/O error.
    pub fn run(self, config: RunConfig, stop: &StopSignal) -> Result<RunReport, RunError> {
        let config = config.validate()?;

        if !config.root.is_dir() {
            return Err(RunError::RootUnavailable(config.root.to_string()));
        }
        fs::create_dir_all(&config.destination).map_err(|source| {
            RunError::DestinationUnavailable {
                path: config.destination.to_string(),
                source,
            }
        })?;

        let Orchestrator {
            state,
            metrics,
            trash,
            probe,
        } = self;

        let checker = ValidityChecker::with_probe(&config, probe)?;
        let copier = CopyEngine::new(config.file_names.clone());
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        tracing::info!(
            "Starting run: {} -> {} ({} folder(s), quota {:?})",
            config.root,
            config.destination,
            config.folder_count(),
            config.quota
        );
        state.start_run(config.folder_count(), config.stall_timeout());

        let mut run = FolderRun {
            config: &config,
            state: state.as_ref(),
            metrics: metrics.as_ref(),
            tools: WalkTools {
                checker: &checker,
                copier: &copier,
                trash: trash.as_ref(),
                weights: config.weights,
                trash_options: config.trash,
                stall_timeout: config.stall_timeout(),
            },
            ledger: VisitationLedger::new(),
            rng: &mut rng,
            stop,
        };
        let result = run.run_all();

        let totals = state.read(|s| (s.total_copied, s.total_bytes));
        state.finish_run();
        metrics.log_summary();

        let statuses = result?;
        tracing::info!("Run finished: {}", state.read(|s| s.run_summary()));

        Ok(RunReport {
            statuses,
            total_copied: totals.0,
            total_bytes: totals.1,
        })
    }
}

/// Borrowed state of a run in progress
struct FolderRun<'a> {
    config: &'a RunConfig,
    state: &'a StateManager,
    metrics: &'a RunMetrics,
    tools: WalkTools<'a>,
    ledger: VisitationLedger,
    rng: &'a mut StdRng,
    stop: &'a StopSignal,
}

impl FolderRun<'_> {
    fn run_all(&mut self) -> Result<Vec<RunStatus>, RunError> {
        let mut statuses = Vec::new();

        for folder_index in 0..self.config.folder_count() {
            if self.stop.is_stopped() {
                tracing::info!("Stop requested before folder {}", folder_index + 1);
                break;
            }

            let status = self.run_folder(folder_index)?;
            statuses.push(status);

            if status.is_no_files_found() || status == RunStatus::Stopped {
                break;
            }
        }

        Ok(statuses)
    }

    fn run_folder(&mut self, folder_index: usize) -> Result<RunStatus, RunError> {
        let config = self.config;
        self.ledger
            .begin_folder_iteration(&config.root, config.folders.unique);

        let folder = provision_folder(&config.destination, &config.folders).map_err(|source| {
            RunError::Provision {
                path: config.destination.to_string(),
                source,
            }
        })?;
        let quota = config.quota.resolve(&mut *self.rng);
        tracing::info!(
            "Folder {}/{}: {} (quota {})",
            folder_index + 1,
            config.folder_count(),
            folder.path,
            quota
        );
        self.state
            .begin_folder(folder_index + 1, folder.path.clone(), quota);

        let mut log = RunLog::new(folder.log_path.clone(), folder.append);
        let flags = self.fill_quota(&folder, quota, &mut log);

        let copied = log.line_count();
        let status = RunStatus::classify(copied, quota, flags, config.folders.create);
        let status_line = status.line(copied, quota);
        let block = StatusBlock {
            status_line: status_line.clone(),
            at: local_now(),
            root: config.root.clone(),
            destination: folder.path.clone(),
            extensions: config.extensions.include.clone(),
            keywords: config.keywords.include.clone(),
            total_bytes: log.total_bytes(),
            runtime: log.elapsed(),
        };
        let summary = block.to_string();

        if status.is_no_files_found() {
            // Only folders this iteration created are ever removed
            if folder.created {
                if let Err(e) = fs::remove_dir_all(&folder.path) {
                    tracing::warn!("Failed to remove empty folder {}: {}", folder.path, e);
                }
            }
        } else if copied == 0 && !folder.created && !log.is_append() {
            tracing::debug!("Nothing copied, not creating {}", log.path());
        } else {
            let log_path = log.path().to_string();
            log.finalize(&block)
                .map_err(|source| RunError::LogWrite {
                    path: log_path,
                    source,
                })?;
        }

        tracing::info!("Folder {} finished: {}", folder.path, status_line);
        self.metrics.record_folder_finished();
        self.state.finish_folder(status_line, summary);

        Ok(status)
    }

    /// Fill the quota of one folder iteration and report how the pass ended.
    fn fill_quota(&mut self, folder: &ProvisionedFolder, quota: usize, log: &mut RunLog) -> PassFlags {
        let mut flags = PassFlags::default();
        let mut walker = Walker::new(
            &self.config.root,
            &mut self.ledger,
            &mut *self.rng,
            self.tools,
            self.stop,
        );

        while log.line_count() < quota {
            match walker.select(log.line_count(), &folder.path) {
                SelectionOutcome::Copied {
                    relative,
                    bytes,
                    dest_name,
                    ..
                } => {
                    let line = log.record(&relative, bytes);
                    self.metrics.record_copy(bytes);
                    self.state.record_copy(line, dest_name, bytes);
                }
                SelectionOutcome::Invalid {
                    relative, reason, ..
                } => {
                    match reason {
                        RejectReason::Filtered => self.metrics.record_rejected(),
                        RejectReason::Duplicate => self.metrics.record_duplicate(),
                        RejectReason::CopyFailed => self.metrics.record_copy_failure(),
                    }
                    if self.config.show_invalid {
                        self.state
                            .record_invalid(invalid_feed_line(log.line_count(), &relative));
                    }
                }
                SelectionOutcome::Exhausted => break,
                SelectionOutcome::TimedOut => {
                    flags.timed_out = true;
                    break;
                }
                SelectionOutcome::Stopped => {
                    flags.stopped = true;
                    break;
                }
            }
        }

        flags.root_exhausted = walker.is_root_exhausted();
        flags
    }
}
