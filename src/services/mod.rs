//! Services module - the sampling engine and its collaborators.
//!
//! Everything that touches the filesystem during a run lives here. The
//! services have no dependency on the control layer; progress leaves through
//! [`crate::state::StateManager`] only.
//!
//! # Components
//!
//! - [`VisitationLedger`]: touched files and folders, weight-cap counters
//! - [`Walker`]: the randomized walk that fills one quota, with its
//!   [`DirectoryListingCache`], [`WalkCursor`], [`StallClock`] and [`StopSignal`]
//! - [`ValidityChecker`]: size, extension, keyword and duration filters
//!   (durations come from a [`DurationProbe`], normally [`AudioProbe`])
//! - [`CopyEngine`]: destination naming (keep, index, rename) and the copy itself
//! - [`provision_folder`]: destination folder and log file for one iteration
//! - [`RunLog`] / [`RunStatus`]: buffered log lines, status classification and
//!   the status block written above them
//! - [`Trash`]: recoverable deletion, [`SystemTrash`] in production
//! - [`Orchestrator`]: runs the folder iterations of a [`crate::models::RunConfig`]
//!
//! # Failure policy
//!
//! Only [`RunError`] aborts a run. Unreadable folders, rejected or uncopiable
//! files and trash failures are absorbed where they happen and show up in
//! the status and the run log.
//!
//! # Usage Example
//!
//! ```ignore
//! use copyrandom::services::{Orchestrator, StopSignal};
//!
//! let orchestrator = Orchestrator::new(state, metrics);
//! let report = orchestrator.run(config, &StopSignal::never())?;
//! println!("{} files copied", report.total_copied);
//! ```

pub mod audio;
pub mod copier;
pub mod ledger;
pub mod orchestrator;
pub mod provision;
pub mod run_log;
pub mod trash;
pub mod validity;
pub mod walker;

pub use audio::{AudioProbe, DurationProbe};
pub use copier::{CopyEngine, CopyError, CopyResult};
pub use ledger::{TouchKind, VisitationLedger};
pub use orchestrator::{Orchestrator, RunError, RunReport, invalid_feed_line};
pub use provision::{ProvisionedFolder, log_file_name, provision_folder};
pub use run_log::{PassFlags, RunLog, RunStatus, StatusBlock, format_size};
pub use trash::{SystemTrash, Trash, TrashError};
pub use validity::ValidityChecker;
pub use walker::{
    DirectoryListing, DirectoryListingCache, RejectReason, SelectionOutcome, StallClock,
    StopSignal, WalkCursor, WalkTools, Walker,
};
