//! Visitation Ledger: which files and folders are exhausted, and how many
//! selections each weight anchor has absorbed.
//!
//! Membership queries never insert. A path that was never touched is simply
//! absent and reads as untouched.

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::{IndexMap, IndexSet};
use std::collections::HashSet;

/// What kind of entry is being marked exhausted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchKind {
    File,
    Folder,
}

/// Exhaustion and weight bookkeeping shared by every pass of a run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct VisitationLedger {
    touched_files: HashSet<Utf8PathBuf>,
    touched_folders: HashSet<Utf8PathBuf>,
    selections: IndexMap<Utf8PathBuf, u32>,
    weight_capped: IndexSet<Utf8PathBuf>,
}

impl VisitationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `path` exhausted. Returns `true` if it was not touched before.
    pub fn touch(&mut self, path: &Utf8Path, kind: TouchKind) -> bool {
        if self.is_touched(path) {
            return false;
        }

        let set = match kind {
            TouchKind::File => &mut self.touched_files,
            TouchKind::Folder => &mut self.touched_folders,
        };
        set.insert(path.to_path_buf())
    }

    pub fn is_touched(&self, path: &Utf8Path) -> bool {
        self.touched_files.contains(path) || self.touched_folders.contains(path)
    }

    pub fn is_folder_touched(&self, path: &Utf8Path) -> bool {
        self.touched_folders.contains(path)
    }

    /// Count one selection against `anchor`.
    ///
    /// A `cap` of 0 disables the counter. When the counter reaches `cap` the
    /// anchor is touched as a folder and flagged weight-capped; the return
    /// value says whether that happened on this call.
    pub fn record_selection(&mut self, anchor: &Utf8Path, cap: u32) -> bool {
        if cap == 0 {
            return false;
        }

        let count = self.selections.entry(anchor.to_path_buf()).or_insert(0);
        if *count >= cap {
            return false;
        }
        *count += 1;

        if *count == cap {
            self.touched_folders.insert(anchor.to_path_buf());
            self.weight_capped.insert(anchor.to_path_buf());
            tracing::debug!("Weight cap {} reached for {}", cap, anchor);
            return true;
        }

        false
    }

    /// Selections attributed to `anchor` in the current folder iteration
    pub fn selections(&self, anchor: &Utf8Path) -> u32 {
        self.selections.get(anchor).copied().unwrap_or(0)
    }

    pub fn is_weight_capped(&self, anchor: &Utf8Path) -> bool {
        self.weight_capped.contains(anchor)
    }

    /// Prepare for the next destination folder iteration.
    ///
    /// With `unique` set, exhaustion state carries over: only the root and
    /// the anchors that were closed by a weight cap are reopened. Otherwise
    /// everything is forgotten. Weight counters always start from zero.
    pub fn begin_folder_iteration(&mut self, root: &Utf8Path, unique: bool) {
        if unique {
            self.touched_folders.remove(root);
            for anchor in &self.weight_capped {
                self.touched_folders.remove(anchor);
                self.touched_files.remove(anchor);
            }
        } else {
            self.touched_files.clear();
            self.touched_folders.clear();
        }

        self.selections.clear();
        self.weight_capped.clear();
    }

    pub fn touched_file_count(&self) -> usize {
        self.touched_files.len()
    }

    pub fn touched_folder_count(&self) -> usize {
        self.touched_folders.len()
    }
}
