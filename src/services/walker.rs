//! Path Sampler: the randomized, exhaustible walk that fills one quota.
//!
//! Every attempt starts at the root and descends by uniformly picking one
//! entry of the current directory listing, touched entries included. Picking
//! a touched entry sends the cursor back to the root; a directory whose
//! entries are all touched becomes touched itself, so exhaustion propagates
//! upward until the root is touched and the pass ends.

use crate::models::{TrashOptions, WeightCaps};
use crate::services::copier::{CopyEngine, CopyResult};
use crate::services::ledger::{TouchKind, VisitationLedger};
use crate::services::trash::{Trash, trash_quietly};
use crate::services::validity::ValidityChecker;
use camino::{Utf8Path, Utf8PathBuf};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Cooperative cancellation flag polled by the walker and the orchestrator
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    /// A signal together with the sender that raises it
    pub fn new() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self { rx })
    }

    /// A signal that is never raised
    pub fn never() -> Self {
        Self::new().1
    }

    pub fn from_receiver(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }

    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }
}

/// Entries of one directory
#[derive(Debug, Clone)]
pub struct DirectoryListing {
    /// Sorted entries with UTF-8 names
    pub entries: Arc<[Utf8PathBuf]>,
    /// Entries left out because their names are not UTF-8
    pub skipped: usize,
}

impl DirectoryListing {
    /// The directory holds nothing at all, usable or not
    pub fn is_truly_empty(&self) -> bool {
        self.entries.is_empty() && self.skipped == 0
    }
}

/// Memo of directory listings for one quota-filling pass.
#[derive(Debug, Default)]
pub struct DirectoryListingCache {
    listings: HashMap<Utf8PathBuf, DirectoryListing>,
}

impl DirectoryListingCache {
    pub fn list(&mut self, dir: &Utf8Path) -> io::Result<DirectoryListing> {
        if let Some(listing) = self.listings.get(dir) {
            tracing::trace!("Listing cache hit: {}", dir);
            return Ok(listing.clone());
        }

        let mut entries = Vec::new();
        let mut skipped = 0;
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            match Utf8PathBuf::from_path_buf(entry.path()) {
                Ok(path) => entries.push(path),
                Err(path) => {
                    tracing::debug!("Skipping non UTF-8 path {}", path.display());
                    skipped += 1;
                }
            }
        }
        entries.sort();

        let listing = DirectoryListing {
            entries: entries.into(),
            skipped,
        };
        self.listings.insert(dir.to_path_buf(), listing.clone());
        Ok(listing)
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }
}

/// Current position of the walk
#[derive(Debug, Clone)]
pub struct WalkCursor {
    root: Utf8PathBuf,
    current: Utf8PathBuf,
    top_anchor: Option<Utf8PathBuf>,
}

impl WalkCursor {
    pub fn new(root: &Utf8Path) -> Self {
        Self {
            root: root.to_path_buf(),
            current: root.to_path_buf(),
            top_anchor: None,
        }
    }

    pub fn current(&self) -> &Utf8Path {
        &self.current
    }

    pub fn top_anchor(&self) -> Option<&Utf8Path> {
        self.top_anchor.as_deref()
    }

    pub fn is_at_root(&self) -> bool {
        self.current == self.root
    }

    /// Step into `dir`; the first step out of the root records the top anchor.
    pub fn descend(&mut self, dir: &Utf8Path) {
        if self.is_at_root() {
            self.top_anchor = Some(dir.to_path_buf());
        }
        self.current = dir.to_path_buf();
    }

    pub fn reset(&mut self) {
        self.current.clone_from(&self.root);
        self.top_anchor = None;
    }
}

/// Wall-clock time since the last successful copy
#[derive(Debug, Clone, Copy)]
pub struct StallClock {
    since: Instant,
    limit: Duration,
}

impl StallClock {
    pub fn start(limit: Duration) -> Self {
        Self {
            since: Instant::now(),
            limit,
        }
    }

    pub fn reset(&mut self) {
        self.since = Instant::now();
    }

    pub fn is_timed_out(&self) -> bool {
        self.since.elapsed() > self.limit
    }
}

/// Why a selected file did not consume a quota slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Filtered,
    Duplicate,
    CopyFailed,
}

/// Result of one attempt to fill a quota slot
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionOutcome {
    Copied {
        source: Utf8PathBuf,
        relative: String,
        bytes: u64,
        dest_name: String,
    },
    Invalid {
        source: Utf8PathBuf,
        relative: String,
        reason: RejectReason,
    },
    Exhausted,
    TimedOut,
    Stopped,
}

/// Collaborators and settings a walker uses but does not own
#[derive(Clone, Copy)]
pub struct WalkTools<'a> {
    pub checker: &'a ValidityChecker,
    pub copier: &'a CopyEngine,
    pub trash: &'a dyn Trash,
    pub weights: WeightCaps,
    pub trash_options: TrashOptions,
    pub stall_timeout: Duration,
}

/// One quota-filling pass over the tree under `root`
pub struct Walker<'a> {
    root: &'a Utf8Path,
    ledger: &'a mut VisitationLedger,
    rng: &'a mut StdRng,
    tools: WalkTools<'a>,
    stop: &'a StopSignal,
    cache: DirectoryListingCache,
    cursor: WalkCursor,
    clock: StallClock,
}

impl<'a> Walker<'a> {
    pub fn new(
        root: &'a Utf8Path,
        ledger: &'a mut VisitationLedger,
        rng: &'a mut StdRng,
        tools: WalkTools<'a>,
        stop: &'a StopSignal,
    ) -> Self {
        Self {
            root,
            ledger,
            rng,
            tools,
            stop,
            cache: DirectoryListingCache::default(),
            cursor: WalkCursor::new(root),
            clock: StallClock::start(tools.stall_timeout),
        }
    }

    pub fn is_root_exhausted(&self) -> bool {
        self.ledger.is_folder_touched(self.root)
    }

    /// Walk until a file is copied to `dest` as its `index`-th file, a file
    /// is rejected, or the pass reaches a terminal condition.
    pub fn select(&mut self, index: usize, dest: &Utf8Path) -> SelectionOutcome {
        loop {
            if self.stop.is_stopped() {
                return SelectionOutcome::Stopped;
            }
            if self.is_root_exhausted() {
                return SelectionOutcome::Exhausted;
            }
            if self.clock.is_timed_out() {
                return SelectionOutcome::TimedOut;
            }

            let here = self.cursor.current().to_path_buf();
            let listing = match self.cache.list(&here) {
                Ok(listing) => listing,
                Err(e) => {
                    tracing::debug!("Cannot list {}: {}", here, e);
                    self.ledger.touch(&here, TouchKind::Folder);
                    self.cursor.reset();
                    continue;
                }
            };

            if listing.entries.is_empty() && !listing.is_truly_empty() {
                tracing::debug!("Nothing usable in {} ({} skipped)", here, listing.skipped);
                self.ledger.touch(&here, TouchKind::Folder);
                self.cursor.reset();
                continue;
            }

            if listing.is_truly_empty() {
                tracing::debug!("Empty folder: {}", here);
                self.ledger.touch(&here, TouchKind::Folder);
                if self.tools.trash_options.empty_folders && here != self.root {
                    trash_quietly(self.tools.trash, &here, self.root);
                }
                self.cursor.reset();
                continue;
            }

            let Some(picked) = listing.entries.choose(&mut *self.rng).cloned() else {
                continue;
            };

            if self.ledger.is_touched(&picked) {
                if listing.entries.iter().all(|entry| self.ledger.is_touched(entry)) {
                    tracing::debug!("All entries touched: {}", here);
                    self.ledger.touch(&here, TouchKind::Folder);
                }
                self.cursor.reset();
                continue;
            }

            let Ok(link_meta) = fs::symlink_metadata(&picked) else {
                self.ledger.touch(&picked, TouchKind::File);
                self.cursor.reset();
                continue;
            };

            if link_meta.is_symlink() && picked.is_dir() {
                tracing::debug!("Not following directory link {}", picked);
                self.ledger.touch(&picked, TouchKind::Folder);
                self.cursor.reset();
                continue;
            }

            if link_meta.is_dir() {
                if let Err(e) = self.cache.list(&picked) {
                    tracing::debug!("Cannot enter {}: {}", picked, e);
                    self.ledger.touch(&picked, TouchKind::Folder);
                    self.cursor.reset();
                } else {
                    self.cursor.descend(&picked);
                }
                continue;
            }

            if picked.is_file() {
                return self.take_file(picked, index, dest);
            }

            self.ledger.touch(&picked, TouchKind::File);
            self.cursor.reset();
        }
    }

    fn take_file(&mut self, source: Utf8PathBuf, index: usize, dest: &Utf8Path) -> SelectionOutcome {
        self.ledger.touch(&source, TouchKind::File);
        let relative = source
            .strip_prefix(self.root)
            .map(|rel| rel.to_string())
            .unwrap_or_else(|_| source.to_string());

        let outcome = match fs::metadata(&source) {
            Ok(meta) if self.tools.checker.validate(&source, meta.len()) => {
                match self.tools.copier.copy(&source, dest, index) {
                    Ok(CopyResult::Copied { name }) => {
                        self.record_anchors();
                        self.clock.reset();
                        if self.tools.trash_options.source_files {
                            trash_quietly(self.tools.trash, &source, self.root);
                        }
                        SelectionOutcome::Copied {
                            source,
                            relative,
                            bytes: meta.len(),
                            dest_name: name,
                        }
                    }
                    Ok(CopyResult::Duplicate) => self.reject(source, relative, RejectReason::Duplicate),
                    Err(e) => {
                        tracing::warn!("{}", e);
                        self.reject(source, relative, RejectReason::CopyFailed)
                    }
                }
            }
            Ok(_) => self.reject(source, relative, RejectReason::Filtered),
            Err(e) => {
                tracing::debug!("Cannot read metadata of {}: {}", source, e);
                self.reject(source, relative, RejectReason::CopyFailed)
            }
        };

        self.cursor.reset();
        outcome
    }

    fn reject(&mut self, source: Utf8PathBuf, relative: String, reason: RejectReason) -> SelectionOutcome {
        tracing::debug!("Rejected ({:?}): {}", reason, source);
        if self.tools.trash_options.invalid_files {
            trash_quietly(self.tools.trash, &source, self.root);
        }
        SelectionOutcome::Invalid {
            source,
            relative,
            reason,
        }
    }

    fn record_anchors(&mut self) {
        let weights = self.tools.weights;
        if weights.top > 0 {
            if let Some(anchor) = self.cursor.top_anchor() {
                let anchor = anchor.to_path_buf();
                self.ledger.record_selection(&anchor, weights.top);
            }
        }
        if weights.bottom > 0 {
            let parent = self.cursor.current().to_path_buf();
            self.ledger.record_selection(&parent, weights.bottom);
        }
    }
}
