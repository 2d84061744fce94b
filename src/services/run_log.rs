//! Run Log Writer and terminal status classification.
//!
//! Per-file lines are buffered while a folder iteration runs. At the end the
//! status block is written above them, and above whatever an earlier run left
//! in the same log, so the newest run always reads first.

use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use std::fs;
use std::io;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use time::macros::format_description;

const SEPARATOR: &str =
    "------------------------------------------------------------------------";

/// Terminal status of one folder iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    NoFilesFoundTimedOut,
    NoFilesFoundExhausted,
    PartialExhausted,
    PartialTimedOut,
    Stopped,
}

/// What the walker observed when a folder iteration ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassFlags {
    pub timed_out: bool,
    pub root_exhausted: bool,
    pub stopped: bool,
}

impl RunStatus {
    /// Classify a finished folder iteration. Earlier rules take priority.
    pub fn classify(copied: usize, quota: usize, flags: PassFlags, folders_created: bool) -> Self {
        if copied >= quota {
            RunStatus::Success
        } else if flags.timed_out && copied == 0 && folders_created {
            RunStatus::NoFilesFoundTimedOut
        } else if flags.root_exhausted && copied == 0 && folders_created {
            RunStatus::NoFilesFoundExhausted
        } else if flags.root_exhausted {
            RunStatus::PartialExhausted
        } else if flags.timed_out {
            RunStatus::PartialTimedOut
        } else {
            RunStatus::Stopped
        }
    }

    /// The destination folder is deleted and the run ends
    pub fn is_no_files_found(self) -> bool {
        matches!(
            self,
            RunStatus::NoFilesFoundTimedOut | RunStatus::NoFilesFoundExhausted
        )
    }

    pub fn line(self, copied: usize, quota: usize) -> String {
        match self {
            RunStatus::Success => format!("SUCCESS: {copied}/{quota} files copied"),
            RunStatus::NoFilesFoundTimedOut => {
                "NO FILES FOUND: timed out | folder deleted".to_string()
            }
            RunStatus::NoFilesFoundExhausted => {
                "NO FILES FOUND: all files searched | folder deleted".to_string()
            }
            RunStatus::PartialExhausted => {
                format!("ALL FILES SEARCHED: {copied}/{quota} files copied")
            }
            RunStatus::PartialTimedOut => format!("TIMED OUT: {copied}/{quota} files copied"),
            RunStatus::Stopped => format!("STOPPED: {copied}/{quota} files copied"),
        }
    }
}

/// The header written above a folder iteration's file lines
#[derive(Debug, Clone)]
pub struct StatusBlock {
    pub status_line: String,
    pub at: OffsetDateTime,
    pub root: Utf8PathBuf,
    pub destination: Utf8PathBuf,
    pub extensions: Vec<String>,
    pub keywords: Vec<String>,
    pub total_bytes: u64,
    pub runtime: Duration,
}

impl fmt::Display for StatusBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let date = self
            .at
            .format(format_description!("[month repr:long] [day], [year]"))
            .map_err(|_| fmt::Error)?;
        let time = self
            .at
            .format(format_description!(
                "[hour repr:12]:[minute]:[second][period]"
            ))
            .map_err(|_| fmt::Error)?;

        let extensions = quoted_list(self.extensions.iter().map(|ext| {
            format!(".{}", ext.trim_start_matches('.'))
        }));
        let keywords = quoted_list(self.keywords.iter().cloned());

        writeln!(f, "{SEPARATOR}")?;
        writeln!(f, "{}", self.status_line)?;
        writeln!(f, "{SEPARATOR}")?;
        writeln!(f, "{:<13}{}", "Date:", date)?;
        writeln!(f, "{:<13}{}", "Time:", time)?;
        writeln!(f, "{:<13}{}", "Start:", self.root)?;
        writeln!(f, "{:<13}{}", "Destination:", self.destination)?;
        writeln!(f, "{:<13}{}", "Extensions:", extensions)?;
        writeln!(f, "{:<13}{}", "Keywords:", keywords)?;
        writeln!(f, "{:<13}{}", "Total size:", format_size(self.total_bytes))?;
        writeln!(f, "Total runtime: {:.2}s", self.runtime.as_secs_f64())?;
        write!(f, "{SEPARATOR}")
    }
}

/// Current wall-clock time, local when the offset can be determined
pub fn local_now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

fn quoted_list(items: impl Iterator<Item = String>) -> String {
    let quoted: Vec<String> = items.map(|item| format!("\"{item}\"")).collect();
    if quoted.is_empty() {
        "Any".to_string()
    } else {
        quoted.join(", ")
    }
}

/// Human readable size, MB below one gigabyte and GB from there on
pub fn format_size(bytes: u64) -> String {
    const GIGABYTE: u64 = 1_073_741_824;
    if bytes < GIGABYTE - 1 {
        format!("{:.2} MB", bytes as f64 / 1_048_576.0)
    } else {
        format!("{:.2} GB", bytes as f64 / GIGABYTE as f64)
    }
}

/// Buffered log of one folder iteration
#[derive(Debug)]
pub struct RunLog {
    path: Utf8PathBuf,
    append: bool,
    lines: Vec<String>,
    total_bytes: u64,
    started: Instant,
}

impl RunLog {
    pub fn new(path: Utf8PathBuf, append: bool) -> Self {
        Self {
            path,
            append,
            lines: Vec::new(),
            total_bytes: 0,
            started: Instant::now(),
        }
    }

    /// Buffer the line for the next copied file and return it.
    pub fn record(&mut self, relative: &str, bytes: u64) -> String {
        let line = format!("{}: {}", self.lines.len() + 1, relative);
        self.lines.push(line.clone());
        self.total_bytes += bytes;
        line
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn is_append(&self) -> bool {
        self.append
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Persist `block` followed by the buffered lines, above any prior content.
    ///
    /// The merged log is written to `<log>.tmp` first and renamed over the log.
    pub fn finalize(self, block: &StatusBlock) -> io::Result<()> {
        let mut content = block.to_string();
        content.push('\n');
        for line in &self.lines {
            content.push_str(line);
            content.push('\n');
        }

        if self.append {
            match fs::read_to_string(&self.path) {
                Ok(prior) => content.push_str(&prior),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }

        let tmp = Utf8PathBuf::from(format!("{}.tmp", self.path));
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;

        tracing::debug!("Wrote run log {} ({} lines)", self.path, self.lines.len());
        Ok(())
    }
}
