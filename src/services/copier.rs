//! Copy & Naming Engine.
//!
//! Destination names are claimed with `create_new`, so a name that appears
//! between the existence probe and the copy is treated like any other
//! collision and the next candidate is tried.

use crate::models::FileNameMode;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use thiserror::Error;

/// Upper bound on collision probing for one file
const MAX_NAME_ATTEMPTS: u32 = 100_000;

/// A copy that could not be performed. Never fatal to a run.
#[derive(Error, Debug)]
pub enum CopyError {
    #[error("Source {0} has no file name")]
    NoFileName(String),

    #[error("No free destination name for {0}")]
    NamesExhausted(String),

    #[error("Failed to copy {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Outcome of a copy attempt that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyResult {
    /// The file landed in the destination under `name`
    Copied { name: String },
    /// A same-named, same-sized file already sits in the destination
    Duplicate,
}

pub struct CopyEngine {
    mode: FileNameMode,
}

impl CopyEngine {
    pub fn new(mode: FileNameMode) -> Self {
        Self { mode }
    }

    /// Copy `source` into `dest_dir` as the `index`-th (0-based) file of the
    /// current folder iteration.
    pub fn copy(
        &self,
        source: &Utf8Path,
        dest_dir: &Utf8Path,
        index: usize,
    ) -> Result<CopyResult, CopyError> {
        let file_name = source
            .file_name()
            .ok_or_else(|| CopyError::NoFileName(source.to_string()))?;

        let io_err = |source_err: io::Error| CopyError::Io {
            path: source.to_string(),
            source: source_err,
        };

        match &self.mode {
            FileNameMode::Index => {
                let name = format!("{}.{}", index + 1, file_name);
                let target = dest_dir.join(&name);
                fs::copy(source, &target).map_err(io_err)?;
                Ok(CopyResult::Copied { name })
            }

            FileNameMode::Rename { template } => {
                let ext = extension_suffix(source);
                for n in (index as u32 + 1)..(index as u32 + 1 + MAX_NAME_ATTEMPTS) {
                    let name = format!("{} {}{}", template, n, ext);
                    if claim_and_copy(source, &dest_dir.join(&name)).map_err(io_err)? {
                        return Ok(CopyResult::Copied { name });
                    }
                }
                Err(CopyError::NamesExhausted(source.to_string()))
            }

            FileNameMode::Keep => {
                let source_len = fs::metadata(source).map_err(io_err)?.len();
                let stem = source.file_stem().unwrap_or(file_name);
                let ext = extension_suffix(source);
                let candidates = std::iter::once(file_name.to_string())
                    .chain((2..(2 + MAX_NAME_ATTEMPTS)).map(|n| format!("{} ({}){}", stem, n, ext)));

                // Any taken candidate of the same size counts as the file already being there
                for name in candidates {
                    let target = dest_dir.join(&name);
                    if fs::metadata(&target).is_ok_and(|meta| meta.is_file() && meta.len() == source_len) {
                        tracing::debug!("Duplicate of {} already in {} as {}", source, dest_dir, name);
                        return Ok(CopyResult::Duplicate);
                    }
                    if claim_and_copy(source, &target).map_err(io_err)? {
                        return Ok(CopyResult::Copied { name });
                    }
                }
                Err(CopyError::NamesExhausted(source.to_string()))
            }
        }
    }
}

/// `".ext"` or the empty string
fn extension_suffix(path: &Utf8Path) -> String {
    path.extension()
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}

/// Create `target` exclusively and copy `source` into it.
///
/// Returns `Ok(false)` when `target` already exists.
fn claim_and_copy(source: &Utf8Path, target: &Utf8PathBuf) -> io::Result<bool> {
    let mut out = match OpenOptions::new().write(true).create_new(true).open(target) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(e),
    };

    let copied = File::open(source).and_then(|mut input| io::copy(&mut input, &mut out));
    if let Err(e) = copied {
        drop(out);
        let _ = fs::remove_file(target);
        return Err(e);
    }

    Ok(true)
}
