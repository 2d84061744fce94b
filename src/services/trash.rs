use camino::Utf8Path;
use thiserror::Error;

/// Failure to move an entry to the recoverable trash. Never fatal to a run.
#[derive(Error, Debug)]
pub enum TrashError {
    #[error("Refusing to trash the search root {0}")]
    Root(String),

    #[error("Failed to trash {path}: {message}")]
    Backend { path: String, message: String },
}

/// Recoverable deletion of files and folders
#[cfg_attr(test, mockall::automock)]
pub trait Trash: Send + Sync {
    fn send(&self, path: &Utf8Path) -> Result<(), TrashError>;
}

/// The platform trash (recycle bin, freedesktop trash, ...)
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTrash;

impl Trash for SystemTrash {
    fn send(&self, path: &Utf8Path) -> Result<(), TrashError> {
        trash::delete(path.as_std_path()).map_err(|e| TrashError::Backend {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        tracing::debug!("Moved to trash: {}", path);
        Ok(())
    }
}

/// Trash `path` unless it is `root`, logging instead of failing.
///
/// Returns whether the entry was actually moved.
pub fn trash_quietly(trash: &dyn Trash, path: &Utf8Path, root: &Utf8Path) -> bool {
    let result = if path == root {
        Err(TrashError::Root(root.to_string()))
    } else {
        trash.send(path)
    };

    match result {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("{}", e);
            false
        }
    }
}
