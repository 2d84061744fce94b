use crate::models::FolderOptions;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io::{self, ErrorKind};

/// Upper bound on alternate folder names tried before giving up
const MAX_FOLDER_ATTEMPTS: u32 = 100_000;

/// Destination of one folder iteration together with its run log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedFolder {
    pub path: Utf8PathBuf,
    pub log_path: Utf8PathBuf,
    /// The log already existed and new content is merged with it
    pub append: bool,
    /// The folder was created by this iteration (and may be removed again)
    pub created: bool,
}

/// Log file name for a destination folder
pub fn log_file_name(folder_name: &str) -> String {
    format!("!{folder_name}_log.txt")
}

/// Prepare the destination of the next folder iteration under `destination`.
///
/// Without folder creation the destination itself is reused and an existing
/// log is continued. With folder creation a fresh subfolder named after the
/// template is created, probing `"{template} 2"`, `"{template} 3"`, ... when
/// the name is taken.
pub fn provision_folder(
    destination: &Utf8Path,
    options: &FolderOptions,
) -> io::Result<ProvisionedFolder> {
    if !options.create {
        let folder_name = destination.file_name().unwrap_or("destination");
        let log_path = destination.join(log_file_name(folder_name));
        let append = log_path.is_file();
        tracing::debug!(
            "Using {} directly (log {})",
            destination,
            if append { "appended" } else { "new" }
        );
        return Ok(ProvisionedFolder {
            path: destination.to_path_buf(),
            log_path,
            append,
            created: false,
        });
    }

    let template = options.name_template.trim();
    let candidates = std::iter::once(template.to_string())
        .chain((2..MAX_FOLDER_ATTEMPTS).map(|n| format!("{template} {n}")));

    for name in candidates {
        let path = destination.join(&name);
        match fs::create_dir(&path) {
            Ok(()) => {
                tracing::info!("Created destination folder {}", path);
                let log_path = path.join(log_file_name(&name));
                return Ok(ProvisionedFolder {
                    path,
                    log_path,
                    append: false,
                    created: true,
                });
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }

    Err(io::Error::new(
        ErrorKind::AlreadyExists,
        format!("no free folder name for '{template}' in {destination}"),
    ))
}
