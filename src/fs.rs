//! Async filesystem helpers used by the registry
//!
//! All writes go through [`write_atomic`]: content lands in a sibling `.tmp`
//! file which is then renamed over the target, so readers see either the old
//! or the new file and never a partial one.

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Ensure a directory exists (Unix: owner-only permissions on the leaf)
pub(crate) async fn ensure_dir(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| Error::DirectoryCreate {
            path: path.to_path_buf(),
            source: e,
        })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
            .await
            .map_err(|e| Error::DirectoryCreate {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    Ok(())
}

/// Write `content` to `path` via temp file + rename, creating parents as needed
pub(crate) async fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent).await?;
    }

    let file_name = path.file_name().ok_or_else(|| {
        Error::Config(format!(
            "Invalid path '{}': must have a filename",
            path.display()
        ))
    })?;
    let mut temp_filename = file_name.to_os_string();
    temp_filename.push(".tmp");
    let temp_path = path.with_file_name(temp_filename);

    tokio::fs::write(&temp_path, content)
        .await
        .map_err(|e| Error::FileWrite {
            path: temp_path.clone(),
            source: e,
        })?;

    tokio::fs::rename(&temp_path, path)
        .await
        .map_err(|e| Error::FileWrite {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Read a whole text file
///
/// Returns the raw `io::Error` so callers can decide what a missing file means.
pub(crate) async fn read_text(path: &Path) -> std::io::Result<String> {
    tokio::fs::read_to_string(path).await
}

/// Normalize a tracked-file path and make sure it stays inside its owner directory
pub(crate) fn normalize_relative(path: &Path) -> Result<PathBuf> {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(Error::InvalidPath {
                    path: path.to_path_buf(),
                    reason: "must not contain '..'".into(),
                });
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(Error::InvalidPath {
                    path: path.to_path_buf(),
                    reason: "must be relative".into(),
                });
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(Error::InvalidPath {
            path: path.to_path_buf(),
            reason: "must name a file".into(),
        });
    }

    Ok(normalized)
}
