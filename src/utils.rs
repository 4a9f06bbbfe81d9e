//! Filesystem and argument helpers shared by the fetch paths

use crate::error::FetchFailure;
use std::path::Path;

/// Split a free-form extra-argument string on whitespace
///
/// # Examples
///
/// ```
/// use scifetch::utils::split_extra_args;
///
/// assert_eq!(split_extra_args("--limit-rate 1m  -q"), vec!["--limit-rate", "1m", "-q"]);
/// assert!(split_extra_args("   ").is_empty());
/// ```
#[must_use]
pub fn split_extra_args(extra: &str) -> Vec<String> {
    extra.split_whitespace().map(str::to_string).collect()
}

/// Create `dir` and any missing ancestors.
///
/// Failure is reported as [`FetchFailure::OutputDir`], which stops the batch.
pub async fn ensure_dir(dir: &Path) -> Result<(), FetchFailure> {
    if dir.as_os_str().is_empty() || path_exists(dir).await {
        return Ok(());
    }
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| FetchFailure::OutputDir {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })
}

/// Create the parent directory of `path` if it is missing
pub async fn ensure_parent_dir(path: &Path) -> Result<(), FetchFailure> {
    match path.parent() {
        Some(parent) => ensure_dir(parent).await,
        None => Ok(()),
    }
}

/// Whether anything exists at `path` (file, directory or symlink target)
pub async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Remove a file or directory tree at `path`. A missing path is not an error.
pub async fn remove_existing(path: &Path) -> std::io::Result<()> {
    let metadata = match tokio::fs::symlink_metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    if metadata.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    }
}
