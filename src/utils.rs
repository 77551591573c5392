//! Utility functions for path manipulation

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Resolve a client-supplied relative path to a file inside `base`
///
/// # Arguments
///
/// * `base` - The directory artifacts are served from
/// * `relative` - Path as received from the client (e.g., "playlist/clip.mp4")
///
/// # Errors
///
/// - [`Error::InvalidPath`] if the path is empty, absolute, contains `..`, or
///   resolves (through symlinks) to somewhere outside `base`
/// - [`Error::NotFound`] if the file does not exist or is not a regular file
///
/// # Examples
///
/// ```no_run
/// use media_dl::utils::resolve_artifact_path;
/// use std::path::Path;
///
/// # async fn example() -> media_dl::Result<()> {
/// let path = resolve_artifact_path(Path::new("./downloads"), "clip.mp4").await?;
/// assert!(resolve_artifact_path(Path::new("./downloads"), "../secret").await.is_err());
/// # Ok(())
/// # }
/// ```
pub async fn resolve_artifact_path(base: &Path, relative: &str) -> Result<PathBuf> {
    let relative = Path::new(relative.trim_start_matches('/'));

    if relative.as_os_str().is_empty() {
        return Err(Error::InvalidPath("empty path".to_string()));
    }
    if !relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(Error::InvalidPath(format!(
            "path escapes the download directory: {}",
            relative.display()
        )));
    }

    let candidate = base.join(relative);
    let resolved = match tokio::fs::canonicalize(&candidate).await {
        Ok(path) => path,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::NotFound(format!("file {}", relative.display())));
        }
        Err(e) => return Err(Error::Io(e)),
    };
    let base = tokio::fs::canonicalize(base).await?;

    if !resolved.starts_with(&base) {
        return Err(Error::InvalidPath(format!(
            "path escapes the download directory: {}",
            relative.display()
        )));
    }

    if !tokio::fs::metadata(&resolved).await?.is_file() {
        return Err(Error::NotFound(format!("file {}", relative.display())));
    }

    Ok(resolved)
}

/// File name of a path as an owned string, for `Content-Disposition`
pub fn display_file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string())
}
