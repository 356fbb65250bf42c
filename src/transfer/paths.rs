use crate::error::{Result, TransferError};
use std::path::{Component, Path, PathBuf};

/// Absolute form of `path` with `.` and `..` resolved lexically.
///
/// Symlinks are not resolved, so two links to one file stay two paths.
pub fn absolute_path(path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| TransferError::io(path, e))?
            .join(path)
    };
    Ok(normalize(&joined))
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Final component of a service supplied file name, or `None` if it has none.
pub fn safe_file_name(name: &str) -> Option<&std::ffi::OsStr> {
    Path::new(name)
        .file_name()
        .filter(|n| !n.is_empty())
}

/// `path` if it stays below the directory it is joined to.
///
/// Empty paths and paths with a root, prefix or `..` component are rejected.
pub fn safe_relative_path(path: &str) -> Option<&Path> {
    let path = Path::new(path);
    let mut components = path.components().peekable();
    components.peek()?;
    components
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        .then_some(path)
}
