use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Paths already admitted for upload by one orchestrator.
///
/// Membership is by path, not content: two files with the same bytes at
/// different paths are both uploaded.
#[derive(Debug, Default)]
pub struct DedupRegistry {
    seen: HashSet<PathBuf>,
}

impl DedupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `path` and return true the first time it is offered.
    pub fn try_admit(&mut self, path: &Path) -> bool {
        if self.seen.contains(path) {
            return false;
        }
        self.seen.insert(path.to_path_buf())
    }

    /// Number of distinct paths admitted so far.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[cfg(test)]
    fn contains(&self, path: &Path) -> bool {
        self.seen.contains(path)
    }
}
