//! Resolve a queued base name to a file on disk: source directory first,
//! then a recursive walk of the archive tree.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Archive lookup with a cap on directory entries visited (0 = unlimited)
#[derive(Debug, Clone, Default)]
pub struct FileLocator {
    pub scan_limit: usize,
}

impl FileLocator {
    pub fn new(scan_limit: usize) -> Self {
        Self { scan_limit }
    }

    /// Find `base_name`, preferring `primary/base_name`. When several archive
    /// files share the name, which one is returned depends on traversal order.
    pub fn locate(&self, base_name: &str, primary: &Path, archive: Option<&Path>) -> Option<PathBuf> {
        let direct = primary.join(base_name);
        if direct.is_file() {
            return Some(direct);
        }
        archive.and_then(|root| self.search(base_name, root))
    }

    fn search(&self, base_name: &str, root: &Path) -> Option<PathBuf> {
        for (visited, entry) in WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok()) // unreadable subtrees are skipped
            .enumerate()
        {
            if self.scan_limit > 0 && visited >= self.scan_limit {
                tracing::warn!(
                    "archive scan for {} stopped after {} entries under {}",
                    base_name,
                    self.scan_limit,
                    root.display()
                );
                return None;
            }
            if entry.file_type().is_file() && entry.file_name() == base_name {
                return Some(entry.into_path());
            }
        }
        None
    }
}
