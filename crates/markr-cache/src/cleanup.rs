//! Run-scoped file cleanup.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Ordered set of run-scoped files to remove when a run ends.
///
/// Entries are visited in insertion order by [`drain`](Self::drain), exactly
/// once: draining empties the registry, so later calls (including the one made
/// on drop) have nothing left to do. A registry created with
/// [`retaining`](Self::retaining) still visits every entry but leaves the files
/// in place.
#[derive(Debug, Default)]
pub struct CleanupRegistry {
    entries: Vec<PathBuf>,
    retain: bool,
}

/// Outcome of draining a [`CleanupRegistry`].
#[derive(Debug, Default)]
pub struct CleanupReport {
    /// Every entry, in the order it was visited.
    pub visited: Vec<PathBuf>,
    /// Entries that were deleted.
    pub removed: usize,
    /// Entries kept because the registry was retaining.
    pub kept: usize,
    /// Entries that did not exist any more.
    pub missing: usize,
    /// Entries that could not be deleted.
    pub failed: Vec<(PathBuf, io::Error)>,
}

impl CleanupRegistry {
    /// Create a registry that deletes its entries.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry that visits its entries but keeps the files.
    #[must_use]
    pub fn retaining() -> Self {
        Self {
            entries: Vec::new(),
            retain: true,
        }
    }

    /// Register a path for cleanup. Paths already registered are ignored.
    pub fn register(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if self.entries.contains(&path) {
            return;
        }
        tracing::debug!(file = %path.display(), "registered for cleanup");
        self.entries.push(path);
    }

    /// Visit every pending entry once, in insertion order.
    ///
    /// Failures are logged and reported but never stop the remaining entries
    /// from being visited.
    pub fn drain(&mut self) -> CleanupReport {
        let mut report = CleanupReport::default();
        for path in std::mem::take(&mut self.entries) {
            if self.retain {
                tracing::info!(file = %path.display(), "keeping temporary file");
                report.kept += 1;
            } else {
                match remove(&path) {
                    Ok(()) => report.removed += 1,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        tracing::debug!(file = %path.display(), "already gone");
                        report.missing += 1;
                    }
                    Err(e) => {
                        tracing::warn!(file = %path.display(), "failed to delete: {e}");
                        report.failed.push((path.clone(), e));
                    }
                }
            }
            report.visited.push(path);
        }
        report
    }
}

#[cfg(test)]
impl CleanupRegistry {
    /// Test-only: whether any entries are still pending.
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Drop for CleanupRegistry {
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            self.drain();
        }
    }
}

fn remove(path: &Path) -> io::Result<()> {
    tracing::info!(file = %path.display(), "deleting");
    fs::remove_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, name).unwrap();
        path
    }

    #[test]
    fn test_drain_deletes_in_insertion_order() {
        let tmp = TempDir::new().unwrap();
        let b = touch(&tmp, "b.pdf");
        let a = touch(&tmp, "a.pdf");
        let c = touch(&tmp, "c.pdf");

        let mut registry = CleanupRegistry::new();
        registry.register(&b);
        registry.register(&a);
        registry.register(&c);

        let report = registry.drain();
        assert_eq!(report.visited, vec![b.clone(), a.clone(), c.clone()]);
        assert_eq!(report.removed, 3);
        assert!(!a.exists() && !b.exists() && !c.exists());
    }

    #[test]
    fn test_drain_runs_once() {
        let tmp = TempDir::new().unwrap();
        let path = touch(&tmp, "x.eps");

        let mut registry = CleanupRegistry::new();
        registry.register(&path);
        assert_eq!(registry.drain().visited.len(), 1);

        // Recreate the file: a second drain must not touch it.
        fs::write(&path, "again").unwrap();
        assert_eq!(registry.drain().visited.len(), 0);
        assert!(path.exists());
    }

    #[test]
    fn test_duplicate_registration_is_ignored() {
        let mut registry = CleanupRegistry::new();
        registry.register("/tmp/markr-dup.pdf");
        registry.register("/tmp/markr-dup.pdf");
        assert_eq!(registry.drain().visited, vec![PathBuf::from("/tmp/markr-dup.pdf")]);
    }

    #[test]
    fn test_missing_files_are_counted_not_failed() {
        let tmp = TempDir::new().unwrap();
        let mut registry = CleanupRegistry::new();
        registry.register(tmp.path().join("never-created.pdf"));

        let report = registry.drain();
        assert_eq!(report.missing, 1);
        assert!(report.failed.is_empty());
    }

    #[test]
    fn test_retaining_keeps_files() {
        let tmp = TempDir::new().unwrap();
        let path = touch(&tmp, "keep.pdf");

        let mut registry = CleanupRegistry::retaining();
        registry.register(&path);
        let report = registry.drain();

        assert_eq!(report.kept, 1);
        assert_eq!(report.visited, vec![path.clone()]);
        assert!(path.exists());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_drop_drains_pending_entries() {
        let tmp = TempDir::new().unwrap();
        let path = touch(&tmp, "dropped.pdf");
        {
            let mut registry = CleanupRegistry::new();
            registry.register(&path);
        }
        assert!(!path.exists());
    }
}
