//! Output-path locks shared by extraction workers.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rustc_hash::FxHashSet;

/// Set of output paths currently being written.
///
/// Acquisition never blocks: a path already held means another worker is
/// producing the same file and the caller should skip it.
#[derive(Debug, Default)]
pub struct ResourceLocks {
    held: Mutex<FxHashSet<PathBuf>>,
}

impl ResourceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock for `path`, or `None` if another holder has it.
    pub fn try_lock(&self, path: &Path) -> Option<ResourceLockGuard<'_>> {
        let mut held = self.held.lock();
        if !held.insert(path.to_path_buf()) {
            return None;
        }
        Some(ResourceLockGuard {
            locks: self,
            path: path.to_path_buf(),
        })
    }

    pub fn is_locked(&self, path: &Path) -> bool {
        self.held.lock().contains(path)
    }

    pub fn held_count(&self) -> usize {
        self.held.lock().len()
    }
}

/// Releases its path when dropped.
#[derive(Debug)]
pub struct ResourceLockGuard<'a> {
    locks: &'a ResourceLocks,
    path: PathBuf,
}

impl ResourceLockGuard<'_> {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ResourceLockGuard<'_> {
    fn drop(&mut self) {
        self.locks.held.lock().remove(&self.path);
    }
}
