//! Per-vault mutual exclusion.
//!
//! Every create and unlock holds the lock of its vault directory for its
//! whole duration, so the read-modify-write of `failure_count` and any
//! destruction it triggers are serialized per vault.
//!
//! Slots are keyed on the canonical location, so relative spellings, `..`
//! segments and symlinks naming the same directory share one mutex.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

/// Registry of one mutex per vault directory
#[derive(Default)]
pub struct PathLocks {
    slots: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutex guarding `path`. Lock the returned slot for the critical section.
    pub fn slot(&self, path: &Path) -> Arc<Mutex<()>> {
        let key = identity(path);
        let mut slots = self.slots.lock();

        // Drop slots nobody is holding or waiting on
        slots.retain(|_, slot| Arc::strong_count(slot) > 1);

        slots
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Number of live slots
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Canonical identity of a path that may not exist yet: the canonical path
/// itself, else the canonical parent joined with the final component.
fn identity(path: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(path) {
        return canonical;
    }

    if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
        let parent = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };
        if let Ok(parent) = fs::canonicalize(parent) {
            return parent.join(name);
        }
    }

    if path.is_absolute() {
        return path.to_path_buf();
    }
    env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_same_path_shares_slot() {
        let locks = PathLocks::new();
        let a = locks.slot(Path::new("/vaults/one"));
        let b = locks.slot(Path::new("/vaults/one"));
        let c = locks.slot(Path::new("/vaults/two"));

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_idle_slots_are_pruned() {
        let locks = PathLocks::new();
        drop(locks.slot(Path::new("/vaults/one")));
        let _held = locks.slot(Path::new("/vaults/two"));

        assert_eq!(locks.len(), 1);
    }

    #[test]
    fn test_spellings_of_one_directory_share_slot() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::create_dir(dir.path().join("SecureVault")).unwrap();
        let locks = PathLocks::new();

        let plain = locks.slot(&dir.path().join("SecureVault"));
        let dotted = locks.slot(&dir.path().join("sub").join("..").join("SecureVault"));
        assert!(Arc::ptr_eq(&plain, &dotted));

        // Not created yet: the canonical parent still identifies it
        let fresh = locks.slot(&dir.path().join("Other"));
        let fresh_dotted = locks.slot(&dir.path().join("sub").join("..").join("Other"));
        assert!(Arc::ptr_eq(&fresh, &fresh_dotted));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directory_shares_slot() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real");
        let link = dir.path().join("link");
        std::fs::create_dir(&real).unwrap();
        std::os::unix::fs::symlink(&real, &link).unwrap();
        let locks = PathLocks::new();

        let a = locks.slot(&real.join("SecureVault"));
        let b = locks.slot(&link.join("SecureVault"));
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_critical_section_is_exclusive() {
        let locks = PathLocks::new();
        let inside = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    let slot = locks.slot(Path::new("/vaults/one"));
                    let _guard = slot.lock();
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(std::time::Duration::from_millis(2));
                    inside.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });

        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }
}
