//! FaceLock Vault - Secure Filesystem Operations
//!
//! Atomic writes for vault files and the overwrite-then-remove primitive used
//! by self-destruct.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use rand::RngCore;
use uuid::Uuid;

use crate::error::{VaultError, VaultResult};

/// Overwrite buffer size
const WIPE_CHUNK: usize = 1024 * 1024;

/// Secure Filesystem Handler rooted at one vault directory
pub struct SecureFs {
    /// Root directory
    root: PathBuf,
}

impl SecureFs {
    /// Create new SecureFs with root directory
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get full path for a relative file
    pub fn full_path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Write file atomically
    pub fn write_file(&self, relative_path: &str, data: &[u8]) -> VaultResult<()> {
        atomic_write(&self.full_path(relative_path), data, None)
    }

    /// Read file
    pub fn read_file(&self, relative_path: &str) -> VaultResult<Vec<u8>> {
        let path = self.full_path(relative_path);

        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(VaultError::VaultNotFound(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        Ok(data)
    }

    /// Check if file exists
    pub fn exists(&self, relative_path: &str) -> bool {
        self.full_path(relative_path).exists()
    }

    /// Securely delete a file under the root
    pub fn delete_file(&self, relative_path: &str) -> io::Result<()> {
        secure_delete(&self.full_path(relative_path))
    }
}

/// Write to a sibling temp file, fsync, then rename over `path`.
///
/// A crash leaves either the previous file or the new one, never a mix.
/// `mode` sets Unix permission bits on the temp file before it is published.
pub fn atomic_write(path: &Path, data: &[u8], mode: Option<u32>) -> VaultResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let temp_path = path.with_extension("tmp");

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    if let Some(mode) = mode {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    let result = options.open(&temp_path).and_then(|mut file| {
        file.write_all(data)?;
        file.sync_all()
    });

    if let Err(e) = result.and_then(|_| fs::rename(&temp_path, path)) {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }

    Ok(())
}

/// Publish `data` at `path` only if nothing is there yet.
///
/// The content is fully written to a uniquely named sibling first and then
/// hard-linked into place, so readers never observe a partial file and
/// concurrent publishers cannot replace each other. Returns `false` when
/// another writer got there first.
pub fn publish_new(path: &Path, data: &[u8], mode: Option<u32>) -> VaultResult<bool> {
    let stem = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("publish");
    let staged = path.with_file_name(format!(".{}.{}.new", stem, Uuid::new_v4().simple()));

    atomic_write(&staged, data, mode)?;

    let linked = fs::hard_link(&staged, path);
    let _ = fs::remove_file(&staged);

    match linked {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Overwrite a file's full length with random bytes, sync, then unlink.
///
/// Missing targets are a no-op, so repeated calls are safe.
pub fn secure_delete(path: &Path) -> io::Result<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    // Never follow a link into somebody else's file
    if metadata.is_file() && metadata.len() > 0 {
        let mut file = OpenOptions::new().write(true).open(path)?;
        let mut chunk = vec![0u8; metadata.len().min(WIPE_CHUNK as u64) as usize];
        let mut remaining = metadata.len();
        let mut rng = rand::thread_rng();

        while remaining > 0 {
            let take = remaining.min(chunk.len() as u64) as usize;
            rng.fill_bytes(&mut chunk[..take]);
            file.write_all(&chunk[..take])?;
            remaining -= take as u64;
        }

        file.sync_all()?;
    }

    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_secure_fs() {
        let dir = tempdir().unwrap();
        let fs = SecureFs::new(dir.path());

        fs.write_file("data.enc", b"encrypted data").unwrap();
        assert!(fs.exists("data.enc"));
        assert!(!fs.exists("data.tmp"));

        let data = fs.read_file("data.enc").unwrap();
        assert_eq!(data, b"encrypted data");

        fs.delete_file("data.enc").unwrap();
        assert!(!fs.exists("data.enc"));
    }

    #[test]
    fn test_atomic_write_replaces() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metadata.json");

        atomic_write(&path, b"old", None).unwrap();
        atomic_write(&path, b"new", None).unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"new");
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let fs = SecureFs::new(dir.path());
        assert!(matches!(fs.read_file("nope"), Err(VaultError::VaultNotFound(_))));
    }

    #[test]
    fn test_secure_delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("victim.enc");
        std::fs::write(&path, vec![0xAB; 3 * 1024]).unwrap();

        secure_delete(&path).unwrap();
        assert!(!path.exists());

        secure_delete(&path).unwrap();
        secure_delete(&path).unwrap();
    }

    #[test]
    fn test_secure_delete_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.enc");
        std::fs::write(&path, b"").unwrap();

        secure_delete(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_publish_new_keeps_first_writer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("facelock.key");

        assert!(publish_new(&path, b"first", None).unwrap());
        assert!(!publish_new(&path, b"second", None).unwrap());

        assert_eq!(std::fs::read(&path).unwrap(), b"first");
        let names: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(names.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_secure_delete_spans_multiple_chunks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("large.enc");
        let witness = dir.path().join("witness");
        let len = WIPE_CHUNK + 7;
        std::fs::write(&path, vec![0u8; len]).unwrap();
        std::fs::hard_link(&path, &witness).unwrap();

        secure_delete(&path).unwrap();

        let remains = std::fs::read(&witness).unwrap();
        assert_eq!(remains.len(), len);
        assert!(remains[WIPE_CHUNK..].iter().any(|b| *b != 0));
    }

    #[cfg(unix)]
    #[test]
    fn test_secure_delete_overwrites_through_hard_link() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("victim.enc");
        let witness = dir.path().join("witness");
        std::fs::write(&path, vec![0u8; 4096]).unwrap();
        std::fs::hard_link(&path, &witness).unwrap();

        secure_delete(&path).unwrap();

        // The surviving link shows the inode was rewritten in place
        let remains = std::fs::read(&witness).unwrap();
        assert_eq!(remains.len(), 4096);
        assert!(remains.iter().any(|b| *b != 0));
    }
}
