//! Stream spool for media entries.
//!
//! Streamed entries are written in plaintext to the spool directory under an
//! unguessable name and handed to the client as a URL the transport serves.
//! The spool is transient and outside the vault's confidentiality boundary.

use std::fs;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::VaultResult;
use crate::secure_fs::{atomic_write, secure_delete};

/// Extension given to every spooled file
const SPOOL_EXTENSION: &str = "mp4";

/// Spool directory plus the URL prefix it is served under
#[derive(Debug, Clone)]
pub struct StreamSpool {
    dir: PathBuf,
    base_url: String,
}

/// One spooled file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHandle {
    /// File name inside the spool
    pub name: String,
    /// Location on disk
    pub path: PathBuf,
    /// URL handed to the client
    pub url: String,
}

impl StreamSpool {
    pub fn new(dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            base_url: base_url.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `content` under a fresh random name
    pub fn store(&self, content: &[u8]) -> VaultResult<StreamHandle> {
        fs::create_dir_all(&self.dir)?;

        let name = format!("{}.{}", Uuid::new_v4(), SPOOL_EXTENSION);
        let path = self.dir.join(&name);
        atomic_write(&path, content, None)?;

        log::debug!("Spooled {} bytes as {}", content.len(), name);
        Ok(StreamHandle {
            url: format!("{}{}", self.base_url, name),
            name,
            path,
        })
    }

    /// Securely delete every spooled file. Returns how many were removed.
    pub fn purge(&self) -> VaultResult<usize> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some(SPOOL_EXTENSION) {
                secure_delete(&path)?;
                removed += 1;
            }
        }

        log::info!("Purged {} spooled file(s) from {}", removed, self.dir.display());
        Ok(removed)
    }
}
