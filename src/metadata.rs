//! Per-vault metadata record (`metadata.json`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::biometrics::Template;
use crate::error::{VaultError, VaultResult};
use crate::secure_fs::SecureFs;

/// Metadata file name inside the vault directory
pub const METADATA_FILE: &str = "metadata.json";

/// Current record version
pub const RECORD_VERSION: u32 = 1;

/// Durable state of one vault
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultRecord {
    /// Reference template, immutable after creation
    pub reference_encoding: Template,
    /// Vault key wrapped under the master key (base64)
    pub encrypted_vault_key: String,
    /// Encoded entry names, in payload order
    pub files: Vec<String>,
    /// Consecutive mismatches since the last match
    #[serde(default)]
    pub failure_count: u32,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Time of the most recent mismatch
    #[serde(default)]
    pub last_failure_at: Option<DateTime<Utc>>,
}

fn default_version() -> u32 {
    RECORD_VERSION
}

impl VaultRecord {
    /// Fresh record with a zero failure count
    pub fn new(reference: Template, wrapped_key: String, files: Vec<String>) -> Self {
        Self {
            reference_encoding: reference,
            encrypted_vault_key: wrapped_key,
            files,
            failure_count: 0,
            version: RECORD_VERSION,
            created_at: Some(Utc::now()),
            last_failure_at: None,
        }
    }

    /// Read the record from a vault directory
    pub fn load(fs: &SecureFs) -> VaultResult<Self> {
        let raw = fs.read_file(METADATA_FILE)?;

        serde_json::from_slice(&raw).map_err(|e| {
            VaultError::VaultCorrupted(format!("{}: {}", fs.full_path(METADATA_FILE).display(), e))
        })
    }

    /// Persist atomically (write-then-rename)
    pub fn save(&self, fs: &SecureFs) -> VaultResult<()> {
        let json = serde_json::to_vec(self)?;
        fs.write_file(METADATA_FILE, &json)
    }

    /// Record one mismatch
    pub fn record_failure(&mut self) {
        self.failure_count = self.failure_count.saturating_add(1);
        self.last_failure_at = Some(Utc::now());
    }

    /// Clear the counter after a match
    pub fn reset_failures(&mut self) {
        self.failure_count = 0;
        self.last_failure_at = None;
    }
}
