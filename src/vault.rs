//! FaceLock Vault - Vault Lifecycle
//!
//! A vault is the `SecureVault` directory inside a user-chosen target:
//!
//! ```text
//! <target>/SecureVault/
//!     metadata.json          reference template, wrapped key, entries, failure count
//!     <b64(name)>.enc        one AES-256-GCM entry per payload file
//! ```
//!
//! States: `Locked` while a record with `failure_count < FAILURE_THRESHOLD`
//! exists, `Destroyed` (terminal) once the record is erased. An unlock attempt
//! is either a match (entries returned, counter reset) or a mismatch (counter
//! incremented and persisted, destruction when it reaches the threshold).
//! Verifier errors and integrity errors never move the counter.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use walkdir::WalkDir;
use zeroize::Zeroizing;

use crate::biometrics::{build_verifier, BiometricVerifier, MatchOutcome};
use crate::config::AppConfig;
use crate::content::ContentKind;
use crate::crypto::{decrypt_file, encrypt_file, unwrap_vault_key, wrap_vault_key, MasterKey, VaultKey};
use crate::error::{VaultError, VaultResult};
use crate::locks::PathLocks;
use crate::metadata::{VaultRecord, METADATA_FILE};
use crate::naming::{decode_name, encode_name};
use crate::secure_fs::{secure_delete, SecureFs};

/// Canonical vault directory name inside the target directory
pub const VAULT_DIR_NAME: &str = "SecureVault";

/// Consecutive mismatches that destroy a vault
pub const FAILURE_THRESHOLD: u32 = 3;

/// One plaintext file handed to [`VaultManager::create`]
#[derive(Clone)]
pub struct PayloadFile {
    pub filename: String,
    pub content: Vec<u8>,
}

impl PayloadFile {
    pub fn new(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }
}

impl fmt::Debug for PayloadFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadFile")
            .field("filename", &self.filename)
            .field("len", &self.content.len())
            .finish()
    }
}

/// One entry recovered by a successful unlock
pub struct DecryptedEntry {
    /// Original filename
    pub filename: String,
    /// Classification from the filename extension
    pub kind: ContentKind,
    /// Plaintext, wiped on drop
    pub content: Zeroizing<Vec<u8>>,
}

impl fmt::Debug for DecryptedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptedEntry")
            .field("filename", &self.filename)
            .field("kind", &self.kind)
            .field("len", &self.content.len())
            .finish()
    }
}

/// Observable state of a vault path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultStatus {
    /// A live record exists
    Locked {
        failure_count: u32,
        attempts_remaining: u32,
        entries: usize,
    },
    /// No record: never created, or destroyed
    Absent,
}

/// Outcome of a destruction pass
#[derive(Debug, Default)]
pub struct DestructionReport {
    /// The metadata record (and with it the wrapped key) is gone
    pub metadata_erased: bool,
    /// Items whose secure delete failed
    pub unerased: Vec<PathBuf>,
}

impl DestructionReport {
    /// Error reported to the caller of the unlock that destroyed the vault
    pub fn into_error(self) -> VaultError {
        if self.metadata_erased {
            VaultError::Destroyed {
                unerased: self.unerased,
            }
        } else {
            VaultError::DestructionIncomplete(self.unerased)
        }
    }
}

/// Removes a half-built vault directory unless committed
struct PendingVault<'a> {
    dir: &'a Path,
    committed: bool,
}

impl<'a> PendingVault<'a> {
    fn new(dir: &'a Path) -> Self {
        Self { dir, committed: false }
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PendingVault<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match fs::remove_dir_all(self.dir) {
            Ok(()) => log::debug!("Rolled back partial vault at {}", self.dir.display()),
            Err(e) => log::error!("Could not roll back partial vault at {}: {}", self.dir.display(), e),
        }
    }
}

/// Vault lifecycle manager
pub struct VaultManager {
    /// Install-lifetime master key
    master: MasterKey,
    /// Biometric comparator
    verifier: Arc<dyn BiometricVerifier>,
    /// Per-vault serialization
    locks: PathLocks,
    /// Minimum seconds after a mismatch before the next attempt
    cooldown_secs: u64,
}

impl VaultManager {
    // ═══════════════════════════════════════════════════════════════════════
    // INITIALIZATION
    // ═══════════════════════════════════════════════════════════════════════

    /// Create a manager around an already-loaded master key
    pub fn new(master: MasterKey, verifier: Arc<dyn BiometricVerifier>) -> Self {
        Self {
            master,
            verifier,
            locks: PathLocks::new(),
            cooldown_secs: 0,
        }
    }

    /// Refuse attempts sooner than `secs` after a mismatch
    pub fn with_cooldown(mut self, secs: u64) -> Self {
        self.cooldown_secs = secs;
        self
    }

    /// Load-or-generate the master key and build the configured verifier
    pub fn from_config(config: &AppConfig) -> VaultResult<Self> {
        config.validate()?;
        let master = MasterKey::load_or_generate(&config.master_key_path)?;
        let verifier = build_verifier(config.verifier, config.match_tolerance);

        Ok(Self::new(master, verifier).with_cooldown(config.attempt_cooldown_secs))
    }

    /// Accept either the vault directory or the directory containing it
    pub fn resolve(path: &Path) -> PathBuf {
        if path.join(METADATA_FILE).is_file() {
            path.to_path_buf()
        } else {
            path.join(VAULT_DIR_NAME)
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // CREATE
    // ═══════════════════════════════════════════════════════════════════════

    /// Create a vault in `target_dir/SecureVault`.
    ///
    /// Any failure after the directory is made removes it again, and the
    /// metadata record is written last, so a vault either exists completely
    /// or not at all.
    pub fn create(
        &self,
        target_dir: &Path,
        reference_image: &[u8],
        payload: &[PayloadFile],
    ) -> VaultResult<PathBuf> {
        if payload.is_empty() {
            return Err(VaultError::NoContent);
        }

        if !target_dir.is_dir() {
            return Err(VaultError::TargetMissing(target_dir.display().to_string()));
        }

        let mut names = Vec::with_capacity(payload.len());
        for file in payload {
            let name = encode_name(&file.filename);
            if names.contains(&name) {
                return Err(VaultError::DuplicateEntry(file.filename.clone()));
            }
            names.push(name);
        }

        let vault_dir = target_dir.join(VAULT_DIR_NAME);
        let slot = self.locks.slot(&vault_dir);
        let _guard = slot.lock();

        self.reclaim_orphan(&vault_dir);

        if let Err(e) = fs::create_dir(&vault_dir) {
            return Err(if e.kind() == io::ErrorKind::AlreadyExists {
                VaultError::VaultAlreadyExists(vault_dir.display().to_string())
            } else {
                e.into()
            });
        }
        let pending = PendingVault::new(&vault_dir);

        let reference = self.verifier.extract_template(reference_image)?;

        let fs = SecureFs::new(&vault_dir);
        let vault_key = VaultKey::generate();

        for (file, name) in payload.iter().zip(&names) {
            let sealed = encrypt_file(&file.content, &vault_key, name)?;
            fs.write_file(name, &sealed)?;
            log::debug!("Sealed entry {} ({} bytes)", name, file.content.len());
        }

        let wrapped = wrap_vault_key(&vault_key, &self.master)?;
        drop(vault_key);

        VaultRecord::new(reference, wrapped, names).save(&fs)?;
        pending.commit();

        log::info!("Vault created at {} with {} entries", vault_dir.display(), payload.len());
        Ok(vault_dir)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // UNLOCK
    // ═══════════════════════════════════════════════════════════════════════

    /// Attempt to unlock with a probe image.
    ///
    /// - match: all entries still on disk, decrypted; counter reset to 0
    /// - mismatch: `Rejected { attempts_remaining }`, or `Destroyed` when the
    ///   counter reaches [`FAILURE_THRESHOLD`]
    /// - verifier error / integrity error: reported, counter untouched
    pub fn unlock(&self, vault_path: &Path, probe_image: &[u8]) -> VaultResult<Vec<DecryptedEntry>> {
        let vault_dir = Self::resolve(vault_path);
        let slot = self.locks.slot(&vault_dir);
        let _guard = slot.lock();

        let fs = SecureFs::new(&vault_dir);
        if !fs.exists(METADATA_FILE) {
            return Err(VaultError::VaultNotFound(vault_path.display().to_string()));
        }
        let mut record = VaultRecord::load(&fs)?;

        if record.failure_count >= FAILURE_THRESHOLD {
            // A previous destruction was interrupted
            log::warn!("Resuming destruction of {}", vault_dir.display());
            return Err(self.destroy(&fs, &record).into_error());
        }

        self.check_cooldown(&record)?;

        match self.verifier.compare(&record.reference_encoding, probe_image)? {
            MatchOutcome::Mismatch => {
                record.record_failure();
                // Persist before any destruction side effect
                record.save(&fs)?;

                if record.failure_count >= FAILURE_THRESHOLD {
                    log::warn!("Face mismatch on {}: threshold reached, destroying", vault_dir.display());
                    return Err(self.destroy(&fs, &record).into_error());
                }

                let attempts_remaining = FAILURE_THRESHOLD - record.failure_count;
                log::warn!(
                    "Face mismatch on {}: {} attempt(s) remaining",
                    vault_dir.display(),
                    attempts_remaining
                );
                Err(VaultError::Rejected { attempts_remaining })
            }
            MatchOutcome::Match => {
                let entries = self.open_entries(&fs, &record)?;

                record.reset_failures();
                record.save(&fs)?;

                log::info!("Vault {} unlocked ({} entries)", vault_dir.display(), entries.len());
                Ok(entries)
            }
        }
    }

    /// Inspect a vault without attempting to unlock it
    pub fn status(&self, vault_path: &Path) -> VaultResult<VaultStatus> {
        let vault_dir = Self::resolve(vault_path);
        let slot = self.locks.slot(&vault_dir);
        let _guard = slot.lock();

        let fs = SecureFs::new(&vault_dir);
        if !fs.exists(METADATA_FILE) {
            return Ok(VaultStatus::Absent);
        }

        let record = VaultRecord::load(&fs)?;
        Ok(VaultStatus::Locked {
            failure_count: record.failure_count,
            attempts_remaining: FAILURE_THRESHOLD.saturating_sub(record.failure_count),
            entries: record.files.len(),
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // HELPERS
    // ═══════════════════════════════════════════════════════════════════════

    /// A container without a record is what an interrupted create or an
    /// incomplete destruction leaves behind. It is not a vault: wipe it so
    /// the target can host a new one.
    fn reclaim_orphan(&self, vault_dir: &Path) {
        let is_real_dir = fs::symlink_metadata(vault_dir)
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_real_dir || vault_dir.join(METADATA_FILE).exists() {
            return;
        }

        log::warn!("Reclaiming orphaned vault container at {}", vault_dir.display());
        let mut report = DestructionReport::default();
        self.sweep(vault_dir, &mut report);
        if !report.unerased.is_empty() {
            log::error!(
                "{} item(s) in orphaned container {} could not be erased",
                report.unerased.len(),
                vault_dir.display()
            );
        }
    }

    fn check_cooldown(&self, record: &VaultRecord) -> VaultResult<()> {
        if self.cooldown_secs == 0 {
            return Ok(());
        }

        if let Some(last) = record.last_failure_at {
            let elapsed = (Utc::now() - last).num_seconds().max(0) as u64;
            if elapsed < self.cooldown_secs {
                return Err(VaultError::Throttled {
                    retry_after_secs: self.cooldown_secs - elapsed,
                });
            }
        }

        Ok(())
    }

    /// Unwrap the vault key and decrypt every entry still on disk
    fn open_entries(&self, fs: &SecureFs, record: &VaultRecord) -> VaultResult<Vec<DecryptedEntry>> {
        let vault_key = unwrap_vault_key(&record.encrypted_vault_key, &self.master)
            .map_err(|e| VaultError::Integrity(format!("wrapped vault key rejected: {}", e)))?;

        let mut entries = Vec::with_capacity(record.files.len());

        for name in &record.files {
            let filename = decode_name(name)?;
            let path = entry_path(fs, name)
                .ok_or_else(|| VaultError::Integrity(format!("entry name {} is not a plain file name", name)))?;

            let sealed = match fs::read(&path) {
                Ok(data) => data,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    log::debug!("Entry {} removed out-of-band, skipping", name);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let content = decrypt_file(&sealed, &vault_key, name)
                .map_err(|e| VaultError::Integrity(format!("entry {}: {}", filename, e)))?;

            entries.push(DecryptedEntry {
                kind: ContentKind::classify(&filename),
                filename,
                content: Zeroizing::new(content),
            });
        }

        Ok(entries)
    }

    /// Securely delete every entry, then the record, then anything left.
    ///
    /// Keeps going past individual failures so one bad file cannot shield
    /// the rest.
    fn destroy(&self, fs: &SecureFs, record: &VaultRecord) -> DestructionReport {
        let mut report = DestructionReport::default();

        for name in &record.files {
            let Some(path) = entry_path(fs, name) else {
                log::warn!("Skipping entry with unsafe name {:?}", name);
                continue;
            };
            if let Err(e) = secure_delete(&path) {
                log::error!("Secure delete failed for {}: {}", path.display(), e);
                report.unerased.push(path);
            }
        }

        match fs.delete_file(METADATA_FILE) {
            Ok(()) => report.metadata_erased = true,
            Err(e) => {
                let metadata = fs.full_path(METADATA_FILE);
                log::error!("Secure delete failed for {}: {}", metadata.display(), e);
                report.unerased.push(metadata);
            }
        }

        if report.metadata_erased {
            self.sweep(fs.root(), &mut report);
        }

        log::warn!(
            "Vault {} destroyed ({} item(s) not erased)",
            fs.root().display(),
            report.unerased.len()
        );
        report
    }

    /// Erase stray files left in the container, then the container itself
    fn sweep(&self, root: &Path, report: &mut DestructionReport) {
        let leftovers = WalkDir::new(root)
            .min_depth(1)
            .contents_first(true)
            .into_iter()
            .filter_map(Result::ok);

        for entry in leftovers {
            let path = entry.path();
            if entry.file_type().is_dir() {
                if let Err(e) = fs::remove_dir(path) {
                    log::error!("Could not remove leftover directory {}: {}", path.display(), e);
                    report.unerased.push(path.to_path_buf());
                }
            } else if let Err(e) = secure_delete(path) {
                log::error!("Secure delete failed for {}: {}", path.display(), e);
                report.unerased.push(path.to_path_buf());
            }
        }

        if let Err(e) = fs::remove_dir(root) {
            log::warn!("Vault directory {} left in place: {}", root.display(), e);
        }
    }
}

/// Path of an entry, only if its name is a single plain component
fn entry_path(fs: &SecureFs, name: &str) -> Option<PathBuf> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Some(fs.full_path(name)),
        _ => None,
    }
}
