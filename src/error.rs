//! FaceLock Vault - Error Types

use std::path::PathBuf;

use thiserror::Error;

/// Result type for vault operations
pub type VaultResult<T> = Result<T, VaultError>;

/// Vault error types
#[derive(Error, Debug)]
pub enum VaultError {
    // ═══════════════════════════════════════════════════════════════
    // INPUT ERRORS (no state mutated)
    // ═══════════════════════════════════════════════════════════════

    #[error("No content to encrypt")]
    NoContent,

    #[error("Target directory does not exist: {0}")]
    TargetMissing(String),

    #[error("Vault already exists at: {0}")]
    VaultAlreadyExists(String),

    #[error("Duplicate entry name in payload: {0}")]
    DuplicateEntry(String),

    #[error("No vault found at: {0}")]
    VaultNotFound(String),

    // ═══════════════════════════════════════════════════════════════
    // BIOMETRIC ERRORS (never counted as a failed attempt)
    // ═══════════════════════════════════════════════════════════════

    #[error("No face detected: {0}")]
    NoFaceDetected(String),

    #[error("Could not decode image: {0}")]
    ImageDecode(String),

    // ═══════════════════════════════════════════════════════════════
    // AUTHENTICATION OUTCOMES
    // ═══════════════════════════════════════════════════════════════

    #[error("Face mismatch. Attempts remaining: {attempts_remaining}")]
    Rejected { attempts_remaining: u32 },

    #[error("Too many attempts, retry in {retry_after_secs}s")]
    Throttled { retry_after_secs: u64 },

    #[error("Vault is DESTROYED due to excessive failed attempts")]
    Destroyed {
        /// Entries whose overwrite failed; the metadata record itself is gone
        unerased: Vec<PathBuf>,
    },

    #[error("Vault destruction incomplete: {} item(s) could not be erased", .0.len())]
    DestructionIncomplete(Vec<PathBuf>),

    // ═══════════════════════════════════════════════════════════════
    // INTEGRITY ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Integrity check failed: {0}")]
    Integrity(String),

    #[error("Vault corrupted: {0}")]
    VaultCorrupted(String),

    // ═══════════════════════════════════════════════════════════════
    // CRYPTO ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    // ═══════════════════════════════════════════════════════════════
    // CONFIG / IO / SERIALIZATION
    // ═══════════════════════════════════════════════════════════════

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl VaultError {
    /// Check if this is a security-critical error
    pub fn is_security_critical(&self) -> bool {
        matches!(
            self,
            VaultError::Destroyed { .. }
                | VaultError::DestructionIncomplete(_)
                | VaultError::Integrity(_)
                | VaultError::VaultCorrupted(_)
        )
    }

    /// Check if this outcome was recorded against the failure counter
    pub fn counts_as_failure(&self) -> bool {
        matches!(
            self,
            VaultError::Rejected { .. } | VaultError::Destroyed { .. }
        )
    }

    /// Resource exhaustion (disk full, permissions) is the only fatal class
    pub fn is_fatal(&self) -> bool {
        matches!(self, VaultError::IoError(_))
    }

    /// HTTP-style status code for a transport layer
    pub fn status_code(&self) -> u16 {
        match self {
            VaultError::NoContent
            | VaultError::TargetMissing(_)
            | VaultError::VaultAlreadyExists(_)
            | VaultError::DuplicateEntry(_)
            | VaultError::Config(_) => 400,
            VaultError::Rejected { .. }
            | VaultError::Destroyed { .. }
            | VaultError::DestructionIncomplete(_) => 403,
            VaultError::VaultNotFound(_) => 404,
            VaultError::Integrity(_) | VaultError::VaultCorrupted(_) => 409,
            VaultError::NoFaceDetected(_) | VaultError::ImageDecode(_) => 422,
            VaultError::Throttled { .. } => 429,
            _ => 500,
        }
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(e: serde_json::Error) -> Self {
        VaultError::SerializationError(e.to_string())
    }
}
