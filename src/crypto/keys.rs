//! FaceLock Vault - Key Management
//!
//! Two key layers:
//!
//! - [`VaultKey`]: random per-vault content key. Lives in memory only while a
//!   vault is being created or unlocked, and is stored on disk exclusively in
//!   wrapped form.
//! - [`MasterKey`]: install-lifetime application secret. Generated once on
//!   first run, persisted outside the source tree, reused across restarts.
//!
//! The master key wraps every vault key on the machine. Whoever holds the
//! master key file can unwrap every vault without passing the biometric gate;
//! the gate only controls when this application performs the unwrap. This is
//! an accepted trust boundary: protect the key file like the vaults
//! themselves.

use std::fmt;
use std::fs;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use secrecy::{ExposeSecret, Secret};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::hkdf::derive_subkey;
use crate::error::{VaultError, VaultResult};
use crate::secure_fs::{atomic_write, publish_new};

/// Key length for AES-256 / XChaCha20
pub const KEY_LEN: usize = 32;

/// Nonce length for AES-GCM
pub const NONCE_LEN: usize = 12;

/// Nonce length for XChaCha20
pub const XCHACHA_NONCE_LEN: usize = 24;

/// HKDF contexts for key derivation
pub mod contexts {
    /// Salt for the key-wrapping sub-key
    pub const WRAP_SALT: &[u8] = b"FACELOCK:MASTER:v1";

    /// Info for the key-wrapping sub-key
    pub const WRAP: &[u8] = b"FACELOCK:WRAP:v1";
}

/// Secure key wrapper with automatic zeroization.
///
/// The bytes live in a single heap buffer that is filled in place and wiped
/// on drop.
#[derive(ZeroizeOnDrop)]
pub struct VaultKey {
    #[zeroize(skip)]
    inner: Secret<KeyBytes>,
}

/// Heap buffer holding key bytes, wiped in place when zeroized
struct KeyBytes(Box<[u8; KEY_LEN]>);

impl Zeroize for KeyBytes {
    fn zeroize(&mut self) {
        self.0.as_mut().zeroize()
    }
}

impl VaultKey {
    /// Create a new vault key from bytes
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self::from_boxed(Box::new(bytes))
    }

    /// Take ownership of an already-filled buffer
    pub(crate) fn from_boxed(bytes: Box<[u8; KEY_LEN]>) -> Self {
        Self {
            inner: Secret::new(KeyBytes(bytes)),
        }
    }

    /// Build a key from an untrusted slice, checking its length
    pub fn from_slice(bytes: &[u8]) -> VaultResult<Self> {
        if bytes.len() != KEY_LEN {
            return Err(VaultError::InvalidKeyLength {
                expected: KEY_LEN,
                actual: bytes.len(),
            });
        }

        let mut key = Box::new([0u8; KEY_LEN]);
        key.copy_from_slice(bytes);
        Ok(Self::from_boxed(key))
    }

    /// Expose the key bytes (use with caution)
    pub fn expose(&self) -> &[u8; KEY_LEN] {
        &self.inner.expose_secret().0
    }

    /// Generate a random key
    pub fn generate() -> Self {
        let mut bytes = Box::new([0u8; KEY_LEN]);
        rand::thread_rng().fill_bytes(&mut bytes[..]);
        Self::from_boxed(bytes)
    }
}

impl fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VaultKey([REDACTED])")
    }
}

/// Process-wide application secret that wraps every vault key
pub struct MasterKey {
    key: VaultKey,
}

impl MasterKey {
    /// Generate a fresh master key (not persisted)
    pub fn generate() -> Self {
        Self {
            key: VaultKey::generate(),
        }
    }

    /// Wrap raw key bytes
    pub fn from_bytes(bytes: &[u8]) -> VaultResult<Self> {
        Ok(Self {
            key: VaultKey::from_slice(bytes)?,
        })
    }

    /// Load the persisted key, generating and persisting it on first run.
    ///
    /// Concurrent first runs agree on one key: only the first publisher's
    /// file lands, everyone else loads it.
    pub fn load_or_generate<P: AsRef<Path>>(path: P) -> VaultResult<Self> {
        let path = path.as_ref();

        if path.exists() {
            return Self::load(path);
        }

        let master = Self::generate();
        let encoded = master.encode();
        if publish_new(path, encoded.as_bytes(), Some(0o600))? {
            log::info!("Generated new master key at {}", path.display());
            Ok(master)
        } else {
            log::debug!("Master key at {} initialised concurrently, loading it", path.display());
            Self::load(path)
        }
    }

    /// Load a persisted key (base64 text)
    pub fn load<P: AsRef<Path>>(path: P) -> VaultResult<Self> {
        let path = path.as_ref();
        let encoded = Zeroizing::new(fs::read_to_string(path)?);

        let bytes = Zeroizing::new(STANDARD.decode(encoded.trim()).map_err(|e| {
            VaultError::Config(format!("master key file {} is not base64: {}", path.display(), e))
        })?);

        Self::from_bytes(&bytes)
    }

    /// Persist as base64 text, owner-readable only, replacing any existing file
    pub fn persist<P: AsRef<Path>>(&self, path: P) -> VaultResult<()> {
        atomic_write(path.as_ref(), self.encode().as_bytes(), Some(0o600))
    }

    fn encode(&self) -> Zeroizing<String> {
        Zeroizing::new(STANDARD.encode(self.key.expose()))
    }

    /// Derive the sub-key actually used for wrapping vault keys
    pub fn wrapping_key(&self) -> VaultResult<VaultKey> {
        derive_subkey(&self.key, contexts::WRAP_SALT, contexts::WRAP)
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey([REDACTED])")
    }
}

/// Generate a random nonce for AES-GCM
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

/// Generate a random nonce for XChaCha20
pub fn generate_xchacha_nonce() -> [u8; XCHACHA_NONCE_LEN] {
    let mut nonce = [0u8; XCHACHA_NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_generated_keys_differ() {
        let k1 = VaultKey::generate();
        let k2 = VaultKey::generate();
        assert_ne!(k1.expose(), k2.expose());
    }

    #[test]
    fn test_from_slice_rejects_bad_length() {
        let err = VaultKey::from_slice(&[0u8; 16]).unwrap_err();
        assert!(matches!(
            err,
            VaultError::InvalidKeyLength { expected: 32, actual: 16 }
        ));
    }

    #[test]
    fn test_master_key_is_generated_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("facelock.key");

        let first = MasterKey::load_or_generate(&path).unwrap();
        assert!(path.exists());
        let second = MasterKey::load_or_generate(&path).unwrap();

        assert_eq!(
            first.wrapping_key().unwrap().expose(),
            second.wrapping_key().unwrap().expose()
        );
    }

    #[test]
    fn test_from_slice_keeps_bytes() {
        let key = VaultKey::from_slice(&[9u8; KEY_LEN]).unwrap();
        assert_eq!(key.expose(), &[9u8; KEY_LEN]);
        assert_eq!(format!("{:?}", key), "VaultKey([REDACTED])");
    }

    #[test]
    fn test_concurrent_first_runs_agree_on_one_key() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("facelock.key");

        let keys: Vec<[u8; KEY_LEN]> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        let master = MasterKey::load_or_generate(&path).unwrap();
                        *master.wrapping_key().unwrap().expose()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let on_disk = MasterKey::load(&path).unwrap();
        for key in &keys {
            assert_eq!(key, on_disk.wrapping_key().unwrap().expose());
        }
    }

    #[test]
    fn test_persist_replaces_existing_key() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("facelock.key");
        MasterKey::load_or_generate(&path).unwrap();

        let replacement = MasterKey::from_bytes(&[3u8; KEY_LEN]).unwrap();
        replacement.persist(&path).unwrap();

        let loaded = MasterKey::load(&path).unwrap();
        assert_eq!(
            loaded.wrapping_key().unwrap().expose(),
            replacement.wrapping_key().unwrap().expose()
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_master_key_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("facelock.key");
        MasterKey::load_or_generate(&path).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_garbage_key_file_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("facelock.key");
        fs::write(&path, "not base64 at all!").unwrap();

        assert!(matches!(MasterKey::load(&path), Err(VaultError::Config(_))));
    }

    #[test]
    fn test_wrapping_key_differs_from_master() {
        let master = MasterKey::from_bytes(&[7u8; KEY_LEN]).unwrap();
        assert_ne!(master.wrapping_key().unwrap().expose(), &[7u8; KEY_LEN]);
    }
}
