//! Two-tier envelope: vault keys wrapped under the master key, file payloads
//! sealed under the vault key.
//!
//! Entry file format (`.enc`):
//! ```text
//! [MAGIC 8B]["FLOCKENC"]
//! [VERSION 1B][0x01]
//! [NONCE 12B][random]
//! [CIPHERTEXT variable][AES-256-GCM, aad = encoded entry name]
//! [TAG 16B][GCM auth tag]
//! ```
//!
//! Wrapped vault key (base64 in the metadata record):
//! ```text
//! [VERSION 1B][0x01]
//! [NONCE 24B][random]
//! [CIPHERTEXT 32B + TAG 16B][XChaCha20-Poly1305 under the wrapping sub-key]
//! ```

use base64::{engine::general_purpose::STANDARD, Engine as _};
use zeroize::Zeroizing;

use super::aead::{decrypt_aes_gcm, decrypt_xchacha, encrypt_aes_gcm, encrypt_xchacha, EncryptedData, TAG_LEN};
use super::keys::{MasterKey, VaultKey, KEY_LEN, NONCE_LEN};
use crate::error::{VaultError, VaultResult};

/// Magic bytes identifying a FaceLock entry file
const MAGIC: &[u8; 8] = b"FLOCKENC";

/// Current format version
const VERSION: u8 = 0x01;

/// Header size: MAGIC(8) + VERSION(1)
const HEADER_SIZE: usize = 8 + 1;

/// Minimum valid entry size
const MIN_FILE_SIZE: usize = HEADER_SIZE + NONCE_LEN + TAG_LEN;

/// Associated data bound into every wrapped key
const WRAP_AAD: &[u8] = b"FACELOCK:VAULT-KEY";

// ═══════════════════════════════════════════════════════════════════════════
// KEY WRAPPING
// ═══════════════════════════════════════════════════════════════════════════

/// Wrap a vault key under the master key, returning the base64 record form
pub fn wrap_vault_key(vault_key: &VaultKey, master: &MasterKey) -> VaultResult<String> {
    let wrapping_key = master.wrapping_key()?;
    let sealed = encrypt_xchacha(&wrapping_key, vault_key.expose(), WRAP_AAD)?;

    let mut framed = Vec::with_capacity(1 + sealed.nonce.len() + sealed.ciphertext.len());
    framed.push(VERSION);
    framed.extend_from_slice(&sealed.to_bytes());

    Ok(STANDARD.encode(framed))
}

/// Unwrap a vault key. Any corruption fails closed.
pub fn unwrap_vault_key(wrapped: &str, master: &MasterKey) -> VaultResult<VaultKey> {
    let framed = STANDARD
        .decode(wrapped.trim())
        .map_err(|e| VaultError::DecryptionFailed(format!("wrapped key is not base64: {}", e)))?;

    let (version, body) = framed
        .split_first()
        .ok_or_else(|| VaultError::DecryptionFailed("wrapped key is empty".into()))?;

    if *version != VERSION {
        return Err(VaultError::DecryptionFailed(format!(
            "Unsupported wrapped key version: {}",
            version
        )));
    }

    let sealed = EncryptedData::from_bytes_xchacha(body)?;
    let wrapping_key = master.wrapping_key()?;
    let raw = Zeroizing::new(decrypt_xchacha(&wrapping_key, &sealed, WRAP_AAD)?);

    if raw.len() != KEY_LEN {
        return Err(VaultError::DecryptionFailed("Invalid vault key length".into()));
    }

    VaultKey::from_slice(&raw)
}

// ═══════════════════════════════════════════════════════════════════════════
// FILE PAYLOADS
// ═══════════════════════════════════════════════════════════════════════════

/// Encrypt one entry. `entry_name` is the encoded on-disk name and is bound
/// as associated data so entries cannot be swapped.
pub fn encrypt_file(content: &[u8], vault_key: &VaultKey, entry_name: &str) -> VaultResult<Vec<u8>> {
    let sealed = encrypt_aes_gcm(vault_key, content, entry_name.as_bytes())?;

    let mut output = Vec::with_capacity(HEADER_SIZE + sealed.nonce.len() + sealed.ciphertext.len());
    output.extend_from_slice(MAGIC);
    output.push(VERSION);
    output.extend_from_slice(&sealed.to_bytes());

    Ok(output)
}

/// Decrypt one entry produced by [`encrypt_file`]
pub fn decrypt_file(data: &[u8], vault_key: &VaultKey, entry_name: &str) -> VaultResult<Vec<u8>> {
    if data.len() < MIN_FILE_SIZE {
        return Err(VaultError::DecryptionFailed("File too small".into()));
    }

    if &data[0..8] != MAGIC {
        return Err(VaultError::DecryptionFailed("Invalid magic bytes".into()));
    }

    let version = data[8];
    if version != VERSION {
        return Err(VaultError::DecryptionFailed(format!(
            "Unsupported version: {}",
            version
        )));
    }

    let sealed = EncryptedData::from_bytes_aes(&data[HEADER_SIZE..])?;
    decrypt_aes_gcm(vault_key, &sealed, entry_name.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn master() -> MasterKey {
        MasterKey::from_bytes(&[0x42u8; KEY_LEN]).unwrap()
    }

    #[test]
    fn test_wrap_unwrap_roundtrip() {
        let master = master();
        let key = VaultKey::generate();

        let wrapped = wrap_vault_key(&key, &master).unwrap();
        let unwrapped = unwrap_vault_key(&wrapped, &master).unwrap();

        assert_eq!(key.expose(), unwrapped.expose());
    }

    #[test]
    fn test_every_bit_flip_fails_unwrap() {
        let master = master();
        let key = VaultKey::generate();
        let framed = STANDARD.decode(wrap_vault_key(&key, &master).unwrap()).unwrap();

        for byte in 0..framed.len() {
            let mut tampered = framed.clone();
            tampered[byte] ^= 0x01;
            let result = unwrap_vault_key(&STANDARD.encode(&tampered), &master);
            assert!(result.is_err(), "flip at byte {} was accepted", byte);
        }
    }

    #[test]
    fn test_unwrap_with_other_master_fails() {
        let key = VaultKey::generate();
        let wrapped = wrap_vault_key(&key, &master()).unwrap();
        let other = MasterKey::from_bytes(&[0x43u8; KEY_LEN]).unwrap();

        assert!(unwrap_vault_key(&wrapped, &other).is_err());
    }

    #[test]
    fn test_unwrap_rejects_garbage() {
        assert!(unwrap_vault_key("", &master()).is_err());
        assert!(unwrap_vault_key("%%%", &master()).is_err());
        assert!(unwrap_vault_key(&STANDARD.encode([1u8; 8]), &master()).is_err());
    }

    #[test]
    fn test_file_roundtrip() {
        let key = VaultKey::generate();
        let payloads: [&[u8]; 3] = [b"", b"secret", &[0xFFu8; 4096]];

        for payload in payloads {
            let sealed = encrypt_file(payload, &key, "aGVsbG8udHh0.enc").unwrap();
            let opened = decrypt_file(&sealed, &key, "aGVsbG8udHh0.enc").unwrap();
            assert_eq!(opened, payload);
        }
    }

    #[test]
    fn test_files_decrypt_independently() {
        let key = VaultKey::generate();
        let a = encrypt_file(b"first", &key, "a.enc").unwrap();
        let b = encrypt_file(b"second", &key, "b.enc").unwrap();

        assert_eq!(decrypt_file(&b, &key, "b.enc").unwrap(), b"second");
        assert_eq!(decrypt_file(&a, &key, "a.enc").unwrap(), b"first");
    }

    #[test]
    fn test_tampered_or_swapped_file_fails() {
        let key = VaultKey::generate();
        let mut sealed = encrypt_file(b"secret photo", &key, "a.enc").unwrap();

        assert!(decrypt_file(&sealed, &key, "b.enc").is_err());

        sealed[HEADER_SIZE + NONCE_LEN + 2] ^= 0xFF;
        assert!(decrypt_file(&sealed, &key, "a.enc").is_err());
    }

    #[test]
    fn test_bad_header_fails() {
        let key = VaultKey::generate();
        let mut sealed = encrypt_file(b"data", &key, "a.enc").unwrap();
        sealed[0] = b'X';
        assert!(decrypt_file(&sealed, &key, "a.enc").is_err());
        assert!(decrypt_file(&sealed[..MIN_FILE_SIZE - 1], &key, "a.enc").is_err());
    }
}
