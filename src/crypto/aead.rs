//! FaceLock Vault - AEAD Encryption
//!
//! AES-256-GCM for file payloads, XChaCha20-Poly1305 for key wrapping.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};

use super::keys::{generate_nonce, generate_xchacha_nonce, VaultKey, NONCE_LEN, XCHACHA_NONCE_LEN};
use crate::error::{VaultError, VaultResult};

/// Authentication tag length shared by both ciphers
pub const TAG_LEN: usize = 16;

/// Encrypted data with nonce prepended
pub struct EncryptedData {
    /// Nonce (12 or 24 bytes depending on cipher)
    pub nonce: Vec<u8>,
    /// Ciphertext with authentication tag
    pub ciphertext: Vec<u8>,
}

impl EncryptedData {
    /// Serialize to bytes (nonce || ciphertext)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(self.nonce.len() + self.ciphertext.len());
        result.extend_from_slice(&self.nonce);
        result.extend_from_slice(&self.ciphertext);
        result
    }

    /// Deserialize from bytes (AES-GCM format)
    pub fn from_bytes_aes(data: &[u8]) -> VaultResult<Self> {
        Self::split(data, NONCE_LEN)
    }

    /// Deserialize from bytes (XChaCha20 format)
    pub fn from_bytes_xchacha(data: &[u8]) -> VaultResult<Self> {
        Self::split(data, XCHACHA_NONCE_LEN)
    }

    fn split(data: &[u8], nonce_len: usize) -> VaultResult<Self> {
        if data.len() < nonce_len + TAG_LEN {
            return Err(VaultError::DecryptionFailed("Data too short".into()));
        }

        Ok(Self {
            nonce: data[..nonce_len].to_vec(),
            ciphertext: data[nonce_len..].to_vec(),
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// AES-256-GCM (file payloads)
// ═══════════════════════════════════════════════════════════════════════════

/// Encrypt data with AES-256-GCM, binding `aad`
pub fn encrypt_aes_gcm(key: &VaultKey, plaintext: &[u8], aad: &[u8]) -> VaultResult<EncryptedData> {
    let cipher = Aes256Gcm::new_from_slice(key.expose())
        .map_err(|e| VaultError::EncryptionFailed(e.to_string()))?;

    let nonce_bytes = generate_nonce();
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, Payload { msg: plaintext, aad })
        .map_err(|e| VaultError::EncryptionFailed(e.to_string()))?;

    Ok(EncryptedData {
        nonce: nonce_bytes.to_vec(),
        ciphertext,
    })
}

/// Decrypt data with AES-256-GCM
pub fn decrypt_aes_gcm(key: &VaultKey, encrypted: &EncryptedData, aad: &[u8]) -> VaultResult<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.expose())
        .map_err(|e| VaultError::DecryptionFailed(e.to_string()))?;

    if encrypted.nonce.len() != NONCE_LEN {
        return Err(VaultError::DecryptionFailed("Invalid nonce length".into()));
    }

    let nonce = Nonce::from_slice(&encrypted.nonce);

    cipher
        .decrypt(nonce, Payload { msg: encrypted.ciphertext.as_slice(), aad })
        .map_err(|_| VaultError::DecryptionFailed("Authentication failed".into()))
}

// ═══════════════════════════════════════════════════════════════════════════
// XChaCha20-Poly1305 (key wrapping)
// ═══════════════════════════════════════════════════════════════════════════

/// Encrypt data with XChaCha20-Poly1305, binding `aad`
pub fn encrypt_xchacha(key: &VaultKey, plaintext: &[u8], aad: &[u8]) -> VaultResult<EncryptedData> {
    let cipher = XChaCha20Poly1305::new_from_slice(key.expose())
        .map_err(|e| VaultError::EncryptionFailed(e.to_string()))?;

    let nonce_bytes = generate_xchacha_nonce();
    let nonce = XNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, Payload { msg: plaintext, aad })
        .map_err(|e| VaultError::EncryptionFailed(e.to_string()))?;

    Ok(EncryptedData {
        nonce: nonce_bytes.to_vec(),
        ciphertext,
    })
}

/// Decrypt data with XChaCha20-Poly1305
pub fn decrypt_xchacha(key: &VaultKey, encrypted: &EncryptedData, aad: &[u8]) -> VaultResult<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new_from_slice(key.expose())
        .map_err(|e| VaultError::DecryptionFailed(e.to_string()))?;

    if encrypted.nonce.len() != XCHACHA_NONCE_LEN {
        return Err(VaultError::DecryptionFailed("Invalid nonce length".into()));
    }

    let nonce = XNonce::from_slice(&encrypted.nonce);

    cipher
        .decrypt(nonce, Payload { msg: encrypted.ciphertext.as_slice(), aad })
        .map_err(|_| VaultError::DecryptionFailed("Authentication failed".into()))
}
