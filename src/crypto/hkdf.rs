//! FaceLock Vault - HKDF Key Derivation

use hkdf::Hkdf;
use sha2::Sha256;

use super::keys::{VaultKey, KEY_LEN};
use crate::error::{VaultError, VaultResult};

/// Derive a subkey from a parent key with context
pub fn derive_subkey(parent: &VaultKey, context: &[u8], info: &[u8]) -> VaultResult<VaultKey> {
    let hk = Hkdf::<Sha256>::new(Some(context), parent.expose());
    let mut okm = Box::new([0u8; KEY_LEN]);

    hk.expand(info, &mut okm[..])
        .map_err(|e| VaultError::KeyDerivationFailed(e.to_string()))?;

    Ok(VaultKey::from_boxed(okm))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subkeys_are_deterministic_and_separated() {
        let parent = VaultKey::new([0x42; KEY_LEN]);

        let a1 = derive_subkey(&parent, b"salt", b"FACELOCK:A").unwrap();
        let a2 = derive_subkey(&parent, b"salt", b"FACELOCK:A").unwrap();
        let b = derive_subkey(&parent, b"salt", b"FACELOCK:B").unwrap();

        assert_eq!(a1.expose(), a2.expose());
        assert_ne!(a1.expose(), b.expose());
    }
}
