//! FaceLock Vault - Cryptographic Core
//!
//! Envelope encryption: a random vault key per vault, wrapped under the
//! install-lifetime master key.

pub mod keys;
pub mod aead;
pub mod hkdf;
pub mod envelope;

pub use self::keys::*;
pub use self::aead::*;
pub use self::hkdf::*;
pub use self::envelope::*;
