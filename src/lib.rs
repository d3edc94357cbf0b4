//! # FaceLock Vault
//!
//! Face-gated encrypted folder that destroys itself after repeated mismatches.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    FACELOCK VAULT API                    │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────┐  │
//! │  │ BIOMETRICS  │  │ VAULT CORE  │  │ DELIVERY        │  │
//! │  │ (verifier)  │  │ counter +   │  │ inline / stream │  │
//! │  │             │  │ self-destr. │  │ spool           │  │
//! │  └──────┬──────┘  └──────┬──────┘  └────────┬────────┘  │
//! │         │                │                   │           │
//! │  ┌──────┴────────────────┴───────────────────┴────────┐ │
//! │  │                 ENVELOPE ENCRYPTION                 │ │
//! │  │  MasterKey ─HKDF→ XChaCha20 wrap ─→ VaultKey        │ │
//! │  │  VaultKey ─→ AES-256-GCM per entry                  │ │
//! │  └─────────────────────────────────────────────────────┘ │
//! │                                                          │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────┐  │
//! │  │ SECURE FS   │  │ METADATA    │  │ PATH LOCKS      │  │
//! │  │ atomic/wipe │  │ record      │  │ per vault       │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────┘  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Model
//!
//! - One random vault key per vault, stored only wrapped under the master key
//! - Every entry sealed with AES-256-GCM, bound to its encoded name
//! - The failure counter is persisted before any destruction side effect
//! - Three consecutive mismatches overwrite and delete every entry and the record
//! - Key material zeroized on drop

pub mod api;
pub mod biometrics;
pub mod config;
pub mod content;
pub mod crypto;
pub mod delivery;
pub mod error;
pub mod locks;
pub mod metadata;
pub mod naming;
pub mod picker;
pub mod secure_fs;
pub mod vault;

pub use api::{ErrorResponse, UnlockResponse, UnlockedFile, VaultApi};
pub use biometrics::{BiometricVerifier, MatchOutcome, MockVerifier, Template};
pub use config::{AppConfig, VerifierKind};
pub use content::{ContentKind, Delivery};
pub use crypto::{MasterKey, VaultKey};
pub use error::{VaultError, VaultResult};
pub use picker::{FolderPicker, NativePicker, PickResult};
pub use vault::{DecryptedEntry, PayloadFile, VaultManager, VaultStatus, FAILURE_THRESHOLD};

#[cfg(feature = "perceptual")]
pub use biometrics::PerceptualVerifier;

/// FaceLock Vault version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
