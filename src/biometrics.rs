//! FaceLock Vault - Biometric Verification
//!
//! The comparison algorithm is an external capability. The vault only needs
//! two calls: turn a reference image into a [`Template`], and compare a probe
//! image against a stored template. Implementations:
//!
//! - [`MockVerifier`]: used when no real comparator is available; always matches.
//! - [`PerceptualVerifier`] (feature `perceptual`): average-hash comparator on
//!   the `image` crate, a stand-in for a face embedding model.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::VerifierKind;
use crate::error::VaultError;

/// Opaque, comparable representation of a biometric sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Template(String);

impl Template {
    /// Wrap an encoded template
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// Encoded form as stored in the metadata record
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Result of a definite comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Match,
    Mismatch,
}

/// Verifier failures. None of these is a mismatch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BiometricError {
    #[error("{0}")]
    NoFaceDetected(String),

    #[error("{0}")]
    Decode(String),

    #[error("stored template is unusable: {0}")]
    InvalidTemplate(String),
}

impl From<BiometricError> for VaultError {
    fn from(e: BiometricError) -> Self {
        match e {
            BiometricError::NoFaceDetected(msg) => VaultError::NoFaceDetected(msg),
            BiometricError::Decode(msg) => VaultError::ImageDecode(msg),
            BiometricError::InvalidTemplate(msg) => VaultError::VaultCorrupted(msg),
        }
    }
}

/// External biometric capability consumed by the vault
pub trait BiometricVerifier: Send + Sync {
    /// Produce a reference template from an image
    fn extract_template(&self, image: &[u8]) -> Result<Template, BiometricError>;

    /// Compare a probe image against a stored template
    fn compare(&self, reference: &Template, probe: &[u8]) -> Result<MatchOutcome, BiometricError>;
}

/// Build the configured verifier, falling back to the mock when the
/// perceptual comparator is not compiled in
pub fn build_verifier(kind: VerifierKind, tolerance: f32) -> Arc<dyn BiometricVerifier> {
    match kind {
        VerifierKind::Mock => Arc::new(MockVerifier::new()),
        #[cfg(feature = "perceptual")]
        VerifierKind::Perceptual => Arc::new(PerceptualVerifier::new(tolerance)),
        #[cfg(not(feature = "perceptual"))]
        VerifierKind::Perceptual => {
            let _ = tolerance;
            log::warn!("perceptual verifier not compiled in, using mock logic");
            Arc::new(MockVerifier::new())
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// MOCK
// ═══════════════════════════════════════════════════════════════════════════

/// Template produced by the mock
pub const MOCK_TEMPLATE: &str = "MOCK_ENCODING_LIST";

/// Always-match verifier
#[derive(Debug, Default)]
pub struct MockVerifier;

impl MockVerifier {
    pub fn new() -> Self {
        log::warn!("Biometric comparator unavailable: every face will be accepted");
        Self
    }
}

impl BiometricVerifier for MockVerifier {
    fn extract_template(&self, _image: &[u8]) -> Result<Template, BiometricError> {
        Ok(Template::new(MOCK_TEMPLATE))
    }

    fn compare(&self, _reference: &Template, _probe: &[u8]) -> Result<MatchOutcome, BiometricError> {
        Ok(MatchOutcome::Match)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// PERCEPTUAL
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(feature = "perceptual")]
pub use perceptual::PerceptualVerifier;

#[cfg(feature = "perceptual")]
mod perceptual {
    use image::imageops::FilterType;

    use super::{BiometricError, BiometricVerifier, MatchOutcome, Template};

    /// Side of the downscaled grid
    const HASH_SIDE: u32 = 16;

    /// Bits per fingerprint
    const HASH_BITS: usize = (HASH_SIDE * HASH_SIDE) as usize;

    /// Below this luma spread the frame has nothing to fingerprint
    const MIN_CONTRAST: u8 = 8;

    /// Average-hash comparator
    #[derive(Debug, Clone)]
    pub struct PerceptualVerifier {
        /// Max normalised Hamming distance still accepted as a match
        tolerance: f32,
    }

    impl PerceptualVerifier {
        pub fn new(tolerance: f32) -> Self {
            Self { tolerance }
        }

        fn fingerprint(&self, image: &[u8]) -> Result<Vec<u8>, BiometricError> {
            let img = image::load_from_memory(image)
                .map_err(|e| BiometricError::Decode(format!("Could not decode image: {}", e)))?;

            let small = img
                .resize_exact(HASH_SIDE, HASH_SIDE, FilterType::Triangle)
                .to_luma8();
            let pixels: Vec<u8> = small.pixels().map(|p| p.0[0]).collect();

            let min = pixels.iter().copied().min().unwrap_or(0);
            let max = pixels.iter().copied().max().unwrap_or(0);
            if max - min < MIN_CONTRAST {
                return Err(BiometricError::NoFaceDetected(
                    "No face found in image".into(),
                ));
            }

            let mean = pixels.iter().map(|&p| p as u32).sum::<u32>() / pixels.len() as u32;

            let mut bits = vec![0u8; HASH_BITS / 8];
            for (i, &p) in pixels.iter().enumerate() {
                if p as u32 > mean {
                    bits[i / 8] |= 1 << (i % 8);
                }
            }

            Ok(bits)
        }
    }

    impl BiometricVerifier for PerceptualVerifier {
        fn extract_template(&self, image: &[u8]) -> Result<Template, BiometricError> {
            Ok(Template::new(hex::encode(self.fingerprint(image)?)))
        }

        fn compare(&self, reference: &Template, probe: &[u8]) -> Result<MatchOutcome, BiometricError> {
            let known = hex::decode(reference.as_str())
                .map_err(|e| BiometricError::InvalidTemplate(e.to_string()))?;
            if known.len() != HASH_BITS / 8 {
                return Err(BiometricError::InvalidTemplate(format!(
                    "expected {} bytes, got {}",
                    HASH_BITS / 8,
                    known.len()
                )));
            }

            let live = self.fingerprint(probe)?;
            let distance: u32 = known
                .iter()
                .zip(live.iter())
                .map(|(a, b)| (a ^ b).count_ones())
                .sum();

            if distance as f32 / HASH_BITS as f32 <= self.tolerance {
                Ok(MatchOutcome::Match)
            } else {
                Ok(MatchOutcome::Mismatch)
            }
        }
    }
}
