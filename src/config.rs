//! FaceLock Vault - Configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{VaultError, VaultResult};

/// Which biometric comparator to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifierKind {
    /// Always-match stand-in
    Mock,
    /// Perceptual-hash comparator
    Perceptual,
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Persisted master key (generated on first run)
    pub master_key_path: PathBuf,
    /// Spool directory for streamed media
    pub stream_dir: PathBuf,
    /// URL prefix under which the transport serves `stream_dir`
    pub stream_base_url: String,
    /// Biometric comparator
    pub verifier: VerifierKind,
    /// Max normalised template distance accepted as a match
    pub match_tolerance: f32,
    /// Minimum seconds between a mismatch and the next attempt (0 = off)
    pub attempt_cooldown_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            master_key_path: PathBuf::from("facelock.key"),
            stream_dir: PathBuf::from("temp_stream"),
            stream_base_url: "http://localhost:8000/api/stream/".into(),
            verifier: VerifierKind::Perceptual,
            match_tolerance: 0.15,
            attempt_cooldown_secs: 0,
        }
    }
}

impl AppConfig {
    /// Load from a JSON file; missing fields take defaults
    pub fn load<P: AsRef<Path>>(path: P) -> VaultResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&raw)
            .map_err(|e| VaultError::Config(format!("{}: {}", path.display(), e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load `path` when given, otherwise defaults
    pub fn load_or_default(path: Option<&Path>) -> VaultResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Reject values the vault cannot run with
    pub fn validate(&self) -> VaultResult<()> {
        if self.master_key_path.as_os_str().is_empty() {
            return Err(VaultError::Config("master_key_path is empty".into()));
        }
        if self.stream_dir.as_os_str().is_empty() {
            return Err(VaultError::Config("stream_dir is empty".into()));
        }
        if !(self.match_tolerance > 0.0 && self.match_tolerance < 1.0) {
            return Err(VaultError::Config(format!(
                "match_tolerance must be in (0, 1), got {}",
                self.match_tolerance
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.attempt_cooldown_secs, 0);
        assert_eq!(config.verifier, VerifierKind::Perceptual);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("facelock.json");
        std::fs::write(&path, r#"{ "verifier": "mock", "attempt_cooldown_secs": 30 }"#).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.verifier, VerifierKind::Mock);
        assert_eq!(config.attempt_cooldown_secs, 30);
        assert_eq!(config.stream_dir, PathBuf::from("temp_stream"));
    }

    #[test]
    fn test_bad_tolerance_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("facelock.json");
        std::fs::write(&path, r#"{ "match_tolerance": 1.5 }"#).unwrap();

        assert!(matches!(AppConfig::load(&path), Err(VaultError::Config(_))));
    }

    #[test]
    fn test_load_or_default_without_path() {
        let config = AppConfig::load_or_default(None).unwrap();
        assert_eq!(config.master_key_path, PathBuf::from("facelock.key"));
    }
}
