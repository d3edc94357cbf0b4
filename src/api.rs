//! FaceLock Vault - Unified Public API
//!
//! Single entry point for the create / unlock / browse operations. Shapes
//! results into the serializable responses a transport hands to clients,
//! including spooling of streamed media.

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;

use crate::config::AppConfig;
use crate::content::Delivery;
use crate::delivery::StreamSpool;
use crate::error::{VaultError, VaultResult};
use crate::picker::{FolderPicker, PickResult};
use crate::vault::{PayloadFile, VaultManager, VaultStatus};

/// Entry name given to the free-text secret
pub const SECRET_TEXT_ENTRY: &str = "message.txt";

// ═══════════════════════════════════════════════════════════════════════════════
// RESPONSE TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of a successful create
#[derive(Debug, Clone, Serialize)]
pub struct CreateResponse {
    pub success: bool,
    pub vault_path: PathBuf,
    pub entries: usize,
}

/// One unlocked file as seen by the client
#[derive(Debug, Clone, Serialize)]
pub struct UnlockedFile {
    pub filename: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    /// Standard base64 for inline kinds, empty for streamed ones
    pub content: String,
    /// Spool URL for streamed kinds
    pub url: Option<String>,
}

/// Result of a successful unlock
#[derive(Debug, Clone, Serialize)]
pub struct UnlockResponse {
    pub success: bool,
    pub files: Vec<UnlockedFile>,
}

/// Error body for a transport
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts_remaining: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
    pub destroyed: bool,
}

impl From<&VaultError> for ErrorResponse {
    fn from(err: &VaultError) -> Self {
        let attempts_remaining = match err {
            VaultError::Rejected { attempts_remaining } => Some(*attempts_remaining),
            VaultError::Destroyed { .. } => Some(0),
            _ => None,
        };
        let retry_after_secs = match err {
            VaultError::Throttled { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };

        Self {
            status: err.status_code(),
            detail: err.to_string(),
            attempts_remaining,
            retry_after_secs,
            destroyed: matches!(err, VaultError::Destroyed { .. }),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// VAULT API
// ═══════════════════════════════════════════════════════════════════════════════

/// FaceLock Vault API
///
/// # Example
///
/// ```rust,ignore
/// use facelock_vault::{AppConfig, VaultApi, PayloadFile};
///
/// let api = VaultApi::from_config(AppConfig::default())?;
///
/// api.create_vault(target, &reference_jpeg, Some("the code is 1234"), vec![])?;
///
/// match api.unlock_vault(target, &probe_jpeg) {
///     Ok(response) => println!("{}", serde_json::to_string(&response)?),
///     Err(e) => println!("{}", serde_json::to_string(&ErrorResponse::from(&e))?),
/// }
/// ```
pub struct VaultApi {
    manager: VaultManager,
    spool: StreamSpool,
    config: AppConfig,
}

impl VaultApi {
    // ═══════════════════════════════════════════════════════════════════════
    // INITIALIZATION
    // ═══════════════════════════════════════════════════════════════════════

    /// Load-or-generate the master key and build everything from `config`
    pub fn from_config(config: AppConfig) -> VaultResult<Self> {
        let manager = VaultManager::from_config(&config)?;
        Ok(Self::with_manager(manager, config))
    }

    /// Wrap an existing manager
    pub fn with_manager(manager: VaultManager, config: AppConfig) -> Self {
        let spool = StreamSpool::new(&config.stream_dir, config.stream_base_url.clone());
        Self {
            manager,
            spool,
            config,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn manager(&self) -> &VaultManager {
        &self.manager
    }

    pub fn spool(&self) -> &StreamSpool {
        &self.spool
    }

    // ═══════════════════════════════════════════════════════════════════════
    // OPERATIONS
    // ═══════════════════════════════════════════════════════════════════════

    /// Create a vault from uploaded files plus an optional text secret
    pub fn create_vault(
        &self,
        target_dir: &Path,
        reference_image: &[u8],
        secret_text: Option<&str>,
        files: Vec<PayloadFile>,
    ) -> VaultResult<CreateResponse> {
        let mut payload = Vec::with_capacity(files.len() + 1);
        if let Some(text) = secret_text.filter(|t| !t.is_empty()) {
            payload.push(PayloadFile::new(SECRET_TEXT_ENTRY, text));
        }
        payload.extend(files);

        let vault_path = self.manager.create(target_dir, reference_image, &payload)?;

        Ok(CreateResponse {
            success: true,
            vault_path,
            entries: payload.len(),
        })
    }

    /// Unlock and shape the entries for delivery
    pub fn unlock_vault(&self, source_dir: &Path, face_image: &[u8]) -> VaultResult<UnlockResponse> {
        let entries = self.manager.unlock(source_dir, face_image)?;

        let mut files = Vec::with_capacity(entries.len());
        for entry in entries {
            let file = match entry.kind.delivery {
                Delivery::Stream => {
                    let handle = self.spool.store(&entry.content)?;
                    UnlockedFile {
                        filename: entry.filename,
                        mime_type: entry.kind.mime_type.to_string(),
                        content: String::new(),
                        url: Some(handle.url),
                    }
                }
                Delivery::Inline => UnlockedFile {
                    content: STANDARD.encode(entry.content.as_slice()),
                    filename: entry.filename,
                    mime_type: entry.kind.mime_type.to_string(),
                    url: None,
                },
            };
            files.push(file);
        }

        Ok(UnlockResponse { success: true, files })
    }

    /// Current state of a vault path
    pub fn status(&self, path: &Path) -> VaultResult<VaultStatus> {
        self.manager.status(path)
    }

    /// Ask the user for a target directory
    pub fn browse(&self, picker: &dyn FolderPicker) -> PickResult {
        picker.pick_folder()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biometrics::MockVerifier;
    use crate::config::VerifierKind;
    use crate::crypto::MasterKey;
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};

    fn api(dir: &TempDir) -> VaultApi {
        let config = AppConfig {
            master_key_path: dir.path().join("facelock.key"),
            stream_dir: dir.path().join("temp_stream"),
            verifier: VerifierKind::Mock,
            ..AppConfig::default()
        };
        let manager = VaultManager::new(MasterKey::generate(), Arc::new(MockVerifier::new()));
        VaultApi::with_manager(manager, config)
    }

    #[test]
    fn test_create_and_unlock_shapes_response() {
        let dir = tempdir().unwrap();
        let target = tempdir().unwrap();
        let api = api(&dir);

        let created = api
            .create_vault(
                target.path(),
                b"face",
                Some("the code is 1234"),
                vec![PayloadFile::new("clip.MOV", b"frames".to_vec())],
            )
            .unwrap();
        assert!(created.success);
        assert_eq!(created.entries, 2);

        let response = api.unlock_vault(target.path(), b"face").unwrap();
        assert!(response.success);
        assert_eq!(response.files.len(), 2);

        let text = &response.files[0];
        assert_eq!(text.filename, SECRET_TEXT_ENTRY);
        assert_eq!(text.mime_type, "text/plain");
        assert_eq!(STANDARD.decode(&text.content).unwrap(), b"the code is 1234");
        assert!(text.url.is_none());

        let clip = &response.files[1];
        assert_eq!(clip.mime_type, "video/mp4");
        assert!(clip.content.is_empty());
        let url = clip.url.as_deref().unwrap();
        assert!(url.starts_with("http://localhost:8000/api/stream/"));
        assert!(url.ends_with(".mp4"));

        let spooled = api.spool().dir().join(url.rsplit('/').next().unwrap());
        assert_eq!(std::fs::read(spooled).unwrap(), b"frames");
    }

    #[test]
    fn test_wire_shape() {
        let dir = tempdir().unwrap();
        let target = tempdir().unwrap();
        let api = api(&dir);
        api.create_vault(target.path(), b"face", Some("hi"), vec![]).unwrap();

        let response = api.unlock_vault(target.path(), b"face").unwrap();
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["files"][0]["filename"], "message.txt");
        assert_eq!(json["files"][0]["type"], "text/plain");
        assert_eq!(json["files"][0]["content"], "aGk=");
        assert!(json["files"][0]["url"].is_null());
    }

    #[test]
    fn test_empty_payload_is_rejected() {
        let dir = tempdir().unwrap();
        let target = tempdir().unwrap();
        let api = api(&dir);

        assert!(matches!(
            api.create_vault(target.path(), b"face", None, vec![]),
            Err(VaultError::NoContent)
        ));
        assert!(matches!(
            api.create_vault(target.path(), b"face", Some(""), vec![]),
            Err(VaultError::NoContent)
        ));
    }

    #[test]
    fn test_error_response() {
        let rejected = ErrorResponse::from(&VaultError::Rejected { attempts_remaining: 2 });
        assert_eq!(rejected.status, 403);
        assert_eq!(rejected.attempts_remaining, Some(2));
        assert_eq!(rejected.detail, "Face mismatch. Attempts remaining: 2");
        assert!(!rejected.destroyed);

        let destroyed = ErrorResponse::from(&VaultError::Destroyed { unerased: vec![] });
        assert!(destroyed.destroyed);
        assert_eq!(destroyed.attempts_remaining, Some(0));

        let no_face = ErrorResponse::from(&VaultError::NoFaceDetected("none".into()));
        assert_eq!(no_face.status, 422);
        let json = serde_json::to_value(&no_face).unwrap();
        assert!(json.get("attempts_remaining").is_none());
    }

    #[test]
    fn test_from_config_reuses_persisted_master_key() {
        let dir = tempdir().unwrap();
        let target = tempdir().unwrap();
        let config = AppConfig {
            master_key_path: dir.path().join("facelock.key"),
            stream_dir: dir.path().join("temp_stream"),
            verifier: VerifierKind::Mock,
            ..AppConfig::default()
        };

        let first = VaultApi::from_config(config.clone()).unwrap();
        first.create_vault(target.path(), b"face", Some("persisted"), vec![]).unwrap();
        assert!(config.master_key_path.exists());
        drop(first);

        let second = VaultApi::from_config(config).unwrap();
        let response = second.unlock_vault(target.path(), b"face").unwrap();
        assert_eq!(STANDARD.decode(&response.files[0].content).unwrap(), b"persisted");
    }

    struct StubPicker(PickResult);

    impl FolderPicker for StubPicker {
        fn pick_folder(&self) -> PickResult {
            self.0.clone()
        }
    }

    #[test]
    fn test_browse_delegates_to_picker() {
        let dir = tempdir().unwrap();
        let api = api(&dir);

        let chosen = PickResult::Selected(PathBuf::from("/tmp/target"));
        assert_eq!(api.browse(&StubPicker(chosen.clone())), chosen);
        assert_eq!(api.browse(&StubPicker(PickResult::Cancelled)), PickResult::Cancelled);
    }
}
