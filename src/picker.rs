//! Native folder selection for the browse operation.

use std::path::PathBuf;
#[cfg(target_os = "macos")]
use std::process::Command;

use serde::Serialize;

/// Outcome of a folder prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "path", rename_all = "lowercase")]
pub enum PickResult {
    Selected(PathBuf),
    Cancelled,
    /// No native dialog on this platform
    Unavailable,
}

/// Source of a user-chosen directory
pub trait FolderPicker {
    fn pick_folder(&self) -> PickResult;
}

/// Platform dialog (AppleScript `choose folder` on macOS)
#[derive(Debug, Default)]
pub struct NativePicker;

#[cfg(target_os = "macos")]
const PROMPT_SCRIPT: &str = r#"POSIX path of (choose folder with prompt "Select Target Directory")"#;

impl FolderPicker for NativePicker {
    #[cfg(target_os = "macos")]
    fn pick_folder(&self) -> PickResult {
        let output = match Command::new("osascript").arg("-e").arg(PROMPT_SCRIPT).output() {
            Ok(output) => output,
            Err(e) => {
                log::warn!("Could not launch folder dialog: {}", e);
                return PickResult::Unavailable;
            }
        };

        parse_dialog_output(output.status.success(), &output.stdout)
    }

    #[cfg(not(target_os = "macos"))]
    fn pick_folder(&self) -> PickResult {
        PickResult::Unavailable
    }
}

/// Interpret the dialog's exit status and stdout.
/// A non-zero exit is the user dismissing the dialog.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn parse_dialog_output(success: bool, stdout: &[u8]) -> PickResult {
    if !success {
        return PickResult::Cancelled;
    }

    let path = String::from_utf8_lossy(stdout).trim().to_string();
    if path.is_empty() {
        PickResult::Cancelled
    } else {
        PickResult::Selected(PathBuf::from(path))
    }
}
