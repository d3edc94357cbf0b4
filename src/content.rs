//! Content classification by filename extension.
//!
//! Presentation only: decides whether decrypted bytes are returned inline or
//! spooled for streaming. Nothing here touches key handling.

use serde::{Deserialize, Serialize};

/// How decrypted bytes are handed to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    /// Returned as a base64 blob in the response
    Inline,
    /// Written to the stream spool and referenced by handle
    Stream,
}

/// Classified content of one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentKind {
    /// MIME type reported to the client
    pub mime_type: &'static str,
    /// Delivery channel
    pub delivery: Delivery,
}

const OCTET_STREAM: ContentKind = ContentKind {
    mime_type: "application/octet-stream",
    delivery: Delivery::Inline,
};

/// Extension table. `.mov` is deliberately reported as `video/mp4` so
/// browsers attempt H.264 playback.
const TABLE: &[(&str, ContentKind)] = &[
    ("mp4", ContentKind { mime_type: "video/mp4", delivery: Delivery::Stream }),
    ("mov", ContentKind { mime_type: "video/mp4", delivery: Delivery::Stream }),
    ("jpg", ContentKind { mime_type: "image/jpeg", delivery: Delivery::Inline }),
    ("jpeg", ContentKind { mime_type: "image/jpeg", delivery: Delivery::Inline }),
    ("png", ContentKind { mime_type: "image/png", delivery: Delivery::Inline }),
    ("txt", ContentKind { mime_type: "text/plain", delivery: Delivery::Inline }),
];

impl ContentKind {
    /// Classify an original filename (case-insensitive extension match)
    pub fn classify(filename: &str) -> Self {
        let Some((_, ext)) = filename.rsplit_once('.') else {
            return OCTET_STREAM;
        };

        let ext = ext.to_ascii_lowercase();
        TABLE
            .iter()
            .find(|(known, _)| *known == ext)
            .map(|(_, kind)| *kind)
            .unwrap_or(OCTET_STREAM)
    }

    /// True when the entry goes through the stream spool
    pub fn is_streamed(&self) -> bool {
        self.delivery == Delivery::Stream
    }
}
