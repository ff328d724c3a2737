//! Content type detection for extracted entries.

use infer::Infer;

/// Label reported for a zero-length buffer.
pub const EMPTY_MIME: &str = "application/x-empty";
/// Fallback for data no matcher recognizes.
pub const BINARY_MIME: &str = "application/octet-stream";
/// Fallback for data that reads as text.
pub const TEXT_MIME: &str = "text/plain";

/// Infers a MIME type label from the bytes of a file.
pub trait ContentSniffer: Send + Sync {
    fn sniff(&self, bytes: &[u8]) -> String;
}

/// Magic-number sniffer backed by the `infer` matcher set.
///
/// Each worker owns one instance for its whole lifetime.
pub struct MagicSniffer {
    matchers: Infer,
}

impl Default for MagicSniffer {
    fn default() -> Self {
        Self::new()
    }
}

impl MagicSniffer {
    pub fn new() -> Self {
        Self {
            matchers: Infer::new(),
        }
    }
}

impl ContentSniffer for MagicSniffer {
    fn sniff(&self, bytes: &[u8]) -> String {
        if bytes.is_empty() {
            return EMPTY_MIME.to_string();
        }
        if let Some(kind) = self.matchers.get(bytes) {
            return kind.mime_type().to_string();
        }
        if looks_like_text(bytes) {
            TEXT_MIME.to_string()
        } else {
            BINARY_MIME.to_string()
        }
    }
}

/// UTF-8 without control characters other than common whitespace.
fn looks_like_text(bytes: &[u8]) -> bool {
    let Ok(text) = std::str::from_utf8(bytes) else {
        return false;
    };
    !text
        .chars()
        .any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t' | '\x0c'))
}
