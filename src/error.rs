//! Error types shared by the document adapter, preference store and asset writer.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the bridge library.
///
/// None of these escape a running session: the session reports them to the
/// user through [`crate::host::Host::notify`] and keeps going.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("document {} is closed", .0.display())]
    DocumentClosed(PathBuf),

    #[error("current file language is not markdown: {}", .0.display())]
    NotMarkdown(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid asset name {0:?}")]
    InvalidAssetName(String),

    #[error("invalid base64 payload for {name}: {source}")]
    Decode {
        name: String,
        #[source]
        source: base64::DecodeError,
    },

    #[error("preference store: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_path() {
        let err = BridgeError::DocumentClosed(PathBuf::from("/proj/a.md"));
        assert_eq!(err.to_string(), "document /proj/a.md is closed");
    }

    #[test]
    fn test_write_error_keeps_source() {
        let err = BridgeError::Write {
            path: PathBuf::from("x.png"),
            source: std::io::Error::other("disk full"),
        };
        assert!(err.to_string().contains("disk full"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
