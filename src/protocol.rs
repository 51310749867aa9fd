//! Messages exchanged with the editor surface.
//!
//! Both directions are JSON objects tagged by a `command` field.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::assets::UploadFile;
use crate::host::ThemeKind;

/// Sent by the surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum SurfaceCommand {
    /// The surface finished loading and wants its initial content.
    Ready,
    /// The user changed the document.
    Edit { content: String },
    /// Apply `content` and write the document to disk.
    Save { content: String },
    /// Persist the surface's editor options.
    SaveOptions { options: Value },
    /// Forget the persisted editor options.
    ResetConfig,
    Info { content: String },
    Error { content: String },
    Upload { files: Vec<UploadFile> },
    OpenLink { href: String },
}

impl SurfaceCommand {
    /// Parse one JSON message.
    ///
    /// # Errors
    /// Returns an error for malformed JSON or an unknown `command`.
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    /// The wire name of this command, for logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Edit { .. } => "edit",
            Self::Save { .. } => "save",
            Self::SaveOptions { .. } => "save-options",
            Self::ResetConfig => "reset-config",
            Self::Info { .. } => "info",
            Self::Error { .. } => "error",
            Self::Upload { .. } => "upload",
            Self::OpenLink { .. } => "open-link",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateKind {
    /// First content push, carrying options and theme.
    Init,
    Update,
}

/// Sent to the surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum SurfaceMessage {
    Update {
        #[serde(rename = "type")]
        kind: UpdateKind,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        options: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        theme: Option<ThemeKind>,
    },
    Uploaded { files: Vec<String> },
}

impl SurfaceMessage {
    pub fn init(content: String, options: Value, theme: ThemeKind) -> Self {
        Self::Update {
            kind: UpdateKind::Init,
            content,
            options: Some(options),
            theme: Some(theme),
        }
    }

    pub fn update(content: String) -> Self {
        Self::Update {
            kind: UpdateKind::Update,
            content,
            options: None,
            theme: None,
        }
    }

    /// Serialize to one line of JSON.
    ///
    /// # Errors
    /// Returns an error if a payload value cannot be serialized.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
