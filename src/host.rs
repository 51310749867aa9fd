//! The host environment as seen from a session.
//!
//! Notifications, view titles, link opening and theme kind all belong to the
//! surrounding editor. Sessions only talk to them through [`Host`].

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{EditorConfig, ThemeMode};

/// Prefix carried by every error notification.
pub const NOTIFY_PREFIX: &str = "[markbridge] ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    Info,
    Error,
}

/// Light or dark, as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeKind {
    Light,
    Dark,
}

#[async_trait]
pub trait Host: Send + Sync {
    /// Show a message to the user.
    fn notify(&self, level: NotifyLevel, message: &str);

    /// Update the title of the view hosting a session.
    fn set_title(&self, title: &str);

    /// The host's current color theme.
    fn theme(&self) -> ThemeKind;

    /// Workspace folder containing `file`, if the host has one open.
    fn workspace_root(&self, file: &Path) -> Option<PathBuf>;

    /// Open a web URL or `file://` URI with the host's link handler.
    async fn open_uri(&self, uri: &str) -> std::io::Result<()>;
}

/// Host used by the `markbridge` binary: notifications go to stderr, links to
/// the desktop opener.
#[derive(Debug, Clone)]
pub struct SystemHost {
    theme: ThemeKind,
    workspace: Option<PathBuf>,
}

impl SystemHost {
    pub fn new(config: &EditorConfig) -> Self {
        let theme = match config.theme.unwrap_or(ThemeMode::Auto) {
            ThemeMode::Light => ThemeKind::Light,
            ThemeMode::Dark => ThemeKind::Dark,
            ThemeMode::Auto => {
                theme_from_colorfgbg(std::env::var("COLORFGBG").ok().as_deref())
                    .unwrap_or(ThemeKind::Dark)
            }
        };
        Self {
            theme,
            workspace: config.workspace.clone(),
        }
    }
}

#[async_trait]
impl Host for SystemHost {
    fn notify(&self, level: NotifyLevel, message: &str) {
        let tag = match level {
            NotifyLevel::Info => "info",
            NotifyLevel::Error => "error",
        };
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "[{tag}] {message}");
    }

    fn set_title(&self, title: &str) {
        tracing::info!(title, "view title");
    }

    fn theme(&self) -> ThemeKind {
        self.theme
    }

    fn workspace_root(&self, file: &Path) -> Option<PathBuf> {
        self.workspace
            .as_ref()
            .filter(|root| file.starts_with(root))
            .cloned()
    }

    async fn open_uri(&self, uri: &str) -> std::io::Result<()> {
        open_external(uri).await
    }
}

/// `COLORFGBG` is `fg;bg` (sometimes `fg;default;bg`); backgrounds 7 and 15 are light.
fn theme_from_colorfgbg(value: Option<&str>) -> Option<ThemeKind> {
    let bg: u8 = value?.rsplit(';').next()?.trim().parse().ok()?;
    Some(if matches!(bg, 7 | 15) {
        ThemeKind::Light
    } else {
        ThemeKind::Dark
    })
}

async fn open_external(uri: &str) -> std::io::Result<()> {
    #[cfg(target_os = "macos")]
    {
        tokio::process::Command::new("open")
            .arg(uri)
            .spawn()?
            .wait()
            .await?;
        Ok(())
    }
    #[cfg(target_os = "windows")]
    {
        use std::process::Stdio;
        tokio::process::Command::new("cmd")
            .args(["/C", "start", "", uri])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        return Ok(());
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        tokio::process::Command::new("xdg-open")
            .arg(uri)
            .spawn()?
            .wait()
            .await?;
        Ok(())
    }
}
