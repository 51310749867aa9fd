//! Link targets clicked inside the editor surface.

use std::path::{Path, PathBuf};

use crate::paths;

/// Where an `open-link` request should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    /// A web address, opened verbatim.
    Url(String),
    /// A local path, resolved against the document's folder.
    File(PathBuf),
}

impl LinkTarget {
    /// The string handed to the host's opener.
    pub fn as_uri(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::File(path) => paths::file_uri(path),
        }
    }
}

impl std::fmt::Display for LinkTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Url(url) => f.write_str(url),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Resolve `href` as clicked in the document at `document`.
pub fn resolve_link(document: &Path, href: &str) -> LinkTarget {
    if is_web_url(href) {
        return LinkTarget::Url(href.to_string());
    }
    LinkTarget::File(paths::resolve(&paths::parent_dir(document), Path::new(href)))
}

fn is_web_url(href: &str) -> bool {
    let lower = href.get(..8).unwrap_or(href).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
