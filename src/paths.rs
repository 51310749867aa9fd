//! Lexical path helpers.
//!
//! Nothing here touches the filesystem: paths are normalized the way a
//! resolver would see them, without following symlinks, so results are
//! stable for files that do not exist yet (upload targets, link targets).

use std::path::{Component, Path, PathBuf};

/// Collapse `.` and `..` components without consulting the filesystem.
///
/// A `..` that would climb above the root of an absolute path is dropped;
/// leading `..` on a relative path is preserved.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().collect()
}

/// Resolve `target` against `base` the way a shell `cd base && realpath -m target` would.
pub fn resolve(base: &Path, target: &Path) -> PathBuf {
    if target.is_absolute() {
        normalize(target)
    } else {
        normalize(&base.join(target))
    }
}

/// The directory that contains `file`, or `.` for a bare file name.
pub fn parent_dir(file: &Path) -> PathBuf {
    file.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Compute the path of `to` relative to the directory `from`.
///
/// Both inputs are normalized first. Returns `.` when they are equal.
pub fn relative_to(from: &Path, to: &Path) -> PathBuf {
    let from = normalize(from);
    let to = normalize(to);
    let from_parts: Vec<_> = from.components().collect();
    let to_parts: Vec<_> = to.components().collect();

    let common = from_parts
        .iter()
        .zip(&to_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut rel = PathBuf::new();
    for part in &from_parts[common..] {
        if !matches!(part, Component::CurDir) {
            rel.push("..");
        }
    }
    for part in &to_parts[common..] {
        rel.push(part.as_os_str());
    }
    if rel.as_os_str().is_empty() {
        rel.push(".");
    }
    rel
}

/// Render a path with `/` separators regardless of platform.
pub fn to_forward_slashes(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Build a `file://` URI for an absolute path.
///
/// Only the characters that would break a URI inside an HTML attribute or
/// change its meaning are escaped.
pub fn file_uri(path: &Path) -> String {
    let raw = to_forward_slashes(path);
    let mut out = String::with_capacity(raw.len() + 8);
    out.push_str("file://");
    if !raw.starts_with('/') {
        out.push('/');
    }
    for ch in raw.chars() {
        match ch {
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '%' => out.push_str("%25"),
            '"' => out.push_str("%22"),
            _ => out.push(ch),
        }
    }
    out
}
