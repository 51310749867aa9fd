//! Asset uploads from the editor surface.
//!
//! Pasted or dropped images arrive as base64 payloads. They are written into
//! one destination folder computed from a path template, and the surface gets
//! back links relative to the document.

use std::path::{Path, PathBuf};

use base64::Engine;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};
use crate::paths;

/// Everything the template placeholders can draw from.
#[derive(Debug, Clone, Copy)]
pub struct TemplateContext<'a> {
    /// Absolute path of the document being edited.
    pub file: &'a Path,
    /// Workspace folder containing the document, if any.
    pub project_root: Option<&'a Path>,
}

type Resolver = fn(&TemplateContext<'_>) -> String;

/// Applied in order, each replacing its first occurrence only.
const PLACEHOLDERS: &[(&str, Resolver)] = &[
    ("${projectRoot}", project_root),
    ("${file}", file_path),
    ("${fileBasenameNoExtension}", file_stem),
    ("${dir}", file_dir),
];

fn project_root(ctx: &TemplateContext<'_>) -> String {
    ctx.project_root
        .map_or_else(|| paths::parent_dir(ctx.file), Path::to_path_buf)
        .to_string_lossy()
        .to_string()
}

fn file_path(ctx: &TemplateContext<'_>) -> String {
    ctx.file.to_string_lossy().to_string()
}

fn file_stem(ctx: &TemplateContext<'_>) -> String {
    ctx.file
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn file_dir(ctx: &TemplateContext<'_>) -> String {
    paths::parent_dir(ctx.file).to_string_lossy().to_string()
}

/// Substitute the placeholders in `template`.
pub fn expand_template(template: &str, ctx: &TemplateContext<'_>) -> String {
    PLACEHOLDERS
        .iter()
        .fold(template.to_string(), |acc, (placeholder, resolve)| {
            if acc.contains(placeholder) {
                acc.replacen(placeholder, &resolve(ctx), 1)
            } else {
                acc
            }
        })
}

/// Resolve the destination folder for uploads to the document at `ctx.file`.
///
/// The expanded template is taken relative to the document's folder unless it
/// is already absolute.
pub fn resolve_asset_dir(template: &str, ctx: &TemplateContext<'_>) -> PathBuf {
    let expanded = expand_template(template, ctx);
    paths::resolve(&paths::parent_dir(ctx.file), Path::new(&expanded))
}

/// Link from the document to `target`, always with `/` separators.
pub fn relative_link(document: &Path, target: &Path) -> String {
    paths::to_forward_slashes(&paths::relative_to(&paths::parent_dir(document), target))
}

/// One file in an upload request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadFile {
    pub name: String,
    /// File content, base64 encoded.
    pub base64: String,
}

/// A file that could not be stored.
#[derive(Debug)]
pub struct UploadFailure {
    pub name: String,
    pub error: BridgeError,
}

/// Result of an upload batch.
#[derive(Debug, Default)]
pub struct UploadReport {
    /// Links to the stored files, relative to the document, in request order.
    pub links: Vec<String>,
    pub failures: Vec<UploadFailure>,
}

/// Decode and write every file into `dir`, concurrently.
///
/// The folder must already exist (or its creation has already been
/// attempted). A failing file does not stop the others.
pub async fn write_assets(document: &Path, dir: &Path, files: &[UploadFile]) -> UploadReport {
    let writes = files.iter().map(|file| async move {
        let target = asset_target(dir, &file.name)?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(file.base64.trim())
            .map_err(|source| BridgeError::Decode {
                name: file.name.clone(),
                source,
            })?;
        tokio::fs::write(&target, bytes)
            .await
            .map_err(|source| BridgeError::Write {
                path: target.clone(),
                source,
            })?;
        Ok::<_, BridgeError>(target)
    });

    let mut report = UploadReport::default();
    for (file, outcome) in files.iter().zip(join_all(writes).await) {
        match outcome {
            Ok(target) => report.links.push(relative_link(document, &target)),
            Err(error) => {
                tracing::warn!(name = %file.name, %error, "asset write failed");
                report.failures.push(UploadFailure {
                    name: file.name.clone(),
                    error,
                });
            }
        }
    }
    report
}

/// Only the final component of a supplied name is used, so a name cannot
/// escape the asset folder.
fn asset_target(dir: &Path, name: &str) -> Result<PathBuf> {
    let normalized = name.replace('\\', "/");
    let file_name = Path::new(&normalized)
        .file_name()
        .ok_or_else(|| BridgeError::InvalidAssetName(name.to_string()))?;
    Ok(dir.join(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn ctx<'a>(file: &'a Path, root: Option<&'a Path>) -> TemplateContext<'a> {
        TemplateContext {
            file,
            project_root: root,
        }
    }

    #[test]
    fn test_project_root_template() {
        let file = Path::new("/proj/docs/a.md");
        let dir = resolve_asset_dir("${projectRoot}/img", &ctx(file, Some(Path::new("/proj"))));
        assert_eq!(dir, PathBuf::from("/proj/img"));
    }

    #[test]
    fn test_default_template_is_next_to_document() {
        let file = Path::new("/proj/docs/a.md");
        let dir = resolve_asset_dir("assets", &ctx(file, Some(Path::new("/proj"))));
        assert_eq!(dir, PathBuf::from("/proj/docs/assets"));
    }

    #[test]
    fn test_basename_and_dir_placeholders() {
        let file = Path::new("/proj/docs/a.md");
        let dir = resolve_asset_dir("${dir}/${fileBasenameNoExtension}.assets", &ctx(file, None));
        assert_eq!(dir, PathBuf::from("/proj/docs/a.assets"));
    }

    #[test]
    fn test_missing_project_root_falls_back_to_document_dir() {
        let file = Path::new("/proj/docs/a.md");
        let dir = resolve_asset_dir("${projectRoot}/img", &ctx(file, None));
        assert_eq!(dir, PathBuf::from("/proj/docs/img"));
    }

    #[test]
    fn test_only_first_occurrence_is_replaced() {
        let file = Path::new("/p/a.md");
        let expanded = expand_template("${dir}-${dir}", &ctx(file, None));
        assert_eq!(expanded, "/p-${dir}");
    }

    #[test]
    fn test_literal_template_passes_through() {
        let file = Path::new("/p/a.md");
        assert_eq!(expand_template("../shared", &ctx(file, None)), "../shared");
    }

    #[test]
    fn test_relative_link_uses_forward_slashes() {
        let link = relative_link(Path::new("/proj/docs/a.md"), Path::new("/proj/img/x.png"));
        assert_eq!(link, "../img/x.png");
        assert_eq!(
            link,
            relative_link(Path::new("/proj/docs/a.md"), Path::new("/proj/img/x.png"))
        );
    }

    #[test]
    fn test_asset_target_strips_directories() {
        let dir = Path::new("/a");
        assert_eq!(asset_target(dir, "../../etc/x.png").unwrap(), PathBuf::from("/a/x.png"));
        assert_eq!(asset_target(dir, r"C:\tmp\y.png").unwrap(), PathBuf::from("/a/y.png"));
        assert!(asset_target(dir, "..").is_err());
    }

    #[tokio::test]
    async fn test_write_assets_keeps_request_order_and_continues_past_failures() {
        let dir = tempdir().unwrap();
        let doc = dir.path().join("a.md");
        let assets = dir.path().join("assets");
        std::fs::create_dir_all(&assets).unwrap();

        let files = vec![
            UploadFile {
                name: "one.png".to_string(),
                base64: "aGk=".to_string(),
            },
            UploadFile {
                name: "bad.png".to_string(),
                base64: "%%%".to_string(),
            },
            UploadFile {
                name: "two.png".to_string(),
                base64: "eW8=".to_string(),
            },
        ];

        let report = write_assets(&doc, &assets, &files).await;
        assert_eq!(report.links, vec!["assets/one.png", "assets/two.png"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name, "bad.png");
        assert_eq!(std::fs::read(assets.join("one.png")).unwrap(), b"hi");
        assert_eq!(std::fs::read(assets.join("two.png")).unwrap(), b"yo");
    }

    #[tokio::test]
    async fn test_write_assets_into_missing_dir_reports_each_file() {
        let dir = tempdir().unwrap();
        let doc = dir.path().join("a.md");
        let files = vec![UploadFile {
            name: "x.png".to_string(),
            base64: "aGk=".to_string(),
        }];

        let report = write_assets(&doc, &dir.path().join("nope"), &files).await;
        assert!(report.links.is_empty());
        assert!(matches!(report.failures[0].error, BridgeError::Write { .. }));
    }
}
