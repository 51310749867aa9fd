//! The HTML document the editor surface is loaded into.

use std::path::Path;

use crate::paths;

/// Bundle paths, relative to the media root.
const SCRIPT_BUNDLE: &str = "media/dist/main.js";
const STYLE_BUNDLE: &str = "media/dist/main.css";

/// Render the shell for the document at `document`.
///
/// `media_root` is the URI the bundles are served from. The `<base>` points
/// at the document's folder so relative images resolve inside the sandbox.
/// `custom_css` is injected as-is.
pub fn render_shell(media_root: &str, document: &Path, custom_css: &str) -> String {
    let media_root = media_root.trim_end_matches('/');
    let mut base_href = paths::file_uri(&paths::parent_dir(document));
    if !base_href.ends_with('/') {
        base_href.push('/');
    }
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <base href="{base_href}" />
    <link href="{media_root}/{STYLE_BUNDLE}" rel="stylesheet">
    <title>markdown editor</title>
    <style>{custom_css}</style>
</head>
<body>
    <div id="app"></div>
    <script src="{media_root}/{SCRIPT_BUNDLE}"></script>
</body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_href_is_document_folder() {
        let html = render_shell("file:///ext", Path::new("/proj/docs/a.md"), "");
        assert!(html.contains(r#"<base href="file:///proj/docs/" />"#), "{html}");
    }

    #[test]
    fn test_references_exactly_one_script_and_style() {
        let html = render_shell("file:///ext/", Path::new("/proj/a.md"), "");
        assert_eq!(html.matches("<script ").count(), 1);
        assert_eq!(html.matches("rel=\"stylesheet\"").count(), 1);
        assert!(html.contains(r#"src="file:///ext/media/dist/main.js""#));
        assert!(html.contains(r#"href="file:///ext/media/dist/main.css""#));
    }

    #[test]
    fn test_custom_css_is_not_escaped() {
        let css = "body > p { content: \"<&>\"; }";
        let html = render_shell("file:///ext", Path::new("/a.md"), css);
        assert!(html.contains(&format!("<style>{css}</style>")));
    }

    #[test]
    fn test_root_document_base() {
        let html = render_shell("file:///ext", Path::new("/a.md"), "");
        assert!(html.contains(r#"<base href="file:///" />"#), "{html}");
    }
}
