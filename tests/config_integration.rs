use std::path::PathBuf;

use markbridge::config::{EditorConfig, ThemeMode, load_config, parse_flag_tokens};

#[test]
fn test_config_file_parsing_ignores_comments_and_blank_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".markbridgerc");
    let content = r"
# comment
--use-theme-colors

--theme light

--asset-folder=${fileBasenameNoExtension}-assets
";
    std::fs::write(&path, content).unwrap();

    let config = load_config(&path).unwrap();
    assert!(config.use_theme_colors);
    assert_eq!(config.theme, Some(ThemeMode::Light));
    assert_eq!(
        config.asset_folder.as_deref(),
        Some("${fileBasenameNoExtension}-assets")
    );
}

#[test]
fn test_custom_css_keeps_spaces_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".markbridgerc");
    std::fs::write(&path, "--custom-css body { max-width: 60em }\n").unwrap();

    let config = load_config(&path).unwrap();
    assert_eq!(config.custom_css(), "body { max-width: 60em }");
}

#[test]
fn test_cli_flags_override_file_flags() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".markbridgerc");
    let content = "--use-theme-colors\n--theme light\n--asset-folder img\n";
    std::fs::write(&path, content).unwrap();

    let file_config = load_config(&path).unwrap();
    let cli_args = vec![
        "markbridge".to_string(),
        "--theme".to_string(),
        "dark".to_string(),
        "--workspace".to_string(),
        "/proj".to_string(),
    ];
    let cli_config = parse_flag_tokens(&cli_args);

    let effective = file_config.union(&cli_config);
    assert!(effective.use_theme_colors, "file flags should remain enabled");
    assert_eq!(effective.theme, Some(ThemeMode::Dark), "cli should override theme");
    assert_eq!(effective.workspace, Some(PathBuf::from("/proj")));
    assert_eq!(
        effective.asset_folder(),
        "img",
        "file config should be preserved when CLI does not override"
    );
}

#[test]
fn test_missing_config_file_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(&dir.path().join("absent")).unwrap();
    assert_eq!(config, EditorConfig::default());
}

#[test]
fn test_unknown_theme_is_dropped() {
    let args = vec!["markbridge".to_string(), "--theme=sepia".to_string()];
    assert_eq!(parse_flag_tokens(&args).theme, None);
}
