use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{Map, Value};

/// Template used for the asset folder when none is configured.
pub const DEFAULT_ASSET_FOLDER: &str = "assets";

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeMode {
    Auto,
    Light,
    Dark,
}

/// Static, read-only editor configuration.
///
/// Loaded from flag files and the command line; never written by a session.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EditorConfig {
    /// Let the editor surface inherit the host's theme colors.
    pub use_theme_colors: bool,
    /// Asset folder template, see [`crate::assets::resolve_asset_dir`].
    pub asset_folder: Option<String>,
    /// Raw CSS injected into the rendered shell.
    pub custom_css: Option<String>,
    pub theme: Option<ThemeMode>,
    /// Project root used for `${projectRoot}`.
    pub workspace: Option<PathBuf>,
}

impl EditorConfig {
    pub fn union(&self, other: &Self) -> Self {
        Self {
            use_theme_colors: self.use_theme_colors || other.use_theme_colors,
            asset_folder: other
                .asset_folder
                .clone()
                .or_else(|| self.asset_folder.clone()),
            custom_css: other.custom_css.clone().or_else(|| self.custom_css.clone()),
            theme: other.theme.or(self.theme),
            workspace: other.workspace.clone().or_else(|| self.workspace.clone()),
        }
    }

    /// The asset folder template, falling back to [`DEFAULT_ASSET_FOLDER`] when unset or empty.
    pub fn asset_folder(&self) -> &str {
        self.asset_folder
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_ASSET_FOLDER)
    }

    pub fn custom_css(&self) -> &str {
        self.custom_css.as_deref().unwrap_or_default()
    }

    /// Static option defaults sent to the surface, before user preferences are layered on top.
    pub fn surface_defaults(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(
            "useThemeColors".to_string(),
            Value::Bool(self.use_theme_colors),
        );
        map
    }
}

pub fn global_config_path() -> PathBuf {
    config_dir().map_or_else(|| PathBuf::from(".markbridgerc"), |dir| dir.join("config"))
}

/// Where the preference store persists its state.
pub fn global_state_path() -> PathBuf {
    config_dir().map_or_else(|| PathBuf::from(".markbridge-state.json"), |dir| {
        dir.join("state.json")
    })
}

pub fn local_override_path() -> PathBuf {
    PathBuf::from(".markbridgerc")
}

fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return Some(PathBuf::from(appdata).join("markbridge"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("markbridge"),
            );
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return Some(PathBuf::from(xdg).join("markbridge"));
        }
        if let Some(home) = std::env::var_os("HOME") {
            return Some(PathBuf::from(home).join(".config").join("markbridge"));
        }
    }

    None
}

/// Load a flag file.
///
/// One flag per line. Valued flags take the rest of the line, so CSS with
/// spaces survives: `--custom-css body { max-width: 60em }`.
pub fn load_config(path: &Path) -> Result<EditorConfig> {
    if !path.exists() {
        return Ok(EditorConfig::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let tokens = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(|line| match line.split_once(char::is_whitespace) {
            Some((flag, value)) => vec![flag.to_string(), value.trim().to_string()],
            None => vec![line.to_string()],
        })
        .collect::<Vec<_>>();
    let mut config = parse_flag_tokens(&tokens);
    config.custom_css = config.custom_css.map(|css| unescape_line(&css));
    Ok(config)
}

pub fn save_config(path: &Path, config: &EditorConfig) -> Result<()> {
    let mut lines = Vec::new();
    lines.push("# markbridge defaults (saved with --save)".to_string());
    if config.use_theme_colors {
        lines.push("--use-theme-colors".to_string());
    }
    if let Some(folder) = &config.asset_folder {
        lines.push(format!("--asset-folder {folder}"));
    }
    if let Some(css) = &config.custom_css {
        lines.push(format!("--custom-css {}", escape_line(css)));
    }
    if let Some(theme) = config.theme {
        let theme_str = match theme {
            ThemeMode::Auto => "auto",
            ThemeMode::Light => "light",
            ThemeMode::Dark => "dark",
        };
        lines.push(format!("--theme {theme_str}"));
    }
    if let Some(workspace) = &config.workspace {
        lines.push(format!("--workspace {}", workspace.display()));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config dir {}", parent.display()))?;
    }
    fs::write(path, format!("{}\n", lines.join("\n")))
        .with_context(|| format!("Failed to write config {}", path.display()))
}

pub fn clear_config(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

pub fn parse_flag_tokens(tokens: &[String]) -> EditorConfig {
    let mut config = EditorConfig::default();
    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        if token == "--use-theme-colors" {
            config.use_theme_colors = true;
        } else if let Some(value) = valued_flag(tokens, &mut i, "--asset-folder") {
            config.asset_folder = Some(value);
        } else if let Some(value) = valued_flag(tokens, &mut i, "--custom-css") {
            config.custom_css = Some(value);
        } else if let Some(value) = valued_flag(tokens, &mut i, "--theme") {
            config.theme = parse_theme(&value);
        } else if let Some(value) = valued_flag(tokens, &mut i, "--workspace") {
            config.workspace = Some(PathBuf::from(value));
        }
        i += 1;
    }
    config
}

/// Match `--flag value` or `--flag=value` at `tokens[*i]`, advancing past a separate value.
fn valued_flag(tokens: &[String], i: &mut usize, flag: &str) -> Option<String> {
    let token = &tokens[*i];
    if token == flag {
        let next = tokens.get(*i + 1)?;
        *i += 1;
        return Some(next.clone());
    }
    token
        .strip_prefix(flag)
        .and_then(|rest| rest.strip_prefix('='))
        .map(ToOwned::to_owned)
}

/// Flag files are one flag per line, so newlines in a value are written as `\n`.
fn escape_line(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

fn unescape_line(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            // Hand-written CSS escapes such as `\201C` pass through.
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn parse_theme(s: &str) -> Option<ThemeMode> {
    match s {
        "auto" => Some(ThemeMode::Auto),
        "light" => Some(ThemeMode::Light),
        "dark" => Some(ThemeMode::Dark),
        _ => None,
    }
}
