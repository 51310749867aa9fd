//! Markbridge - keeps a markdown file in sync with a WYSIWYG editor surface.
//!
//! The surface talks newline-delimited JSON over stdin/stdout.
//!
//! # Usage
//!
//! ```bash
//! markbridge README.md
//! markbridge --asset-folder '${projectRoot}/img' README.md
//! markbridge --shell file:///opt/editor README.md > shell.html
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use markbridge::config::{
    EditorConfig, ThemeMode, clear_config, global_config_path, global_state_path, load_config,
    local_override_path, parse_flag_tokens, save_config,
};
use markbridge::document::DocumentRegistry;
use markbridge::host::SystemHost;
use markbridge::prefs::FileStore;
use markbridge::protocol::{SurfaceCommand, SurfaceMessage};
use markbridge::session::{SessionContext, SessionEvent, SyncSession};
use markbridge::shell::render_shell;
use markbridge::watcher::{FileWatcher, follow_disk};

/// Keeps a markdown file in sync with a WYSIWYG editor surface
#[derive(Parser, Debug)]
#[command(name = "markbridge", version, about, long_about = None)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Markdown file to edit
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Let the editor inherit the host theme colors
    #[arg(long)]
    use_theme_colors: bool,

    /// Folder template for pasted images
    #[arg(long, value_name = "TEMPLATE")]
    asset_folder: Option<String>,

    /// CSS injected into the editor shell
    #[arg(long, value_name = "CSS")]
    custom_css: Option<String>,

    /// Theme reported to the editor (light or dark)
    #[arg(long, value_enum, default_value = "auto")]
    theme: ThemeMode,

    /// Project root used for ${projectRoot}
    #[arg(long, value_name = "DIR")]
    workspace: Option<PathBuf>,

    /// Print the editor HTML shell, loading bundles from MEDIA_ROOT, and exit
    #[arg(long, value_name = "MEDIA_ROOT")]
    shell: Option<String>,

    /// Do not reload the document when it changes on disk
    #[arg(long)]
    no_watch: bool,

    /// Save current command-line flags as defaults
    #[arg(long)]
    save: bool,

    /// Clear saved defaults
    #[arg(long)]
    clear: bool,
}

async fn read_commands(events: UnboundedSender<SessionEvent>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match SurfaceCommand::from_json(line) {
            Ok(command) => {
                if events.send(SessionEvent::Command(command)).is_err() {
                    break;
                }
            }
            Err(err) => tracing::warn!(%err, "dropping malformed surface message"),
        }
    }
    let _ = events.send(SessionEvent::Dispose);
    Ok(())
}

async fn write_messages(mut outbound: UnboundedReceiver<SurfaceMessage>) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    while let Some(message) = outbound.recv().await {
        let mut line = message.to_json().context("encode surface message")?;
        line.push('\n');
        stdout.write_all(line.as_bytes()).await.context("write stdout")?;
        stdout.flush().await.context("flush stdout")?;
    }
    Ok(())
}

fn effective_config(cli: &Cli, raw_args: &[String]) -> Result<EditorConfig> {
    let global_path = global_config_path();
    let local_path = local_override_path();
    let cli_config = parse_flag_tokens(raw_args);

    if cli.clear {
        clear_config(&global_path)?;
    }
    if cli.save {
        save_config(&global_path, &cli_config)?;
    }

    let file_config = if cli.clear {
        EditorConfig::default()
    } else {
        load_config(&global_path)?.union(&load_config(&local_path)?)
    };
    let mut effective = file_config.union(&cli_config);

    let workspace = match effective.workspace.take() {
        Some(dir) => std::path::absolute(&dir)
            .with_context(|| format!("Invalid workspace {}", dir.display()))?,
        None => std::env::current_dir().context("current dir")?,
    };
    effective.workspace = Some(workspace);
    Ok(effective)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // stdout carries the protocol, so logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let raw_args = std::env::args().collect::<Vec<_>>();
    let cli = Cli::parse();
    let config = effective_config(&cli, &raw_args)?;

    if !cli.file.exists() {
        anyhow::bail!("File not found: {}", cli.file.display());
    }

    if let Some(media_root) = &cli.shell {
        let file = std::path::absolute(&cli.file).context("resolve file path")?;
        print!("{}", render_shell(media_root, &file, config.custom_css()));
        return Ok(());
    }

    let registry = DocumentRegistry::new();
    let document = registry
        .open(&cli.file)
        .await
        .with_context(|| format!("Failed to open {}", cli.file.display()))?;

    let store = FileStore::open(global_state_path()).context("Failed to open preference store")?;
    let host = Arc::new(SystemHost::new(&config));
    let ctx = SessionContext::new(config, Arc::new(store), host);

    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let session = SyncSession::open(Arc::clone(&document), ctx, outbound_tx);
    // The stdio surface is the only view, so it always has focus.
    let _ = events_tx.send(SessionEvent::Focus(true));

    if !cli.no_watch {
        match FileWatcher::new(document.path(), Duration::from_millis(200)) {
            Ok(watcher) => {
                tokio::spawn(follow_disk(
                    Arc::clone(&document),
                    watcher,
                    Duration::from_millis(250),
                ));
            }
            Err(err) => tracing::warn!(%err, "watch unavailable"),
        }
    }

    let writer = tokio::spawn(write_messages(outbound_rx));
    tokio::spawn(async move {
        if let Err(err) = read_commands(events_tx).await {
            tracing::warn!(%err, "surface input closed");
        }
    });

    session.run(events_rx).await;
    registry.close(document.path());

    writer.await.context("writer task")?
}
