//! Sync sessions: one document paired with one editor surface.
//!
//! A session relays the document to its surface and the surface's edits back
//! to the document:
//! - host changes made by anyone else are pushed as `update` messages
//! - surface edits are applied only while the surface has input focus, so a
//!   view that is merely receiving a push cannot echo it back
//! - auxiliary commands (uploads, links, preferences, notifications) are
//!   serviced in place
//!
//! Every failure becomes a user notification; the session itself keeps going.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Map, Value};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::assets::{self, TemplateContext, UploadFile};
use crate::config::EditorConfig;
use crate::document::{Document, DocumentChange, EditOrigin, Subscription};
use crate::host::{Host, NOTIFY_PREFIX, NotifyLevel};
use crate::links::resolve_link;
use crate::prefs::{OPTIONS_KEY, PreferenceStore};
use crate::protocol::{SurfaceCommand, SurfaceMessage};

pub type SessionId = u64;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the surface to report `ready`.
    Uninitialized,
    Active,
    /// Terminal. The change subscription has been released.
    Closed,
}

/// Events the host delivers to a running session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A message from the surface.
    Command(SurfaceCommand),
    /// The surface gained or lost input focus.
    Focus(bool),
    /// The view was closed.
    Dispose,
}

/// Services shared by every session in the process.
#[derive(Clone)]
pub struct SessionContext {
    pub config: EditorConfig,
    pub store: Arc<dyn PreferenceStore>,
    pub host: Arc<dyn Host>,
}

impl SessionContext {
    pub fn new(config: EditorConfig, store: Arc<dyn PreferenceStore>, host: Arc<dyn Host>) -> Self {
        store.set_keys_for_sync(&[OPTIONS_KEY]);
        Self {
            config,
            store,
            host,
        }
    }

    /// Static defaults with the persisted options layered on top.
    pub fn merged_options(&self) -> Value {
        let mut merged: Map<String, Value> = self.config.surface_defaults();
        match self.store.get(OPTIONS_KEY) {
            Some(Value::Object(saved)) => merged.extend(saved),
            Some(Value::Null) | None => {}
            Some(other) => {
                tracing::warn!(value = %other, "ignoring non-object editor options");
            }
        }
        Value::Object(merged)
    }
}

pub struct SyncSession {
    id: SessionId,
    state: SessionState,
    focused: bool,
    document: Arc<Document>,
    subscription: Option<Subscription>,
    /// Highest document version the surface is known to show.
    synced_version: u64,
    ctx: SessionContext,
    outbound: UnboundedSender<SurfaceMessage>,
    title: String,
}

impl SyncSession {
    /// Start a session for `document`, sending surface messages to `outbound`.
    ///
    /// The session subscribes to document changes immediately.
    pub fn open(
        document: Arc<Document>,
        ctx: SessionContext,
        outbound: UnboundedSender<SurfaceMessage>,
    ) -> Self {
        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        let subscription = document.subscribe();
        let title = document.file_name();
        ctx.host.set_title(&title);
        tracing::debug!(session = id, path = %document.path().display(), "session opened");
        Self {
            id,
            state: SessionState::Uninitialized,
            focused: false,
            document,
            subscription: Some(subscription),
            synced_version: 0,
            ctx,
            outbound,
            title,
        }
    }

    pub const fn id(&self) -> SessionId {
        self.id
    }

    pub const fn state(&self) -> SessionState {
        self.state
    }

    pub const fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn document(&self) -> &Arc<Document> {
        &self.document
    }

    /// The current view title: the file name, marked while unsaved.
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_focus(&mut self, focused: bool) {
        if self.state != SessionState::Closed {
            self.focused = focused;
        }
    }

    /// Drive the session until the view is disposed, the document closes or
    /// the surface goes away.
    pub async fn run(mut self, mut events: UnboundedReceiver<SessionEvent>) {
        enum Next {
            Event(Option<SessionEvent>),
            Change(Option<DocumentChange>),
        }

        while self.state != SessionState::Closed {
            let Some(subscription) = self.subscription.as_mut() else {
                break;
            };
            let next = tokio::select! {
                biased;
                event = events.recv() => Next::Event(event),
                change = subscription.recv() => Next::Change(change),
            };
            match next {
                Next::Event(Some(SessionEvent::Command(command))) => {
                    self.handle_command(command).await;
                }
                Next::Event(Some(SessionEvent::Focus(focused))) => self.set_focus(focused),
                Next::Event(Some(SessionEvent::Dispose) | None) => self.close(),
                Next::Change(Some(change)) => self.handle_change(change).await,
                Next::Change(None) => {
                    tracing::debug!(session = self.id, "document closed");
                    self.close();
                }
            }
        }
    }

    /// Process one surface command to completion.
    pub async fn handle_command(&mut self, command: SurfaceCommand) {
        if self.state == SessionState::Closed {
            tracing::debug!(session = self.id, command = command.name(), "ignored after close");
            return;
        }
        tracing::debug!(session = self.id, command = command.name(), "surface command");
        match command {
            SurfaceCommand::Ready => self.init().await,
            SurfaceCommand::Edit { content } => self.edit(&content).await,
            SurfaceCommand::Save { content } => self.save(&content).await,
            SurfaceCommand::SaveOptions { options } => self.store_options(options),
            SurfaceCommand::ResetConfig => self.store_options(Value::Object(Map::new())),
            SurfaceCommand::Info { content } => {
                self.ctx.host.notify(NotifyLevel::Info, &content);
            }
            SurfaceCommand::Error { content } => self.notify_error(&content),
            SurfaceCommand::Upload { files } => self.upload(&files).await,
            SurfaceCommand::OpenLink { href } => self.open_link(&href).await,
        }
    }

    /// Relay a committed document change to the surface.
    pub async fn handle_change(&mut self, change: DocumentChange) {
        if self.state != SessionState::Active || change.version <= self.synced_version {
            return;
        }
        self.synced_version = change.version;
        if change.origin == EditOrigin::Session(self.id) {
            // Our own edit: the surface already shows it.
            self.refresh_title().await;
            return;
        }
        tracing::debug!(session = self.id, version = change.version, "pushing update");
        self.send(SurfaceMessage::update(change.content));
        self.refresh_title().await;
    }

    /// Release the subscription and stop. Idempotent.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closed;
        self.focused = false;
        self.subscription = None;
        tracing::debug!(session = self.id, "session closed");
    }

    async fn init(&mut self) {
        let options = self.ctx.merged_options();
        let theme = self.ctx.host.theme();
        let (version, content) = self.document.snapshot().await;
        // Changes up to `version` are already in the init payload.
        self.synced_version = version;
        self.state = SessionState::Active;
        self.send(SurfaceMessage::init(content, options, theme));
    }

    async fn edit(&mut self, content: &str) {
        if self.state != SessionState::Active {
            tracing::debug!(session = self.id, "edit before ready ignored");
            return;
        }
        if !self.focused {
            tracing::debug!(session = self.id, "edit from unfocused surface ignored");
            return;
        }
        self.apply(content).await;
    }

    async fn save(&mut self, content: &str) {
        if self.state != SessionState::Active {
            tracing::debug!(session = self.id, "save before ready ignored");
            return;
        }
        if !self.apply(content).await {
            return;
        }
        if let Err(err) = self.document.save().await {
            self.notify_error(&format!("Save failed: {err}"));
        }
        self.refresh_title().await;
    }

    /// Replace the whole document with `content`. Returns false on failure.
    async fn apply(&mut self, content: &str) -> bool {
        match self
            .document
            .replace_all(EditOrigin::Session(self.id), content)
            .await
        {
            Ok(_) => true,
            Err(err) => {
                self.notify_error(&format!("Cannot sync to document: {err}"));
                false
            }
        }
    }

    fn store_options(&self, options: Value) {
        if let Err(err) = self.ctx.store.set(OPTIONS_KEY, options) {
            self.notify_error(&format!("Failed to save editor options: {err}"));
        }
    }

    async fn upload(&mut self, files: &[UploadFile]) {
        let file = self.document.path().to_path_buf();
        let root = self.ctx.host.workspace_root(&file);
        let ctx = TemplateContext {
            file: &file,
            project_root: root.as_deref(),
        };
        let dir = assets::resolve_asset_dir(self.ctx.config.asset_folder(), &ctx);

        if let Err(err) = tokio::fs::create_dir_all(&dir).await {
            tracing::warn!(session = self.id, dir = %dir.display(), %err, "asset folder creation failed");
            self.notify_error(&format!("Invalid image folder: {}", dir.display()));
        }

        let report = assets::write_assets(&file, &dir, files).await;
        if !report.failures.is_empty() {
            let detail = report
                .failures
                .iter()
                .map(|f| format!("{}: {}", f.name, f.error))
                .collect::<Vec<_>>()
                .join("; ");
            self.notify_error(&format!(
                "Failed to save {} of {} file(s): {detail}",
                report.failures.len(),
                files.len()
            ));
        }
        tracing::info!(
            session = self.id,
            dir = %dir.display(),
            stored = report.links.len(),
            "assets uploaded"
        );
        self.send(SurfaceMessage::Uploaded {
            files: report.links,
        });
    }

    async fn open_link(&self, href: &str) {
        let target = resolve_link(self.document.path(), href);
        tracing::debug!(session = self.id, %target, "opening link");
        if let Err(err) = self.ctx.host.open_uri(&target.as_uri()).await {
            self.notify_error(&format!("Open failed: {target}: {err}"));
        }
    }

    async fn refresh_title(&mut self) {
        let name = self.document.file_name();
        let title = if self.document.is_dirty().await {
            format!("[edit]{name}")
        } else {
            name
        };
        if title != self.title {
            self.ctx.host.set_title(&title);
            self.title = title;
        }
    }

    fn notify_error(&self, message: &str) {
        self.ctx
            .host
            .notify(NotifyLevel::Error, &format!("{NOTIFY_PREFIX}{message}"));
    }

    fn send(&mut self, message: SurfaceMessage) {
        if self.outbound.send(message).is_err() {
            tracing::debug!(session = self.id, "surface channel closed");
            self.close();
        }
    }
}

impl std::fmt::Debug for SyncSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSession")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("focused", &self.focused)
            .field("path", &self.document.path())
            .finish_non_exhaustive()
    }
}
