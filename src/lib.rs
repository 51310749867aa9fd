// Only allow lints that are either transitive-dependency noise or
// genuinely opinionated style choices that don't indicate real issues.
#![allow(
    // Transitive dependency version mismatches we can't control
    clippy::multiple_crate_versions,
    // module_name_repetitions is pure style preference (e.g. document::DocumentBuffer)
    clippy::module_name_repetitions
)]

//! # Markbridge
//!
//! Keeps a markdown file in sync with an embedded WYSIWYG editor surface.
//!
//! The host side owns the text; the surface is a sandboxed editor that
//! speaks a small JSON protocol. Markbridge sits between them:
//! - Pushes the document to the surface on ready and on every outside change
//! - Applies surface edits back to the document while the surface has focus
//! - Stores pasted images next to the document and hands back relative links
//! - Persists the surface's editor options across sessions
//!
//! ## Architecture
//!
//! - **Document**: shared, rope-backed host buffer with ordered change fan-out
//! - **Session**: per-view state machine (uninitialized, active, closed)
//! - **Host**: notifications, titles, link opening, theme
//! - **Protocol**: tagged JSON messages in both directions
//!
//! ## Modules
//!
//! - [`session`]: Sync controller
//! - [`document`]: Host document adapter
//! - [`protocol`]: Surface message types
//! - [`assets`]: Upload folder templates and asset writes
//! - [`links`]: Link resolution
//! - [`prefs`]: Preference store
//! - [`shell`]: HTML shell for the surface
//! - [`host`]: Host environment seam
//! - [`watcher`]: File watching

pub mod assets;
pub mod config;
pub mod document;
pub mod error;
pub mod host;
pub mod links;
pub mod paths;
pub mod prefs;
pub mod protocol;
pub mod session;
pub mod shell;
pub mod watcher;
