//! # appwatch-core
//!
//! Core library for the appwatch application monitor.
//!
//! This crate contains:
//! - **Model**: `ApplicationRecord`, `Snapshot`, `ChangeEvent`
//! - **Diff engine**: `diff` and the stateful `ChangeDetector`
//! - **Codec**: `ChangeCodec` for the change stream, `CommandCodec` for key commands
//! - **Session**: the per-connection change loop and command loop, sharing a `Liveness` flag
//! - **Platform**: collaborator traits plus the Win32-backed implementations
//! - **Mirror**: `AppMirror`, the client-side copy of the remote application list
//! - **Error**: `AppWatchError`, a `thiserror`-based error enum

pub mod codec;
pub mod command;
pub mod diff;
pub mod error;
pub mod liveness;
pub mod mirror;
pub mod model;
pub mod platform;
pub mod session;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use codec::{ChangeCodec, MAX_ICON_SIZE, MAX_NAME_SIZE, encode_chunks};
pub use command::{CommandCodec, CommandFrame, KeyAction, KeyStroke, Modifiers};
pub use diff::{ChangeDetector, diff};
pub use error::AppWatchError;
pub use liveness::Liveness;
pub use mirror::{AppMirror, FocusShare, MirroredApp};
pub use model::{ApplicationRecord, ChangeEvent, ChangeKind, Pid, Snapshot};
pub use platform::{
    Desktop, IconExtractor, InputInjector, KeyInjector, NoIcons, ProcessSource,
    ResourceIconExtractor, WindowEnumerator,
};
pub use session::{
    HEARTBEAT_IDLE_CYCLES, RefreshInterval, Session, SessionState, run_command_loop,
    serve_connection,
};
