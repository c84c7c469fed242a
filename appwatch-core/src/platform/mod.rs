//! Collaborators the session and command loops depend on.
//!
//! The loops only see these traits. [`WindowEnumerator`],
//! [`ResourceIconExtractor`] and [`InputInjector`] are the Win32-backed
//! implementations; on other platforms they exist but report
//! [`AppWatchError::Unsupported`] (or no icon).

use std::path::Path;
use std::sync::Arc;

use crate::command::{KeyAction, KeyStroke};
use crate::error::AppWatchError;
use crate::model::{Pid, Snapshot};

pub mod icon;
pub mod input;
pub mod process;

pub use icon::ResourceIconExtractor;
pub use input::InputInjector;
pub use process::WindowEnumerator;

/// Source of application snapshots and the current foreground pid.
pub trait ProcessSource: Send + Sync {
    /// Capture every visible, windowed application right now.
    fn snapshot(&self) -> Result<Snapshot, AppWatchError>;

    /// Pid owning the foreground window, or 0 when there is none.
    fn foreground_pid(&self) -> Pid;
}

/// Best-effort icon lookup for an executable.
pub trait IconExtractor: Send + Sync {
    /// Raw icon image bytes, or `None` if no icon could be obtained.
    fn extract_icon(&self, exec_path: &Path) -> Option<Vec<u8>>;
}

/// Sink for synthesized keyboard events.
pub trait KeyInjector: Send + Sync {
    fn inject_key(&self, key_code: u32, action: KeyAction) -> Result<(), AppWatchError>;

    /// Inject a whole sequence, in order.
    fn inject_sequence(&self, strokes: &[KeyStroke]) -> Result<(), AppWatchError> {
        for stroke in strokes {
            self.inject_key(stroke.key_code, stroke.action)?;
        }
        Ok(())
    }
}

/// The collaborators one connection is served with.
#[derive(Clone)]
pub struct Desktop {
    pub source: Arc<dyn ProcessSource>,
    pub icons: Arc<dyn IconExtractor>,
    pub injector: Arc<dyn KeyInjector>,
}

impl Desktop {
    /// The OS-backed collaborators for this platform.
    pub fn native() -> Self {
        Self {
            source: Arc::new(WindowEnumerator::new()),
            icons: Arc::new(ResourceIconExtractor::new()),
            injector: Arc::new(InputInjector::new()),
        }
    }
}

/// An extractor that never finds an icon.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIcons;

impl IconExtractor for NoIcons {
    fn extract_icon(&self, _exec_path: &Path) -> Option<Vec<u8>> {
        None
    }
}
