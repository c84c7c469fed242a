//! Change model: application records, snapshots and change events.
//!
//! A [`Snapshot`] is captured fresh on every poll and discarded once it
//! has been diffed. [`ChangeEvent`]s live only in the session's queue
//! until they are flushed or the connection ends.

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::AppWatchError;

/// OS process identifier. `0` means "no process".
pub type Pid = u32;

// ── ApplicationRecord ────────────────────────────────────────────

/// A visible, windowed application.
///
/// Identity is the pid. Pids are reused by the OS after a process exits;
/// a reused pid is treated as a brand-new application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    /// Owning process.
    pub pid: Pid,
    /// Display name: file name plus extension, e.g. `notepad.exe`.
    pub name: String,
    /// Full path of the process image.
    pub exec_path: PathBuf,
}

impl ApplicationRecord {
    pub fn new(pid: Pid, name: impl Into<String>, exec_path: impl Into<PathBuf>) -> Self {
        Self {
            pid,
            name: name.into(),
            exec_path: exec_path.into(),
        }
    }

    /// Build a record whose display name is derived from the image path.
    ///
    /// Returns `None` when the path has no file name component.
    pub fn from_exec_path(pid: Pid, exec_path: impl Into<PathBuf>) -> Option<Self> {
        let exec_path = exec_path.into();
        let name = exec_path.file_name()?.to_string_lossy().into_owned();
        Some(Self {
            pid,
            name,
            exec_path,
        })
    }
}

// ── Snapshot ─────────────────────────────────────────────────────

/// All visible, windowed applications at one instant, keyed by pid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    apps: BTreeMap<Pid, ApplicationRecord>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record. The first record seen for a pid wins, so several
    /// windows owned by one process collapse into one entry.
    pub fn insert(&mut self, record: ApplicationRecord) -> bool {
        match self.apps.entry(record.pid) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
            btree_map::Entry::Occupied(_) => false,
        }
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.apps.contains_key(&pid)
    }

    pub fn get(&self, pid: Pid) -> Option<&ApplicationRecord> {
        self.apps.get(&pid)
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    /// Records in ascending pid order.
    pub fn records(&self) -> impl Iterator<Item = &ApplicationRecord> {
        self.apps.values()
    }

    pub fn pids(&self) -> impl Iterator<Item = Pid> + '_ {
        self.apps.keys().copied()
    }
}

impl FromIterator<ApplicationRecord> for Snapshot {
    fn from_iter<I: IntoIterator<Item = ApplicationRecord>>(iter: I) -> Self {
        let mut snapshot = Snapshot::new();
        for record in iter {
            snapshot.insert(record);
        }
        snapshot
    }
}

// ── ChangeKind ───────────────────────────────────────────────────

/// Wire tag of a change event.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Add = 0,
    Remove = 1,
    FocusChanged = 2,
    Heartbeat = 3,
}

impl TryFrom<u16> for ChangeKind {
    type Error = AppWatchError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ChangeKind::Add),
            1 => Ok(ChangeKind::Remove),
            2 => Ok(ChangeKind::FocusChanged),
            3 => Ok(ChangeKind::Heartbeat),
            other => Err(AppWatchError::UnknownVariant {
                type_name: "ChangeKind",
                value: other as u64,
            }),
        }
    }
}

// ── ChangeEvent ──────────────────────────────────────────────────

/// One structural change to stream to the client.
///
/// Only `Add` carries a record and icon. `Heartbeat` has no meaningful
/// pid and is encoded with pid 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// A newly observed application. `icon` is best-effort; `None` makes
    /// the client fall back to its default icon.
    Add {
        pid: Pid,
        record: ApplicationRecord,
        icon: Option<Vec<u8>>,
    },
    /// The pid is no longer in the latest snapshot.
    Remove { pid: Pid },
    /// The foreground application changed to `pid` (0 = none).
    FocusChanged { pid: Pid },
    /// Keep-alive after sustained inactivity.
    Heartbeat,
}

impl ChangeEvent {
    /// An `Add` without icon bytes; icons are resolved at flush time.
    pub fn add(record: ApplicationRecord) -> Self {
        ChangeEvent::Add {
            pid: record.pid,
            record,
            icon: None,
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeEvent::Add { .. } => ChangeKind::Add,
            ChangeEvent::Remove { .. } => ChangeKind::Remove,
            ChangeEvent::FocusChanged { .. } => ChangeKind::FocusChanged,
            ChangeEvent::Heartbeat => ChangeKind::Heartbeat,
        }
    }

    /// The pid carried on the wire.
    pub fn pid(&self) -> Pid {
        match self {
            ChangeEvent::Add { pid, .. }
            | ChangeEvent::Remove { pid }
            | ChangeEvent::FocusChanged { pid } => *pid,
            ChangeEvent::Heartbeat => 0,
        }
    }
}
