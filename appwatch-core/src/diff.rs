//! Snapshot diffing.
//!
//! Compares the previous and current [`Snapshot`] plus the focused pid
//! and emits the ordered list of [`ChangeEvent`]s a client must apply to
//! keep its mirror consistent:
//!
//! ```text
//! Add* (new pids)  →  Remove* (vanished pids)  →  FocusChanged?
//! ```
//!
//! Adds come first so the client learns about a pid before being told it
//! is focused. Removes are emitted in ascending pid order, but clients
//! must treat them as commutative.

use tracing::trace;

use crate::model::{ChangeEvent, Pid, Snapshot};

/// Compute the changes between two snapshots.
///
/// Pure computation: it cannot fail and does not depend on the order in
/// which either snapshot was enumerated.
pub fn diff(
    previous: &Snapshot,
    current: &Snapshot,
    previous_focus: Pid,
    current_focus: Pid,
) -> Vec<ChangeEvent> {
    let mut events = Vec::new();

    // Pids present in both are unchanged.
    for record in current.records() {
        if !previous.contains(record.pid) {
            events.push(ChangeEvent::add(record.clone()));
        }
    }

    for pid in previous.pids() {
        if !current.contains(pid) {
            events.push(ChangeEvent::Remove { pid });
        }
    }

    if current_focus != previous_focus {
        events.push(ChangeEvent::FocusChanged { pid: current_focus });
    }

    events
}

// ── ChangeDetector ───────────────────────────────────────────────

/// Stateful detector that remembers the previous snapshot and focus.
///
/// A fresh detector starts from an empty snapshot with no focus, so the
/// first call reports every running application as added.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    previous: Snapshot,
    previous_focus: Pid,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diff `current` against the stored state, then make it the new
    /// baseline.
    pub fn detect(&mut self, current: Snapshot, current_focus: Pid) -> Vec<ChangeEvent> {
        let events = diff(&self.previous, &current, self.previous_focus, current_focus);
        trace!(
            previous = self.previous.len(),
            current = current.len(),
            events = events.len(),
            "snapshot diffed"
        );
        self.previous = current;
        self.previous_focus = current_focus;
        events
    }

    pub fn previous(&self) -> &Snapshot {
        &self.previous
    }

    pub fn previous_focus(&self) -> Pid {
        self.previous_focus
    }
}

// ── Tests ────────────────────────────────────────────────────────
