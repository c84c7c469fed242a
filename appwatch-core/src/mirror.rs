//! Client-side mirror of the remote application list.
//!
//! Applies the decoded change stream in order and keeps, per application,
//! how long it has held the focus since the mirror was created. Time is
//! passed in explicitly so the accounting is deterministic under test;
//! [`AppMirror::apply`] uses the wall clock.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};

use crate::model::{ChangeEvent, Pid};

/// One mirrored application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MirroredApp {
    pub pid: Pid,
    pub name: String,
    /// Icon bytes as received; `None` when the server sent no icon.
    #[serde(skip)]
    pub icon: Option<Vec<u8>>,
    pub has_focus: bool,
    /// Focus time accumulated up to the last focus change.
    #[serde(skip)]
    focused: Duration,
}

impl MirroredApp {
    /// Total time this application has held the focus as of `now`.
    pub fn focused_for(&self, since: Option<Instant>, now: Instant) -> Duration {
        match since {
            Some(start) if self.has_focus => self.focused + now.saturating_duration_since(start),
            _ => self.focused,
        }
    }
}

/// Row of [`AppMirror::summary`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FocusShare {
    pub pid: Pid,
    pub name: String,
    pub has_focus: bool,
    pub focused_ms: u64,
    /// Share of the mirror's lifetime this app was focused, 0..=100.
    pub percentage: u8,
}

/// Local copy of the remote application list.
#[derive(Debug, Clone)]
pub struct AppMirror {
    apps: BTreeMap<Pid, MirroredApp>,
    focus: Pid,
    focus_since: Option<Instant>,
    started: Instant,
    last_seen: Instant,
}

impl AppMirror {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(started: Instant) -> Self {
        Self {
            apps: BTreeMap::new(),
            focus: 0,
            focus_since: None,
            started,
            last_seen: started,
        }
    }

    pub fn apply(&mut self, event: ChangeEvent) {
        self.apply_at(event, Instant::now());
    }

    /// Apply one event observed at `now`.
    pub fn apply_at(&mut self, event: ChangeEvent, now: Instant) {
        self.last_seen = now;
        match event {
            ChangeEvent::Add { pid, record, icon } => {
                let has_focus = pid != 0 && pid == self.focus;
                let previous = self.apps.insert(
                    pid,
                    MirroredApp {
                        pid,
                        name: record.name,
                        icon,
                        has_focus,
                        focused: Duration::ZERO,
                    },
                );
                if previous.is_some() {
                    debug!(pid, "add replaced a mirrored application");
                }
                if has_focus {
                    self.focus_since = Some(now);
                }
            }
            ChangeEvent::Remove { pid } => {
                if self.apps.remove(&pid).is_none() {
                    warn!(pid, "remove for an unknown application");
                }
                // A pid the OS hands out again must not inherit the old focus.
                if pid != 0 && pid == self.focus {
                    self.focus = 0;
                    self.focus_since = None;
                }
            }
            ChangeEvent::FocusChanged { pid } => self.move_focus(pid, now),
            ChangeEvent::Heartbeat => {}
        }
    }

    fn move_focus(&mut self, pid: Pid, now: Instant) {
        if let (Some(start), Some(app)) = (self.focus_since, self.apps.get_mut(&self.focus)) {
            app.focused += now.saturating_duration_since(start);
            app.has_focus = false;
        }

        self.focus = pid;
        self.focus_since = None;
        if let Some(app) = self.apps.get_mut(&pid) {
            app.has_focus = true;
            self.focus_since = Some(now);
        }
    }

    pub fn get(&self, pid: Pid) -> Option<&MirroredApp> {
        self.apps.get(&pid)
    }

    pub fn apps(&self) -> impl Iterator<Item = &MirroredApp> {
        self.apps.values()
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    /// Pid currently focused, 0 for none.
    pub fn focus(&self) -> Pid {
        self.focus
    }

    /// When the last event (heartbeats included) arrived.
    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    /// Total focus time of `pid` as of `now`.
    pub fn focused_for(&self, pid: Pid, now: Instant) -> Option<Duration> {
        let since = if pid == self.focus { self.focus_since } else { None };
        self.apps.get(&pid).map(|app| app.focused_for(since, now))
    }

    /// Focus share of every mirrored application as of `now`, in pid order.
    pub fn summary(&self, now: Instant) -> Vec<FocusShare> {
        let total = now.saturating_duration_since(self.started);
        self.apps
            .values()
            .map(|app| {
                let since = if app.pid == self.focus { self.focus_since } else { None };
                let focused = app.focused_for(since, now);
                FocusShare {
                    pid: app.pid,
                    name: app.name.clone(),
                    has_focus: app.has_focus,
                    focused_ms: focused.as_millis() as u64,
                    percentage: percentage(focused, total),
                }
            })
            .collect()
    }
}

impl Default for AppMirror {
    fn default() -> Self {
        Self::new()
    }
}

fn percentage(part: Duration, total: Duration) -> u8 {
    if total.is_zero() {
        return 0;
    }
    let pct = part.as_secs_f64() / total.as_secs_f64() * 100.0;
    pct.round().clamp(0.0, 100.0) as u8
}
