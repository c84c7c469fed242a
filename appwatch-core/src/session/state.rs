//! Per-connection session state.

use std::time::Duration;

use crate::diff::ChangeDetector;
use crate::model::{ChangeEvent, Pid, Snapshot};

/// Consecutive idle cycles after which a heartbeat is queued.
pub const HEARTBEAT_IDLE_CYCLES: u32 = 10;

/// Refresh intervals must lie strictly between these bounds (ms).
pub const MIN_REFRESH_MS: u64 = 500;
pub const MAX_REFRESH_MS: u64 = 10_000;

/// Default delay between two poll cycles (ms).
pub const DEFAULT_REFRESH_MS: u64 = 1_000;

// ── RefreshInterval ──────────────────────────────────────────────

/// Delay between poll cycles, always within (500, 10000) ms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshInterval(u64);

impl RefreshInterval {
    /// `None` when `ms` is out of bounds.
    pub fn from_millis(ms: u64) -> Option<Self> {
        (ms > MIN_REFRESH_MS && ms < MAX_REFRESH_MS).then_some(Self(ms))
    }

    /// Apply `ms` if it is in bounds; otherwise keep the current value.
    ///
    /// Returns whether the value was accepted.
    pub fn set_millis(&mut self, ms: u64) -> bool {
        match Self::from_millis(ms) {
            Some(valid) => {
                *self = valid;
                true
            }
            None => false,
        }
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_millis(self.0)
    }
}

impl Default for RefreshInterval {
    fn default() -> Self {
        Self(DEFAULT_REFRESH_MS)
    }
}

// ── SessionState ─────────────────────────────────────────────────

/// State owned by the session loop for one connection: the previous
/// snapshot and focus, the refresh interval, and the idle counter that
/// schedules heartbeats.
#[derive(Debug, Default)]
pub struct SessionState {
    detector: ChangeDetector,
    refresh: RefreshInterval,
    idle_cycles: u32,
}

impl SessionState {
    pub fn new(refresh: RefreshInterval) -> Self {
        Self {
            detector: ChangeDetector::new(),
            refresh,
            idle_cycles: 0,
        }
    }

    /// Diff `current` against the previous cycle, apply the heartbeat
    /// policy and make `current` the new baseline.
    pub fn advance(&mut self, current: Snapshot, current_focus: Pid) -> Vec<ChangeEvent> {
        let mut events = self.detector.detect(current, current_focus);

        if events.is_empty() {
            self.idle_cycles += 1;
        } else {
            self.idle_cycles = 0;
        }

        if self.idle_cycles >= HEARTBEAT_IDLE_CYCLES {
            events.push(ChangeEvent::Heartbeat);
            self.idle_cycles = 0;
        }

        events
    }

    pub fn idle_cycles(&self) -> u32 {
        self.idle_cycles
    }

    pub fn previous(&self) -> &Snapshot {
        self.detector.previous()
    }

    pub fn previous_focus(&self) -> Pid {
        self.detector.previous_focus()
    }

    pub fn refresh_interval(&self) -> RefreshInterval {
        self.refresh
    }

    /// Out-of-range values are ignored. Returns whether `ms` was applied.
    pub fn set_refresh_interval(&mut self, ms: u64) -> bool {
        self.refresh.set_millis(ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ApplicationRecord;

    #[test]
    fn refresh_bounds_are_exclusive() {
        let mut refresh = RefreshInterval::default();
        assert!(!refresh.set_millis(500));
        assert!(!refresh.set_millis(10_000));
        assert_eq!(refresh.as_millis(), DEFAULT_REFRESH_MS);

        assert!(refresh.set_millis(501));
        assert_eq!(refresh.as_millis(), 501);
        assert!(refresh.set_millis(9_999));
        assert_eq!(refresh.as_duration(), Duration::from_millis(9_999));
    }

    #[test]
    fn rejected_value_keeps_previous() {
        let mut state = SessionState::new(RefreshInterval::from_millis(750).unwrap());
        assert!(!state.set_refresh_interval(0));
        assert_eq!(state.refresh_interval().as_millis(), 750);
    }

    #[test]
    fn heartbeat_after_ten_idle_cycles() {
        let mut state = SessionState::default();
        for cycle in 1..HEARTBEAT_IDLE_CYCLES {
            assert!(state.advance(Snapshot::new(), 0).is_empty());
            assert_eq!(state.idle_cycles(), cycle);
        }

        let events = state.advance(Snapshot::new(), 0);
        assert_eq!(events, vec![ChangeEvent::Heartbeat]);
        assert_eq!(state.idle_cycles(), 0);

        assert!(state.advance(Snapshot::new(), 0).is_empty());
        assert_eq!(state.idle_cycles(), 1);
    }

    #[test]
    fn activity_resets_idle_counter() {
        let mut state = SessionState::default();
        for _ in 0..5 {
            state.advance(Snapshot::new(), 0);
        }
        assert_eq!(state.idle_cycles(), 5);

        let snap: Snapshot = [ApplicationRecord::new(3, "a.exe", "a.exe")].into_iter().collect();
        assert_eq!(state.advance(snap.clone(), 0).len(), 1);
        assert_eq!(state.idle_cycles(), 0);
        assert_eq!(state.previous(), &snap);
    }
}
