//! Routing of the one-shot key command across watched servers.
//!
//! Without a target every server gets the command as soon as it is
//! connected. With a target, a server gets it once the application it
//! reports as focused has exactly that name.

use std::collections::BTreeSet;

use appwatch_core::{AppMirror, CommandFrame};

/// A key command waiting to be delivered to the servers it is meant for.
#[derive(Debug, Clone)]
pub struct KeyDispatch {
    frame: CommandFrame,
    target: Option<String>,
    sent: BTreeSet<usize>,
}

impl KeyDispatch {
    pub fn new(frame: CommandFrame, target: Option<String>) -> Self {
        Self {
            frame,
            target,
            sent: BTreeSet::new(),
        }
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// The frame to send to `server` now, given what its mirror shows.
    /// Each server is handed the frame at most once.
    pub fn take(&mut self, server: usize, mirror: &AppMirror) -> Option<CommandFrame> {
        if self.sent.contains(&server) {
            return None;
        }
        if let Some(target) = &self.target {
            let focused = mirror.get(mirror.focus())?;
            if focused.name != *target {
                return None;
            }
        }
        self.sent.insert(server);
        Some(self.frame)
    }

    /// Number of servers the frame has been handed to.
    pub fn delivered(&self) -> usize {
        self.sent.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use appwatch_core::{ApplicationRecord, ChangeEvent, Modifiers};

    fn frame() -> CommandFrame {
        CommandFrame::new(Modifiers::CTRL, 0x53)
    }

    fn mirror_focused_on(name: &str) -> AppMirror {
        let mut mirror = AppMirror::new();
        mirror.apply(ChangeEvent::Add {
            pid: 4,
            record: ApplicationRecord::new(4, name, ""),
            icon: None,
        });
        mirror.apply(ChangeEvent::FocusChanged { pid: 4 });
        mirror
    }

    #[test]
    fn untargeted_goes_to_every_server_once() {
        let mut dispatch = KeyDispatch::new(frame(), None);
        let empty = AppMirror::new();
        assert_eq!(dispatch.take(0, &empty), Some(frame()));
        assert_eq!(dispatch.take(1, &empty), Some(frame()));
        assert_eq!(dispatch.take(0, &empty), None);
        assert_eq!(dispatch.delivered(), 2);
    }

    #[test]
    fn targeted_waits_for_matching_focus() {
        let mut dispatch = KeyDispatch::new(frame(), Some("notepad.exe".into()));

        assert_eq!(dispatch.take(0, &AppMirror::new()), None);
        assert_eq!(dispatch.take(0, &mirror_focused_on("calc.exe")), None);
        assert_eq!(dispatch.take(1, &mirror_focused_on("Notepad.exe")), None);

        let matching = mirror_focused_on("notepad.exe");
        assert_eq!(dispatch.take(0, &matching), Some(frame()));
        assert_eq!(dispatch.take(0, &matching), None);
        assert_eq!(dispatch.take(1, &matching), Some(frame()));
        assert_eq!(dispatch.delivered(), 2);
    }

    #[test]
    fn focus_lost_before_arrival_does_not_match() {
        let mut dispatch = KeyDispatch::new(frame(), Some("notepad.exe".into()));
        let mut mirror = mirror_focused_on("notepad.exe");
        mirror.apply(ChangeEvent::FocusChanged { pid: 0 });
        assert_eq!(dispatch.take(0, &mirror), None);
    }
}
