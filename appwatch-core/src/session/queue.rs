//! FIFO of change events awaiting transmission.

use std::collections::VecDeque;

use crate::model::ChangeEvent;

/// Ordered events for the current session.
///
/// Emptied as a whole: either handed to the sender by [`take`](Self::take)
/// or discarded by [`clear`](Self::clear) when the connection dies.
#[derive(Debug, Default)]
pub struct ChangeQueue {
    events: VecDeque<ChangeEvent>,
}

impl ChangeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = ChangeEvent>) {
        self.events.extend(events);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Remove and return every queued event, oldest first.
    pub fn take(&mut self) -> VecDeque<ChangeEvent> {
        std::mem::take(&mut self.events)
    }

    /// Drop every queued event unsent.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}
