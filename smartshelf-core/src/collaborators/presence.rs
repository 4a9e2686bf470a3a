//! Presence signal pushed by the vision pipeline

use std::sync::atomic::{AtomicBool, Ordering};

use super::PresenceSignal;

/// Latest presence value reported over HTTP
///
/// Starts as present, so a shelf without a vision pipeline never triggers
/// the departure watchdog.
#[derive(Debug)]
pub struct SharedPresence {
    present: AtomicBool,
}

impl SharedPresence {
    pub fn new(present: bool) -> Self {
        Self {
            present: AtomicBool::new(present),
        }
    }

    pub fn set(&self, present: bool) {
        self.present.store(present, Ordering::SeqCst);
    }
}

impl Default for SharedPresence {
    fn default() -> Self {
        Self::new(true)
    }
}

impl PresenceSignal for SharedPresence {
    fn is_person_present(&self) -> bool {
        self.present.load(Ordering::SeqCst)
    }
}
