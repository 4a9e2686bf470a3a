//! Loadcell link health heuristic
//!
//! The BLE transport does not reliably report disconnects, so link status is
//! inferred from data cadence: the link is lost once neither a notification
//! was received nor the live vector changed for `stale_after`, and is
//! connected again as soon as either happens.

use std::time::Duration;
use tokio::time::Instant;

use smartshelf_common::events::LinkStatus;
use smartshelf_common::slots::SlotVector;

/// Link status tracker fed with periodic observations
#[derive(Debug)]
pub struct HealthMonitor {
    stale_after: Duration,
    status: LinkStatus,
    last_vector: Option<SlotVector>,
    last_change: Instant,
    seen_change: bool,
}

impl HealthMonitor {
    pub fn new(stale_after: Duration, now: Instant) -> Self {
        Self {
            stale_after,
            status: LinkStatus::Connecting,
            last_vector: None,
            last_change: now,
            seen_change: false,
        }
    }

    pub fn status(&self) -> LinkStatus {
        self.status
    }

    /// Record one observation; returns the new status on a transition
    pub fn check(
        &mut self,
        live: &SlotVector,
        last_reception: Option<Instant>,
        now: Instant,
    ) -> Option<LinkStatus> {
        match self.last_vector {
            Some(previous) if previous != *live => {
                self.last_vector = Some(*live);
                self.last_change = now;
                self.seen_change = true;
            }
            None => self.last_vector = Some(*live),
            _ => {}
        }

        let last_activity = match last_reception {
            Some(reception) => reception.max(self.last_change),
            None => self.last_change,
        };
        let idle = now.saturating_duration_since(last_activity);

        let next = if idle >= self.stale_after {
            LinkStatus::Lost
        } else if last_reception.is_some() || self.seen_change {
            LinkStatus::Connected
        } else {
            // No data yet
            self.status
        };

        if next != self.status {
            self.status = next;
            Some(next)
        } else {
            None
        }
    }
}
