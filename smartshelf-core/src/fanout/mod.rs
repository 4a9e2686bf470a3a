//! Broadcast fan-out
//!
//! Every derivation write-back pushes a full cart snapshot onto the shared
//! event channel. Two background loops back this up: a ~1 Hz poll that
//! re-publishes when a write path left the dirty flag set, and the link
//! health monitor.

pub mod health;

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use smartshelf_common::events::LinkStatus;
use smartshelf_common::slots::ShelfMode;
use smartshelf_common::ShelfEvent;

use crate::cart;
use crate::collaborators::{AudioSink, Cue};
use crate::derivation::Derivation;
use crate::error::Result;
use crate::state::SharedState;

pub use health::HealthMonitor;

#[derive(Debug, Default)]
struct Announced {
    placement: Vec<usize>,
    sensor: Vec<usize>,
}

/// Publishes cart snapshots and slot warnings
#[derive(Clone)]
pub struct Fanout {
    state: Arc<SharedState>,
    audio: Arc<dyn AudioSink>,
    announced: Arc<Mutex<Announced>>,
}

impl Fanout {
    pub fn new(state: Arc<SharedState>, audio: Arc<dyn AudioSink>) -> Self {
        Self {
            state,
            audio,
            announced: Arc::new(Mutex::new(Announced::default())),
        }
    }

    /// Current taken quantities, cart lines and slot error codes
    pub async fn cart_update(&self) -> ShelfEvent {
        let snapshot = self.state.slots().await;
        let catalog = self.state.catalog().await;
        let overrides = self.state.overrides().await;

        ShelfEvent::CartUpdate {
            taken_quantity: snapshot.taken,
            cart: cart::build_cart(&snapshot, &catalog, &overrides),
            error_codes: cart::error_codes(&snapshot.live),
            timestamp: Utc::now(),
        }
    }

    /// Broadcast the current cart snapshot
    ///
    /// Clears the dirty flag first; anything written after this point sets
    /// it again and is picked up by the backup poll.
    pub async fn publish(&self) {
        self.state.take_dirty();
        let event = self.cart_update().await;
        self.state.broadcast_event(event);
    }

    /// Publish after a derivation and announce new slot warnings
    pub async fn on_derivation(&self, derivation: &Derivation) {
        self.publish().await;

        if self.state.mode().await == ShelfMode::Adding {
            return;
        }
        let mut announced = self.announced.lock().await;
        if derivation.placement_warnings != announced.placement {
            if !derivation.placement_warnings.is_empty() {
                let positions: Vec<String> = derivation
                    .placement_warnings
                    .iter()
                    .map(|slot| (slot + 1).to_string())
                    .collect();
                info!("Placement warning at slots {:?}", derivation.placement_warnings);
                self.audio.play(Cue::PlacementError);
                self.audio.speak(&format!(
                    "Please check the item at position {}",
                    positions.join(", ")
                ));
            }
            announced.placement = derivation.placement_warnings.clone();
        }
        if derivation.sensor_errors != announced.sensor {
            if !derivation.sensor_errors.is_empty() {
                warn!("Loadcell error at slots {:?}", derivation.sensor_errors);
                self.audio.play(Cue::SensorError);
            }
            announced.sensor = derivation.sensor_errors.clone();
        }
    }

    /// Safety-net loop: re-publish whenever the dirty flag is set
    pub async fn run_backup_poll(&self, interval: Duration) -> Result<()> {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if self.state.take_dirty() {
                debug!("Backup poll re-publishing cart");
                let event = self.cart_update().await;
                self.state.broadcast_event(event);
            }
        }
    }

    /// Infer loadcell link status from data cadence
    pub async fn run_health_monitor(&self, stale_after: Duration, interval: Duration) -> Result<()> {
        let mut monitor = HealthMonitor::new(stale_after, Instant::now());
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let live = self.state.live_weight().await;
            let last_reception = self.state.last_reception().await;
            let Some(status) = monitor.check(&live, last_reception, Instant::now()) else {
                continue;
            };

            let message = match status {
                LinkStatus::Lost => {
                    warn!("No loadcell data for {:?}, link considered lost", stale_after);
                    "No recent loadcell data".to_string()
                }
                LinkStatus::Connected => {
                    info!("Loadcell data flowing again");
                    "Loadcell data received".to_string()
                }
                LinkStatus::Connecting => "Waiting for loadcell data".to_string(),
            };
            self.state.broadcast_event(ShelfEvent::ConnectionStatus {
                status,
                message,
                timestamp: Utc::now(),
            });
        }
    }
}
