//! Shared shelf state
//!
//! The single process-wide state store, injected as `Arc<SharedState>` into
//! every component. Fields updated at different rates sit behind separate
//! locks; the slot triad (live weight, verified baseline, taken quantity)
//! shares one lock so a reader never sees a taken vector that disagrees with
//! the live/verified pair it was derived from.
//!
//! Derivation reads the mode under the slot lock, and mode changes take the
//! slot lock first, so a derivation never mixes an old mode with new slots.
//!
//! Readers always get copies. No lock is held across I/O: callers copy out,
//! release, perform the device/file/network call, then write back.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{broadcast, RwLock};
use tokio::time::Instant;

use smartshelf_common::events::AlarmKind;
use smartshelf_common::slots::{LoadcellUnit, ShelfMode, SlotReading, SlotVector, SLOT_COUNT};
use smartshelf_common::ShelfEvent;

use crate::catalog::Catalog;
use crate::derivation::{self, Derivation};
use crate::error::{Error, Result};

/// Copy of the slot triad plus the sentinel slots of the last derivation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSnapshot {
    pub live: SlotVector,
    pub verified: SlotVector,
    pub taken: SlotVector,
    pub placement_warnings: Vec<usize>,
    pub sensor_errors: Vec<usize>,
}

#[derive(Debug)]
struct SlotState {
    live: SlotVector,
    verified: SlotVector,
    taken: SlotVector,
    placement_warnings: Vec<usize>,
    sensor_errors: Vec<usize>,
}

impl SlotState {
    fn apply(&mut self, derivation: Derivation) {
        self.taken = derivation.taken;
        self.placement_warnings = derivation.placement_warnings;
        self.sensor_errors = derivation.sensor_errors;
    }

    fn snapshot(&self) -> SlotSnapshot {
        SlotSnapshot {
            live: self.live,
            verified: self.verified,
            taken: self.taken,
            placement_warnings: self.placement_warnings.clone(),
            sensor_errors: self.sensor_errors.clone(),
        }
    }
}

/// Checkout coordination flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrackingState {
    /// A customer has something in hand
    pub is_tracking: bool,
    /// Payment confirmed; the commit loop will take a new baseline
    pub payment_verified: bool,
    /// Unpaid departure pending hand-off to telemetry
    pub unpaid_warning: bool,
}

/// Latest ambient readings from the environmental sensor
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EnvironmentReadings {
    pub pressure: Option<f64>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub light: Option<f64>,
    pub sound: Option<f64>,
    pub magnetic: Option<f64>,
}

/// Which ambient value a reading carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmbientKind {
    Pressure,
    Temperature,
    Humidity,
    Light,
    Sound,
    Magnetic,
}

/// Shared state accessible by all components
pub struct SharedState {
    slots: RwLock<SlotState>,
    mode: RwLock<ShelfMode>,
    tracking: RwLock<TrackingState>,
    connections: [AtomicBool; 2],
    last_reception: RwLock<Option<Instant>>,
    catalog: RwLock<Catalog>,
    badges: RwLock<Vec<String>>,
    overrides: RwLock<BTreeMap<usize, u32>>,
    environment: RwLock<EnvironmentReadings>,
    voice_command: RwLock<Option<String>>,
    lean_alarm: AtomicBool,
    shake_alarm: AtomicBool,
    /// Set by every write path, cleared by the backup poll
    dirty: AtomicBool,
    event_tx: broadcast::Sender<ShelfEvent>,
}

impl SharedState {
    /// Create state from the persisted baseline and cached catalogs
    ///
    /// Live weights start equal to the baseline, so nothing reads as taken
    /// until a unit reports.
    pub fn new(verified: SlotVector, catalog: Catalog, badges: Vec<String>) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            slots: RwLock::new(SlotState {
                live: verified,
                verified,
                taken: [0; SLOT_COUNT],
                placement_warnings: Vec::new(),
                sensor_errors: Vec::new(),
            }),
            mode: RwLock::new(ShelfMode::Added),
            tracking: RwLock::new(TrackingState::default()),
            connections: [AtomicBool::new(false), AtomicBool::new(false)],
            last_reception: RwLock::new(None),
            catalog: RwLock::new(catalog),
            badges: RwLock::new(badges),
            overrides: RwLock::new(BTreeMap::new()),
            environment: RwLock::new(EnvironmentReadings::default()),
            voice_command: RwLock::new(None),
            lean_alarm: AtomicBool::new(false),
            shake_alarm: AtomicBool::new(false),
            dirty: AtomicBool::new(false),
            event_tx,
        }
    }

    /// Broadcast an event to all observers
    pub fn broadcast_event(&self, event: ShelfEvent) {
        // No receivers is fine
        let _ = self.event_tx.send(event);
    }

    /// Subscribe to the change-notification feed
    pub fn subscribe_events(&self) -> broadcast::Receiver<ShelfEvent> {
        self.event_tx.subscribe()
    }

    // ------------------------------------------------------------------
    // Slot triad
    // ------------------------------------------------------------------

    pub async fn slots(&self) -> SlotSnapshot {
        self.slots.read().await.snapshot()
    }

    pub async fn taken_quantity(&self) -> SlotVector {
        self.slots.read().await.taken
    }

    /// Live loadcell values with sentinels intact
    pub async fn live_weight(&self) -> SlotVector {
        self.slots.read().await.live
    }

    pub async fn verified_quantity(&self) -> SlotVector {
        self.slots.read().await.verified
    }

    /// Write one unit's notification into its half of the live vector and rederive
    ///
    /// Extra bytes beyond the unit's slot count are ignored; a short frame
    /// only updates the slots it covers.
    pub async fn apply_unit_reading(&self, unit: LoadcellUnit, frame: &[u8]) -> Derivation {
        let derivation = {
            let mut slots = self.slots.write().await;
            let mode = self.mode().await;
            for (slot, &value) in unit.slots().zip(frame.iter()) {
                slots.live[slot] = u32::from(value);
            }
            let derivation = derivation::derive(&slots.live, &slots.verified, &slots.taken, mode);
            slots.apply(derivation.clone());
            self.tracking.write().await.is_tracking = derivation.is_tracking;
            derivation
        };

        *self.last_reception.write().await = Some(Instant::now());
        self.mark_dirty();
        derivation
    }

    /// Rederive taken quantities from the current snapshot
    pub async fn recompute(&self) -> Derivation {
        let derivation = {
            let mut slots = self.slots.write().await;
            let mode = self.mode().await;
            let derivation = derivation::derive(&slots.live, &slots.verified, &slots.taken, mode);
            slots.apply(derivation.clone());
            self.tracking.write().await.is_tracking = derivation.is_tracking;
            derivation
        };
        self.mark_dirty();
        derivation
    }

    /// Take the live weights as the new baseline
    ///
    /// Sentinel slots keep their previous baseline. With `clear_taken` every
    /// taken quantity is zeroed (payment completion); otherwise taken is
    /// rederived. Returns the new baseline.
    pub async fn commit_live_as_baseline(&self, clear_taken: bool) -> SlotVector {
        let verified = {
            let mut slots = self.slots.write().await;
            slots.verified = derivation::commit_baseline(&slots.live, &slots.verified);
            if clear_taken {
                slots.taken = [0; SLOT_COUNT];
            }
            slots.verified
        };
        if !clear_taken {
            self.recompute().await;
        }
        self.mark_dirty();
        verified
    }

    // ------------------------------------------------------------------
    // Mode and connections
    // ------------------------------------------------------------------

    pub async fn mode(&self) -> ShelfMode {
        *self.mode.read().await
    }

    /// Switch mode; waits out any derivation in progress
    pub async fn set_mode(&self, mode: ShelfMode) {
        let _slots = self.slots.write().await;
        *self.mode.write().await = mode;
    }

    pub fn connection(&self, unit: LoadcellUnit) -> bool {
        self.connections[unit.index()].load(Ordering::SeqCst)
    }

    pub fn set_connection(&self, unit: LoadcellUnit, connected: bool) {
        self.connections[unit.index()].store(connected, Ordering::SeqCst);
    }

    /// First unit without a session, if any
    pub fn first_disconnected(&self) -> Option<LoadcellUnit> {
        LoadcellUnit::ALL.into_iter().find(|&unit| !self.connection(unit))
    }

    pub async fn last_reception(&self) -> Option<Instant> {
        *self.last_reception.read().await
    }

    // ------------------------------------------------------------------
    // Tracking / payment
    // ------------------------------------------------------------------

    pub async fn tracking(&self) -> TrackingState {
        *self.tracking.read().await
    }

    pub async fn set_is_tracking(&self, is_tracking: bool) {
        self.tracking.write().await.is_tracking = is_tracking;
    }

    pub async fn set_payment_verified(&self, verified: bool) {
        self.tracking.write().await.payment_verified = verified;
    }

    /// Raise `payment_verified` unless it is already raised
    ///
    /// Returns false when a previous payment is still waiting for its commit.
    pub async fn try_begin_payment(&self) -> bool {
        let mut tracking = self.tracking.write().await;
        if tracking.payment_verified {
            return false;
        }
        tracking.payment_verified = true;
        true
    }

    /// Return the payment flag and clear it in one step
    pub async fn take_payment_verified(&self) -> bool {
        std::mem::take(&mut self.tracking.write().await.payment_verified)
    }

    pub async fn set_unpaid_warning(&self, warning: bool) {
        self.tracking.write().await.unpaid_warning = warning;
    }

    /// Return the unpaid flag and clear it (telemetry hand-off)
    pub async fn take_unpaid_warning(&self) -> bool {
        std::mem::take(&mut self.tracking.write().await.unpaid_warning)
    }

    // ------------------------------------------------------------------
    // Catalog and badges
    // ------------------------------------------------------------------

    pub async fn catalog(&self) -> Catalog {
        self.catalog.read().await.clone()
    }

    pub async fn set_catalog(&self, catalog: Catalog) {
        *self.catalog.write().await = catalog;
        self.mark_dirty();
    }

    pub async fn badges(&self) -> Vec<String> {
        self.badges.read().await.clone()
    }

    pub async fn set_badges(&self, badges: Vec<String>) {
        *self.badges.write().await = badges;
    }

    pub async fn is_badge_allowed(&self, badge_id: &str) -> bool {
        self.badges.read().await.iter().any(|b| b == badge_id)
    }

    // ------------------------------------------------------------------
    // Manual overrides
    // ------------------------------------------------------------------

    /// Set a staff-entered cart quantity for a slot whose loadcell failed
    ///
    /// Only a hardware error (255) can be overridden; a misplaced item
    /// (200/222) has to be fixed on the shelf.
    pub async fn set_manual_override(&self, slot: usize, quantity: u32) -> Result<()> {
        if slot >= SLOT_COUNT {
            return Err(Error::InvalidSlot(slot));
        }
        let value = self.slots.read().await.live[slot];
        match SlotReading::classify(value) {
            SlotReading::SensorError => {
                self.overrides.write().await.insert(slot, quantity);
                self.mark_dirty();
                Ok(())
            }
            SlotReading::PlacementWarning(code) => Err(Error::OverrideRejected {
                slot,
                reason: format!("item misplaced (code {}), fix it on the shelf", code),
            }),
            _ => Err(Error::OverrideRejected {
                slot,
                reason: format!("loadcell is reporting normally ({})", value),
            }),
        }
    }

    pub async fn overrides(&self) -> BTreeMap<usize, u32> {
        self.overrides.read().await.clone()
    }

    pub async fn clear_overrides(&self) {
        self.overrides.write().await.clear();
    }

    // ------------------------------------------------------------------
    // Environmental sensor
    // ------------------------------------------------------------------

    pub async fn environment(&self) -> EnvironmentReadings {
        *self.environment.read().await
    }

    pub async fn set_ambient(&self, kind: AmbientKind, value: f64) {
        let mut env = self.environment.write().await;
        let field = match kind {
            AmbientKind::Pressure => &mut env.pressure,
            AmbientKind::Temperature => &mut env.temperature,
            AmbientKind::Humidity => &mut env.humidity,
            AmbientKind::Light => &mut env.light,
            AmbientKind::Sound => &mut env.sound,
            AmbientKind::Magnetic => &mut env.magnetic,
        };
        *field = Some(value);
    }

    pub fn raise_alarm(&self, kind: AlarmKind) {
        match kind {
            AlarmKind::Lean => self.lean_alarm.store(true, Ordering::SeqCst),
            AlarmKind::Shake => self.shake_alarm.store(true, Ordering::SeqCst),
        }
    }

    /// Return `(lean, shake)` alarm flags and clear them (telemetry hand-off)
    pub fn take_alarm_flags(&self) -> (bool, bool) {
        (
            self.lean_alarm.swap(false, Ordering::SeqCst),
            self.shake_alarm.swap(false, Ordering::SeqCst),
        )
    }

    pub async fn set_voice_command(&self, command: Option<String>) {
        *self.voice_command.write().await = command;
    }

    pub async fn voice_command(&self) -> Option<String> {
        self.voice_command.read().await.clone()
    }

    // ------------------------------------------------------------------
    // Change tracking
    // ------------------------------------------------------------------

    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    /// Return the dirty flag and clear it
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::SeqCst)
    }
}
