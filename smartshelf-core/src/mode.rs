//! Restock mode controller
//!
//! ADDED (retail) and ADDING (restocking) toggle on each accepted badge
//! scan. A scan is refused, with no state change, when the badge is not on
//! the allow-list or a loadcell unit has no session.
//!
//! Entering ADDING refreshes catalogs and programs both units; leaving it
//! commits the live weights as the new baseline before anything else
//! happens. Device programming and the audit post run in a background task
//! that holds the transition lock, so the next scan is handled only after
//! the previous transition's commands are queued in order.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

use smartshelf_common::events::RejectReason;
use smartshelf_common::slots::{LoadcellUnit, ShelfMode};
use smartshelf_common::ShelfEvent;

use crate::baseline::{BaselineCommitter, CommitReason};
use crate::collaborators::{AudioSink, CatalogProvider, Cue, OrderSink, RestockAudit};
use crate::device::{LoadcellCommand, UnitQueues};
use crate::error::Result;
use crate::fanout::Fanout;
use crate::state::SharedState;

/// Result of a badge scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeOutcome {
    /// Mode switched to the contained value
    Accepted(ShelfMode),
    Rejected(RejectReason),
}

/// ADDED/ADDING state machine driven by badge scans
#[derive(Clone)]
pub struct ModeController {
    shelf_id: String,
    state: Arc<SharedState>,
    queues: UnitQueues,
    committer: BaselineCommitter,
    catalog: Arc<dyn CatalogProvider>,
    orders: Arc<dyn OrderSink>,
    audio: Arc<dyn AudioSink>,
    fanout: Fanout,
    transition: Arc<Mutex<()>>,
    /// Product ids at the last restock commit
    committed_products: Arc<Mutex<Vec<String>>>,
}

impl ModeController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        shelf_id: String,
        state: Arc<SharedState>,
        queues: UnitQueues,
        committer: BaselineCommitter,
        catalog: Arc<dyn CatalogProvider>,
        orders: Arc<dyn OrderSink>,
        audio: Arc<dyn AudioSink>,
        fanout: Fanout,
        initial_products: Vec<String>,
    ) -> Self {
        Self {
            shelf_id,
            state,
            queues,
            committer,
            catalog,
            orders,
            audio,
            fanout,
            transition: Arc::new(Mutex::new(())),
            committed_products: Arc::new(Mutex::new(initial_products)),
        }
    }

    /// Handle one badge scan
    pub async fn submit_badge_scan(&self, badge_id: &str) -> Result<BadgeOutcome> {
        let badge_id = badge_id.trim();

        if !self.state.is_badge_allowed(badge_id).await {
            info!("Badge {} not recognized", badge_id);
            return Ok(self.reject(RejectReason::UnknownBadge, Cue::BadgeUnknown));
        }
        if let Some(unit) = self.state.first_disconnected() {
            info!("Badge {} refused: {} not connected", badge_id, unit);
            return Ok(self.reject(RejectReason::UnitDisconnected(unit), Cue::DeviceNotConnected));
        }

        let guard = self.transition.clone().lock_owned().await;
        let next = self.state.mode().await.toggled();
        match next {
            ShelfMode::Adding => self.enter_adding(badge_id, guard).await,
            ShelfMode::Added => self.enter_added(badge_id, guard).await?,
        }
        Ok(BadgeOutcome::Accepted(next))
    }

    fn reject(&self, reason: RejectReason, cue: Cue) -> BadgeOutcome {
        self.audio.play(cue);
        self.state.broadcast_event(ShelfEvent::BadgeRejected {
            reason,
            timestamp: Utc::now(),
        });
        BadgeOutcome::Rejected(reason)
    }

    async fn enter_adding(&self, badge_id: &str, guard: OwnedMutexGuard<()>) {
        self.state.set_mode(ShelfMode::Adding).await;
        self.state.set_is_tracking(false).await;
        self.announce(ShelfMode::Adding, badge_id);
        self.audio.play(Cue::RestockStarted);
        info!("Restock mode entered by {}", badge_id);

        let controller = self.clone();
        tokio::spawn(async move {
            let _guard = guard;
            controller.refresh_catalogs().await;
            controller.program_units().await;
        });
    }

    async fn enter_added(&self, badge_id: &str, guard: OwnedMutexGuard<()>) -> Result<()> {
        // Baseline first, then leave ADDING so no derivation runs against the old baseline
        let outcome = self
            .committer
            .commit(CommitReason::Restock {
                badge_id: badge_id.to_string(),
            })
            .await?;
        self.state.set_mode(ShelfMode::Added).await;
        let derivation = self.state.recompute().await;
        self.announce(ShelfMode::Added, badge_id);
        self.audio.play(Cue::RestockCommitted);
        self.fanout.on_derivation(&derivation).await;
        info!("Restock committed by {}", badge_id);

        let post_products = self.state.catalog().await.product_ids();
        let pre_products = {
            let mut committed = self.committed_products.lock().await;
            std::mem::replace(&mut *committed, post_products.clone())
        };
        let audit = RestockAudit {
            shelf_id: self.shelf_id.clone(),
            user_rfid: badge_id.to_string(),
            pre_products,
            post_products,
            pre_verified_quantity: outcome.previous,
            post_verified_quantity: outcome.verified,
        };

        let controller = self.clone();
        tokio::spawn(async move {
            let _guard = guard;
            for (unit, result) in controller
                .queues
                .broadcast(LoadcellCommand::CommitMode(ShelfMode::Added))
                .await
            {
                if let Err(e) = result {
                    warn!("{}: restock commit command not delivered: {}", unit, e);
                }
            }
            if let Err(e) = controller.orders.post_restock_audit(&audit).await {
                warn!("Restock history not posted: {}", e);
            }
        });
        Ok(())
    }

    fn announce(&self, mode: ShelfMode, badge_id: &str) {
        self.state.broadcast_event(ShelfEvent::ModeChanged {
            mode,
            badge_id: badge_id.to_string(),
            timestamp: Utc::now(),
        });
    }

    /// Best-effort refresh; the cached catalog stays in use on failure
    async fn refresh_catalogs(&self) {
        match self.catalog.products().await {
            Ok(catalog) => self.state.set_catalog(catalog).await,
            Err(e) => warn!("Product catalog not refreshed: {}", e),
        }
        match self.catalog.badge_allow_list().await {
            Ok(badges) => self.state.set_badges(badges).await,
            Err(e) => warn!("Badge list not refreshed: {}", e),
        }
        if let Err(e) = self.catalog.refresh_auxiliary().await {
            warn!("Combos/posters not refreshed: {}", e);
        }
    }

    /// Push catalog tables and the ADDING flag to both units
    async fn program_units(&self) {
        let catalog = self.state.catalog().await;
        let program = |unit: LoadcellUnit| {
            let mut commands = LoadcellCommand::catalog_tables(&catalog, unit);
            commands.push(LoadcellCommand::CommitMode(ShelfMode::Adding));
            let queues = self.queues.clone();
            async move {
                if let Err(e) = queues.send_all(unit, commands).await {
                    warn!("{}: programming incomplete: {}", unit, e);
                }
            }
        };
        tokio::join!(program(LoadcellUnit::Unit1), program(LoadcellUnit::Unit2));
    }
}
