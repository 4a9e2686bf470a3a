//! Unattended-departure watchdog
//!
//! While a customer is being tracked, the presence signal is sampled at
//! ~20 Hz. Consecutive misses escalate: warning cues at the configured
//! counts, then a forced "unpaid" checkout that posts the cart as an unpaid
//! order and raises `payment_verified` so the commit loop takes a new
//! baseline.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use smartshelf_common::ShelfEvent;

use smartshelf_common::slots::SlotVector;

use crate::catalog::Catalog;
use crate::checkout::new_order_code;
use crate::collaborators::{AudioSink, Cue, Order, OrderLine, OrderSink, OrderStatus, PresenceSignal};
use crate::config::WatchdogConfig;
use crate::error::Result;
use crate::state::SharedState;

/// What one presence sample led to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogAction {
    /// Not tracking; nothing sampled
    Idle,
    Continue,
    Warn(u32),
    ForceCheckout,
}

/// Consecutive-miss counter with escalation thresholds
#[derive(Debug, Clone)]
pub struct MissCounter {
    misses: u32,
    warning_misses: Vec<u32>,
    checkout_misses: u32,
}

impl MissCounter {
    pub fn new(warning_misses: Vec<u32>, checkout_misses: u32) -> Self {
        Self {
            misses: 0,
            warning_misses,
            checkout_misses,
        }
    }

    pub fn misses(&self) -> u32 {
        self.misses
    }

    pub fn reset(&mut self) {
        self.misses = 0;
    }

    pub fn sample(&mut self, present: bool) -> WatchdogAction {
        if present {
            self.misses = 0;
            return WatchdogAction::Continue;
        }
        self.misses += 1;
        if self.misses >= self.checkout_misses {
            self.misses = 0;
            WatchdogAction::ForceCheckout
        } else if self.warning_misses.contains(&self.misses) {
            WatchdogAction::Warn(self.misses)
        } else {
            WatchdogAction::Continue
        }
    }
}

/// Unpaid order for what was taken, at catalog list price
///
/// Settles the raw taken quantities; discounts and manual overrides only
/// apply to a cart the customer actually paid for.
pub fn unpaid_order(order_code: String, shelf_id: &str, taken: &SlotVector, catalog: &Catalog) -> Order {
    let order_details: Vec<OrderLine> = taken
        .iter()
        .enumerate()
        .filter(|&(_, &quantity)| quantity > 0)
        .filter_map(|(slot, &quantity)| {
            catalog.product(slot).map(|product| OrderLine {
                product_id: product.product_id.clone(),
                quantity,
                price: product.price,
                total_price: product.price * u64::from(quantity),
            })
        })
        .collect();
    Order {
        status: OrderStatus::Unpaid,
        order_code,
        shelf_id: shelf_id.to_string(),
        total_bill: order_details.iter().map(|line| line.total_price).sum(),
        order_details,
    }
}

/// Forces an unpaid checkout when the customer walks away
pub struct DepartureWatchdog {
    shelf_id: String,
    config: WatchdogConfig,
    counter: MissCounter,
    state: Arc<SharedState>,
    presence: Arc<dyn PresenceSignal>,
    orders: Arc<dyn OrderSink>,
    audio: Arc<dyn AudioSink>,
}

impl DepartureWatchdog {
    pub fn new(
        shelf_id: String,
        config: WatchdogConfig,
        state: Arc<SharedState>,
        presence: Arc<dyn PresenceSignal>,
        orders: Arc<dyn OrderSink>,
        audio: Arc<dyn AudioSink>,
    ) -> Self {
        let counter = MissCounter::new(config.warning_misses.clone(), config.checkout_misses);
        Self {
            shelf_id,
            config,
            counter,
            state,
            presence,
            orders,
            audio,
        }
    }

    /// Take one sample if a customer is being tracked
    ///
    /// Nothing is sampled while a payment commit is pending, so one
    /// departure settles exactly once.
    pub async fn tick(&mut self) -> WatchdogAction {
        let tracking = self.state.tracking().await;
        if !tracking.is_tracking || tracking.payment_verified {
            self.counter.reset();
            return WatchdogAction::Idle;
        }

        let action = self.counter.sample(self.presence.is_person_present());
        match action {
            WatchdogAction::Warn(misses) => {
                info!("Customer absent for {} samples", misses);
                self.audio.play(Cue::DepartureWarning);
                self.state.broadcast_event(ShelfEvent::DepartureWarning {
                    consecutive_misses: misses,
                    timestamp: Utc::now(),
                });
            }
            WatchdogAction::ForceCheckout => self.force_checkout().await,
            _ => {}
        }
        action
    }

    async fn force_checkout(&self) {
        let taken = self.state.taken_quantity().await;
        let catalog = self.state.catalog().await;
        let order = unpaid_order(new_order_code(), &self.shelf_id, &taken, &catalog);
        warn!(
            "Customer left without paying, order {} total {}",
            order.order_code, order.total_bill
        );

        self.state.set_unpaid_warning(true).await;
        self.state.set_is_tracking(false).await;
        self.state.set_payment_verified(true).await;
        self.audio.play(Cue::UnpaidCheckout);
        self.state.broadcast_event(ShelfEvent::UnpaidCheckout {
            order_code: order.order_code.clone(),
            total_bill: order.total_bill,
            timestamp: Utc::now(),
        });

        if let Err(e) = self.orders.post_order(&order).await {
            warn!("Unpaid order {} not posted: {}", order.order_code, e);
        }
    }

    /// Sample forever; slower polling while nobody is tracked
    pub async fn run(mut self) -> Result<()> {
        let active = Duration::from_millis(self.config.sample_interval_millis);
        let idle = Duration::from_millis(self.config.idle_poll_millis);
        loop {
            let pause = match self.tick().await {
                WatchdogAction::Idle => idle,
                _ => active,
            };
            tokio::time::sleep(pause).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escalation_thresholds() {
        let mut counter = MissCounter::new(vec![20, 60], 100);
        let mut actions = Vec::new();
        for _ in 0..100 {
            let action = counter.sample(false);
            if action != WatchdogAction::Continue {
                actions.push(action);
            }
        }
        assert_eq!(
            actions,
            vec![WatchdogAction::Warn(20), WatchdogAction::Warn(60), WatchdogAction::ForceCheckout]
        );
        assert_eq!(counter.misses(), 0);
    }

    #[test]
    fn test_unpaid_order_uses_list_price() {
        let product = |slot: usize, price: u64, discount: u32| crate::catalog::Product {
            product_id: format!("p{}", slot),
            product_name: format!("Product {}", slot),
            price,
            weight: 300,
            discount,
            img_url: None,
        };
        let catalog = Catalog::new(vec![product(0, 10_000, 10), product(1, 5_000, 0)]);
        let mut taken = [0; smartshelf_common::SLOT_COUNT];
        taken[0] = 2;
        // No catalog entry; not billed
        taken[9] = 1;

        let order = unpaid_order("HD1".to_string(), "shelf-01", &taken, &catalog);

        assert_eq!(order.status, OrderStatus::Unpaid);
        assert_eq!(order.order_details.len(), 1);
        assert_eq!(order.order_details[0].price, 10_000);
        assert_eq!(order.total_bill, 20_000);
    }

    #[test]
    fn test_presence_resets_counter() {
        let mut counter = MissCounter::new(vec![20, 60], 100);
        for _ in 0..19 {
            counter.sample(false);
        }
        counter.sample(true);
        assert_eq!(counter.misses(), 0);
        for _ in 0..19 {
            assert_eq!(counter.sample(false), WatchdogAction::Continue);
        }
    }
}
