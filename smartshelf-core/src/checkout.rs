//! Payment confirmation and the payment commit loop
//!
//! A confirmed payment (or a forced checkout by the departure watchdog) only
//! raises `payment_verified`. The commit loop polls that flag at ~1 Hz and
//! turns it into a baseline commit through the [`BaselineCommitter`], so
//! payment and restock commits are never persisted concurrently.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use smartshelf_common::events::CartLine;
use smartshelf_common::slots::ShelfMode;

use crate::baseline::{BaselineCommitter, CommitReason};
use crate::cart;
use crate::collaborators::{AudioSink, Cue, Order, OrderLine, OrderSink, OrderStatus};
use crate::device::{LoadcellCommand, UnitQueues};
use crate::error::{Error, Result};
use crate::fanout::Fanout;
use crate::state::SharedState;

/// Order code in the cloud's `HD<epoch millis>` format
pub fn new_order_code() -> String {
    format!("HD{}", Utc::now().timestamp_millis())
}

/// Build an order from cart lines
pub fn order_from_cart(status: OrderStatus, order_code: String, shelf_id: &str, lines: &[CartLine]) -> Order {
    Order {
        status,
        order_code,
        shelf_id: shelf_id.to_string(),
        total_bill: cart::cart_total(lines),
        order_details: lines
            .iter()
            .map(|line| OrderLine {
                product_id: line.product_id.clone(),
                quantity: line.quantity,
                price: line.price,
                total_price: line.line_total,
            })
            .collect(),
    }
}

/// Payment flow around the shared tracking flags
#[derive(Clone)]
pub struct Checkout {
    shelf_id: String,
    state: Arc<SharedState>,
    committer: BaselineCommitter,
    queues: UnitQueues,
    fanout: Fanout,
    orders: Arc<dyn OrderSink>,
    audio: Arc<dyn AudioSink>,
}

impl Checkout {
    pub fn new(
        shelf_id: String,
        state: Arc<SharedState>,
        committer: BaselineCommitter,
        queues: UnitQueues,
        fanout: Fanout,
        orders: Arc<dyn OrderSink>,
        audio: Arc<dyn AudioSink>,
    ) -> Self {
        Self {
            shelf_id,
            state,
            committer,
            queues,
            fanout,
            orders,
            audio,
        }
    }

    /// Accept a payment notification from the payment gateway
    ///
    /// Rejected when the amount does not cover the cart or a previous
    /// payment is still waiting for its commit. Returns the cart total.
    pub async fn confirm_payment(&self, amount: u64, order_code: Option<String>) -> Result<u64> {
        let lines = cart::current_cart(&self.state).await;
        let total = cart::cart_total(&lines);
        if amount < total {
            info!("Payment rejected: received {} for a cart of {}", amount, total);
            return Err(Error::BadRequest(format!(
                "amount {} is less than cart total {}",
                amount, total
            )));
        }
        if !self.state.try_begin_payment().await {
            return Err(Error::BadRequest("a payment is already being committed".to_string()));
        }
        info!("Payment of {} verified (cart {})", amount, total);

        let order = order_from_cart(
            OrderStatus::Paid,
            order_code.unwrap_or_else(new_order_code),
            &self.shelf_id,
            &lines,
        );
        let orders = self.orders.clone();
        tokio::spawn(async move {
            if let Err(e) = orders.post_order(&order).await {
                warn!("Paid order {} not posted: {}", order.order_code, e);
            }
        });
        Ok(total)
    }

    /// Commit whenever the payment flag is raised
    pub async fn run_commit_loop(&self, interval: Duration) -> Result<()> {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if self.state.take_payment_verified().await {
                if let Err(e) = self.complete_payment().await {
                    error!("Payment commit failed: {}", e);
                }
            }
        }
    }

    /// New baseline from live weights, cart cleared, units told to commit
    pub async fn complete_payment(&self) -> Result<()> {
        let outcome = self.committer.commit(CommitReason::Payment).await?;
        self.state.set_is_tracking(false).await;
        self.audio.play(Cue::PaymentCompleted);
        self.fanout.publish().await;
        info!("Payment completed, new baseline {:?}", outcome.verified);

        let queues = self.queues.clone();
        tokio::spawn(async move {
            for (unit, result) in queues.broadcast(LoadcellCommand::CommitMode(ShelfMode::Added)).await {
                if let Err(e) = result {
                    warn!("{}: payment commit command not delivered: {}", unit, e);
                }
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(position: usize, quantity: u32, price: u64) -> CartLine {
        CartLine {
            position,
            quantity,
            product_id: format!("p{}", position),
            product_name: format!("Product {}", position),
            price,
            original_price: price,
            discount: 0,
            line_total: price * u64::from(quantity),
            img_url: None,
            manual: false,
        }
    }

    #[test]
    fn test_order_totals_from_cart() {
        let order = order_from_cart(
            OrderStatus::Unpaid,
            "HD1".to_string(),
            "shelf-01",
            &[line(0, 2, 10_000), line(14, 1, 5_000)],
        );

        assert_eq!(order.total_bill, 25_000);
        assert_eq!(order.order_details.len(), 2);
        assert_eq!(order.order_details[1].total_price, 5_000);
    }

    #[test]
    fn test_order_code_format() {
        let code = new_order_code();
        assert!(code.starts_with("HD"));
        assert!(code[2..].chars().all(|c| c.is_ascii_digit()));
    }
}
