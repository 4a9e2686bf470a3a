//! Cart building from a slot snapshot
//!
//! A cart line exists for every slot with a nonzero taken quantity and a
//! catalog entry. Slots reporting a hardware error (255) with a staff
//! override use the override quantity instead.

use std::collections::BTreeMap;

use smartshelf_common::events::{CartLine, SlotErrorCode, SlotErrorKind};
use smartshelf_common::slots::{SlotReading, SlotVector};

use crate::catalog::Catalog;
use crate::state::{SharedState, SlotSnapshot};

/// Cart for the current state
pub async fn current_cart(state: &SharedState) -> Vec<CartLine> {
    let snapshot = state.slots().await;
    let catalog = state.catalog().await;
    let overrides = state.overrides().await;
    build_cart(&snapshot, &catalog, &overrides)
}

/// Build cart lines for the slots that have something taken
pub fn build_cart(
    snapshot: &SlotSnapshot,
    catalog: &Catalog,
    overrides: &BTreeMap<usize, u32>,
) -> Vec<CartLine> {
    let mut lines = Vec::new();
    for (slot, &taken) in snapshot.taken.iter().enumerate() {
        let manual = match (SlotReading::classify(snapshot.live[slot]), overrides.get(&slot)) {
            (SlotReading::SensorError, Some(&quantity)) => Some(quantity),
            _ => None,
        };
        let quantity = manual.unwrap_or(taken);
        if quantity == 0 {
            continue;
        }
        let Some(product) = catalog.product(slot) else {
            continue;
        };
        let price = product.discounted_price();
        lines.push(CartLine {
            position: slot,
            quantity,
            product_id: product.product_id.clone(),
            product_name: product.product_name.clone(),
            price,
            original_price: product.price,
            discount: product.discount,
            line_total: price * u64::from(quantity),
            img_url: product.img_url.clone(),
            manual: manual.is_some(),
        });
    }
    lines
}

/// Sum of line totals
pub fn cart_total(lines: &[CartLine]) -> u64 {
    lines.iter().map(|l| l.line_total).sum()
}

/// Error codes for every sentinel slot in the live vector
pub fn error_codes(live: &SlotVector) -> Vec<SlotErrorCode> {
    live.iter()
        .enumerate()
        .filter_map(|(slot, &value)| match SlotReading::classify(value) {
            SlotReading::PlacementWarning(code) => Some(SlotErrorCode {
                position: slot,
                code,
                message: format!("Item at position {} is misplaced", slot + 1),
                kind: SlotErrorKind::PlacementError,
                allow_manual_control: false,
            }),
            SlotReading::SensorError => Some(SlotErrorCode {
                position: slot,
                code: value,
                message: format!("Loadcell at position {} is not responding", slot + 1),
                kind: SlotErrorKind::LoadcellError,
                allow_manual_control: true,
            }),
            _ => None,
        })
        .collect()
}
