//! End-to-end shelf scenarios
//!
//! Drives the wired core (no device tasks) through weight reports, badge
//! scans, overrides and the departure watchdog.

mod helpers;

use std::sync::Arc;

use helpers::{Shelf, STAFF_BADGE};
use smartshelf::badge_reader::BadgeReader;
use smartshelf::baseline::BaselineStore;
use smartshelf::collaborators::{Cue, OrderStatus};
use smartshelf::config::WatchdogConfig;
use smartshelf::error::Error;
use smartshelf::mode::BadgeOutcome;
use smartshelf::watchdog::{DepartureWatchdog, WatchdogAction};
use smartshelf_common::events::RejectReason;
use smartshelf_common::slots::{LoadcellUnit, ShelfMode, SLOT_COUNT};

#[tokio::test]
async fn test_taken_is_baseline_minus_live() {
    let mut verified = [0; SLOT_COUNT];
    verified[0] = 5;
    let shelf = Shelf::new(verified);

    let mut live = verified;
    live[0] = 3;
    shelf.report(&live).await;

    let taken = shelf.state.taken_quantity().await;
    assert_eq!(taken[0], 2);
    assert!(taken[1..].iter().all(|&q| q == 0));
    assert!(shelf.state.tracking().await.is_tracking);
}

#[tokio::test]
async fn test_placement_warning_leaves_taken_unchanged() {
    let shelf = Shelf::new([5; SLOT_COUNT]);

    let mut live = [5; SLOT_COUNT];
    live[3] = 4;
    shelf.report(&live).await;
    assert_eq!(shelf.state.taken_quantity().await[3], 1);

    live[3] = 222;
    shelf.report(&live).await;
    let snapshot = shelf.state.slots().await;
    assert_eq!(snapshot.taken[3], 1);
    assert_eq!(snapshot.placement_warnings, vec![3]);
    assert_eq!(snapshot.live[3], 222);
}

#[tokio::test]
async fn test_restock_commit_copies_live_except_sensor_errors() {
    let mut verified = [5; SLOT_COUNT];
    verified[1] = 9;
    let shelf = Shelf::new(verified);
    shelf.connect_all();
    shelf.state.set_mode(ShelfMode::Adding).await;

    let mut live = [7; SLOT_COUNT];
    live[1] = 255;
    shelf.report(&live).await;

    let outcome = shelf.modes.submit_badge_scan(STAFF_BADGE).await.unwrap();
    assert_eq!(outcome, BadgeOutcome::Accepted(ShelfMode::Added));
    assert_eq!(shelf.state.mode().await, ShelfMode::Added);

    let mut expected = [7; SLOT_COUNT];
    expected[1] = 9;
    assert_eq!(shelf.state.verified_quantity().await, expected);
    assert_eq!(BaselineStore::new(shelf.snapshot_path()).load(), expected);
    assert!(shelf.audio.cues().contains(&Cue::RestockCommitted));
}

#[tokio::test]
async fn test_mode_round_trip_keeps_snapshot_file() {
    let verified = [4; SLOT_COUNT];
    let shelf = Shelf::new(verified);
    shelf.connect_all();
    let store = BaselineStore::new(shelf.snapshot_path());
    store.save(&verified).await.unwrap();
    let before = std::fs::read(shelf.snapshot_path()).unwrap();

    assert_eq!(
        shelf.modes.submit_badge_scan(STAFF_BADGE).await.unwrap(),
        BadgeOutcome::Accepted(ShelfMode::Adding)
    );
    assert_eq!(shelf.state.mode().await, ShelfMode::Adding);
    assert_eq!(
        shelf.modes.submit_badge_scan(STAFF_BADGE).await.unwrap(),
        BadgeOutcome::Accepted(ShelfMode::Added)
    );

    assert_eq!(shelf.state.verified_quantity().await, verified);
    assert_eq!(std::fs::read(shelf.snapshot_path()).unwrap(), before);

    helpers::eventually(|| shelf.orders.audits().len() == 1).await;
    let audit = &shelf.orders.audits()[0];
    assert_eq!(audit.user_rfid, STAFF_BADGE);
    assert_eq!(audit.pre_verified_quantity, audit.post_verified_quantity);
}

#[tokio::test]
async fn test_adding_freezes_taken() {
    let shelf = Shelf::new([5; SLOT_COUNT]);
    shelf.connect_all();
    shelf.modes.submit_badge_scan(STAFF_BADGE).await.unwrap();

    let mut live = [5; SLOT_COUNT];
    live[0] = 10;
    live[2] = 1;
    shelf.report(&live).await;

    assert_eq!(shelf.state.taken_quantity().await, [0; SLOT_COUNT]);
    assert!(!shelf.state.tracking().await.is_tracking);
}

#[tokio::test]
async fn test_badge_rejected_while_unit_disconnected() {
    let shelf = Shelf::new([5; SLOT_COUNT]);
    shelf.state.set_connection(LoadcellUnit::Unit1, true);

    let outcome = shelf.modes.submit_badge_scan(STAFF_BADGE).await.unwrap();
    assert_eq!(
        outcome,
        BadgeOutcome::Rejected(RejectReason::UnitDisconnected(LoadcellUnit::Unit2))
    );
    assert_eq!(shelf.state.mode().await, ShelfMode::Added);
    assert_eq!(shelf.audio.cues(), vec![Cue::DeviceNotConnected]);
}

#[tokio::test]
async fn test_unknown_badge_rejected() {
    let shelf = Shelf::new([5; SLOT_COUNT]);
    shelf.connect_all();

    let outcome = shelf.modes.submit_badge_scan("not-staff").await.unwrap();
    assert_eq!(outcome, BadgeOutcome::Rejected(RejectReason::UnknownBadge));
    assert_eq!(shelf.state.mode().await, ShelfMode::Added);
    assert_eq!(shelf.audio.cues(), vec![Cue::BadgeUnknown]);
}

#[tokio::test]
async fn test_override_only_for_sensor_errors() {
    let shelf = Shelf::new([5; SLOT_COUNT]);
    let mut live = [5; SLOT_COUNT];
    live[2] = 200;
    live[3] = 222;
    live[4] = 255;
    shelf.report(&live).await;

    assert!(matches!(
        shelf.state.set_manual_override(2, 1).await,
        Err(Error::OverrideRejected { slot: 2, .. })
    ));
    assert!(matches!(
        shelf.state.set_manual_override(3, 1).await,
        Err(Error::OverrideRejected { slot: 3, .. })
    ));
    shelf.state.set_manual_override(4, 2).await.unwrap();
    assert!(matches!(
        shelf.state.set_manual_override(SLOT_COUNT, 1).await,
        Err(Error::InvalidSlot(_))
    ));

    let cart = smartshelf::cart::current_cart(&shelf.state).await;
    assert_eq!(cart.len(), 1);
    assert_eq!(cart[0].position, 4);
    assert_eq!(cart[0].quantity, 2);
    assert!(cart[0].manual);
}

#[tokio::test]
async fn test_departure_forces_one_unpaid_order() {
    let shelf = Shelf::new([5; SLOT_COUNT]);
    let mut live = [5; SLOT_COUNT];
    live[0] = 3;
    live[14] = 4;
    shelf.report(&live).await;
    let mut expected_taken = [0; SLOT_COUNT];
    expected_taken[0] = 2;
    expected_taken[14] = 1;
    assert_eq!(shelf.state.taken_quantity().await, expected_taken);

    shelf.presence.set(false);
    let mut watchdog = DepartureWatchdog::new(
        "shelf-test".to_string(),
        WatchdogConfig::default(),
        shelf.state.clone(),
        shelf.presence.clone(),
        shelf.orders.clone(),
        shelf.audio.clone(),
    );

    let mut actions = Vec::new();
    for _ in 0..150 {
        actions.push(watchdog.tick().await);
    }

    assert_eq!(actions.iter().filter(|a| **a == WatchdogAction::ForceCheckout).count(), 1);
    assert_eq!(actions[99], WatchdogAction::ForceCheckout);
    assert!(actions[100..].iter().all(|a| *a == WatchdogAction::Idle));

    let orders = shelf.orders.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].status, OrderStatus::Unpaid);
    // 2 x 10_000 (slot 0) + 1 x 150_000 (slot 14)
    assert_eq!(orders[0].total_bill, 170_000);

    assert!(shelf.state.take_payment_verified().await);
    assert!(!shelf.state.take_payment_verified().await);
    assert!(shelf.state.take_unpaid_warning().await);
}

#[tokio::test]
async fn test_departure_bills_taken_at_list_price() {
    let shelf = Shelf::new([5; SLOT_COUNT]);
    let mut catalog = helpers::test_catalog();
    catalog.products[0].discount = 10;
    shelf.state.set_catalog(catalog).await;

    // Staff override on a failed loadcell is not part of the forced settlement
    let mut live = [5; SLOT_COUNT];
    live[0] = 3;
    live[4] = 255;
    shelf.report(&live).await;
    shelf.state.set_manual_override(4, 3).await.unwrap();

    shelf.presence.set(false);
    let mut watchdog = DepartureWatchdog::new(
        "shelf-test".to_string(),
        WatchdogConfig::default(),
        shelf.state.clone(),
        shelf.presence.clone(),
        shelf.orders.clone(),
        shelf.audio.clone(),
    );
    for _ in 0..100 {
        watchdog.tick().await;
    }

    let orders = shelf.orders.orders();
    assert_eq!(orders.len(), 1);
    // 2 x 10_000, discount ignored
    assert_eq!(orders[0].total_bill, 20_000);
    assert_eq!(orders[0].order_details.len(), 1);
    assert_eq!(orders[0].order_details[0].price, 10_000);
}

#[tokio::test]
async fn test_payment_commit_clears_cart() {
    let shelf = Shelf::new([5; SLOT_COUNT]);
    let mut live = [5; SLOT_COUNT];
    live[1] = 3;
    shelf.report(&live).await;

    // 2 x 20_000
    assert!(matches!(
        shelf.checkout.confirm_payment(39_999, None).await,
        Err(Error::BadRequest(_))
    ));
    assert_eq!(shelf.checkout.confirm_payment(40_000, None).await.unwrap(), 40_000);
    assert!(matches!(
        shelf.checkout.confirm_payment(40_000, None).await,
        Err(Error::BadRequest(_))
    ));

    assert!(shelf.state.take_payment_verified().await);
    shelf.checkout.complete_payment().await.unwrap();

    assert_eq!(shelf.state.taken_quantity().await, [0; SLOT_COUNT]);
    assert_eq!(shelf.state.verified_quantity().await, live);
    assert!(!shelf.state.tracking().await.is_tracking);
    assert_eq!(BaselineStore::new(shelf.snapshot_path()).load(), live);

    helpers::eventually(|| shelf.orders.orders().len() == 1).await;
    assert_eq!(shelf.orders.orders()[0].status, OrderStatus::Paid);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_payment_confirmations_accept_one() {
    for _ in 0..50 {
        let shelf = Shelf::new([5; SLOT_COUNT]);
        let mut live = [5; SLOT_COUNT];
        live[1] = 3;
        shelf.report(&live).await;

        let first = shelf.checkout.clone();
        let second = shelf.checkout.clone();
        let (a, b) = tokio::join!(
            tokio::spawn(async move { first.confirm_payment(40_000, None).await }),
            tokio::spawn(async move { second.confirm_payment(40_000, None).await }),
        );
        let accepted = [a.unwrap(), b.unwrap()].iter().filter(|r| r.is_ok()).count();
        assert_eq!(accepted, 1);

        helpers::eventually(|| !shelf.orders.orders().is_empty()).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(shelf.orders.orders().len(), 1);
    }
}

#[tokio::test]
async fn test_commits_are_serialized() {
    let shelf = Arc::new(Shelf::new([5; SLOT_COUNT]));
    shelf.connect_all();
    shelf.state.set_mode(ShelfMode::Adding).await;
    let mut live = [6; SLOT_COUNT];
    live[0] = 1;
    shelf.report(&live).await;

    let (restock, payment) = tokio::join!(
        shelf.modes.submit_badge_scan(STAFF_BADGE),
        shelf.checkout.complete_payment(),
    );
    restock.unwrap();
    payment.unwrap();

    assert_eq!(shelf.state.verified_quantity().await, live);
    assert_eq!(BaselineStore::new(shelf.snapshot_path()).load(), live);
}

#[tokio::test]
async fn test_badge_reader_submits_each_line() {
    let shelf = Shelf::new([5; SLOT_COUNT]);
    shelf.connect_all();
    let reader = BadgeReader::new(None, shelf.modes.clone());

    let input = format!("\n  {}\r\nunknown\n", STAFF_BADGE);
    let result = reader.read_from(input.as_bytes()).await;

    assert!(matches!(result, Err(Error::Disconnected(_))));
    assert_eq!(shelf.state.mode().await, ShelfMode::Adding);
    assert!(shelf.audio.cues().contains(&Cue::BadgeUnknown));
}
