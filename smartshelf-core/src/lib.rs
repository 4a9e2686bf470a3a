//! # Smart Shelf Core Library (smartshelf)
//!
//! Sensor-state core of an unattended smart shelf.
//!
//! **Purpose:** Keep the per-slot weight readings of two BLE loadcell units,
//! derive what a customer has taken against the last trusted baseline, run
//! the restock (badge) state machine and the payment/departure checkout, and
//! push every change to the kiosk UI.
//!
//! **Architecture:** one shared state store behind async locks; one task per
//! device channel and per monitor loop; all baseline commits serialized
//! through a single committer task.

pub mod api;
pub mod badge_reader;
pub mod baseline;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod collaborators;
pub mod config;
pub mod derivation;
pub mod device;
pub mod environment;
pub mod error;
pub mod fanout;
pub mod mode;
pub mod state;
pub mod supervisor;
pub mod watchdog;

pub use error::{Error, Result};
pub use state::SharedState;
