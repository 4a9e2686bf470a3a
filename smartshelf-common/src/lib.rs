//! # Smart Shelf Common Library
//!
//! Shared vocabulary for the smart shelf service:
//! - Slot layout constants and the `SlotVector` type
//! - Loadcell sentinel classification
//! - Shelf mode (restocking vs. retail)
//! - Change-notification events (`ShelfEvent`)
//! - Configuration file resolution

pub mod config;
pub mod error;
pub mod events;
pub mod slots;

pub use error::{Error, Result};
pub use events::ShelfEvent;
pub use slots::{ShelfMode, SlotReading, SlotVector, SLOT_COUNT};
