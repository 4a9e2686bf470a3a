//! Shelf slot layout and loadcell value classification
//!
//! The shelf has a fixed number of physical product slots split across two
//! BLE loadcell units. Unit 1 owns slots `[0, LOADCELL_NUM_1)`, unit 2 owns
//! `[LOADCELL_NUM_1, SLOT_COUNT)`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Slots served by loadcell unit 1
pub const LOADCELL_NUM_1: usize = 8;

/// Slots served by loadcell unit 2
pub const LOADCELL_NUM_2: usize = 7;

/// Total number of shelf slots
pub const SLOT_COUNT: usize = LOADCELL_NUM_1 + LOADCELL_NUM_2;

/// Reported when an item sits on the wrong slot
pub const PLACEMENT_WARNING_LOW: u32 = 200;

/// Reported when an item sits on the wrong slot (second firmware code)
pub const PLACEMENT_WARNING_HIGH: u32 = 222;

/// Reported when the loadcell hardware itself failed
pub const SENSOR_ERROR: u32 = 255;

/// Every loadcell value at or above this is reserved, never a quantity
pub const SENTINEL_FLOOR: u32 = 200;

/// One integer per slot, in slot order
pub type SlotVector = [u32; SLOT_COUNT];

/// Classified loadcell value for one slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotReading {
    /// Plausible item count
    Quantity(u32),
    /// Item misplaced (200 or 222); staff must fix it physically
    PlacementWarning(u32),
    /// Loadcell hardware failure (255); manual override allowed
    SensorError,
    /// Any other reserved value; treated as unusable
    Reserved(u32),
}

impl SlotReading {
    /// Classify a raw loadcell value
    pub fn classify(value: u32) -> Self {
        match value {
            PLACEMENT_WARNING_LOW | PLACEMENT_WARNING_HIGH => SlotReading::PlacementWarning(value),
            SENSOR_ERROR => SlotReading::SensorError,
            v if v >= SENTINEL_FLOOR => SlotReading::Reserved(v),
            v => SlotReading::Quantity(v),
        }
    }

    /// Quantity if the value is usable for subtraction
    pub fn quantity(self) -> Option<u32> {
        match self {
            SlotReading::Quantity(q) => Some(q),
            _ => None,
        }
    }
}

/// Shelf operating mode
///
/// ADDED is normal retail mode; ADDING is employee restocking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShelfMode {
    #[default]
    Added,
    Adding,
}

impl ShelfMode {
    /// Flag byte understood by the loadcell firmware
    pub fn device_flag(self) -> u8 {
        match self {
            ShelfMode::Added => 0,
            ShelfMode::Adding => 1,
        }
    }

    /// The other mode
    pub fn toggled(self) -> Self {
        match self {
            ShelfMode::Added => ShelfMode::Adding,
            ShelfMode::Adding => ShelfMode::Added,
        }
    }
}

impl fmt::Display for ShelfMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShelfMode::Added => write!(f, "ADDED"),
            ShelfMode::Adding => write!(f, "ADDING"),
        }
    }
}

/// Physical loadcell unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadcellUnit {
    Unit1,
    Unit2,
}

impl LoadcellUnit {
    pub const ALL: [LoadcellUnit; 2] = [LoadcellUnit::Unit1, LoadcellUnit::Unit2];

    /// Slots owned by this unit
    pub fn slots(self) -> Range<usize> {
        match self {
            LoadcellUnit::Unit1 => 0..LOADCELL_NUM_1,
            LoadcellUnit::Unit2 => LOADCELL_NUM_1..SLOT_COUNT,
        }
    }

    /// Index into per-unit arrays
    pub fn index(self) -> usize {
        match self {
            LoadcellUnit::Unit1 => 0,
            LoadcellUnit::Unit2 => 1,
        }
    }

    /// 1-based number used in logs and voice prompts
    pub fn number(self) -> u8 {
        self.index() as u8 + 1
    }
}

impl fmt::Display for LoadcellUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Loadcell_{}", self.number())
    }
}
