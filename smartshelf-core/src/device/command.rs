//! Outbound loadcell commands
//!
//! Each command kind carries its own payload and knows which characteristic
//! it goes to, so a name table can never be written to the price
//! characteristic.

use uuid::Uuid;

use smartshelf_common::slots::{LoadcellUnit, ShelfMode};

use crate::catalog::Catalog;
use crate::config::LoadcellConfig;

/// Command for one loadcell unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadcellCommand {
    /// Per-slot weight of one item (weight / 3)
    SetUnitWeights(Vec<u8>),
    /// `;`-joined ASCII product names
    SetProductNames(Vec<u8>),
    /// Per-slot price in thousands
    SetProductPrices(Vec<u8>),
    /// Enter restock mode (1) or commit counts and return to retail (0)
    CommitMode(ShelfMode),
}

impl LoadcellCommand {
    /// Target characteristic
    pub fn characteristic(&self, config: &LoadcellConfig) -> Uuid {
        match self {
            LoadcellCommand::SetUnitWeights(_) => config.weight_uuid,
            LoadcellCommand::SetProductNames(_) => config.product_name_uuid,
            LoadcellCommand::SetProductPrices(_) => config.product_price_uuid,
            LoadcellCommand::CommitMode(_) => config.save_quantity_uuid,
        }
    }

    /// Bytes written to the characteristic
    pub fn payload(&self) -> Vec<u8> {
        match self {
            LoadcellCommand::SetUnitWeights(bytes)
            | LoadcellCommand::SetProductNames(bytes)
            | LoadcellCommand::SetProductPrices(bytes) => bytes.clone(),
            LoadcellCommand::CommitMode(mode) => vec![mode.device_flag()],
        }
    }

    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            LoadcellCommand::SetUnitWeights(_) => "unit_weights",
            LoadcellCommand::SetProductNames(_) => "product_names",
            LoadcellCommand::SetProductPrices(_) => "product_prices",
            LoadcellCommand::CommitMode(_) => "commit_mode",
        }
    }

    /// Catalog tables for one unit, in write order
    pub fn catalog_tables(catalog: &Catalog, unit: LoadcellUnit) -> Vec<LoadcellCommand> {
        vec![
            LoadcellCommand::SetUnitWeights(catalog.unit_weights(unit)),
            LoadcellCommand::SetProductNames(catalog.unit_names(unit)),
            LoadcellCommand::SetProductPrices(catalog.unit_prices(unit)),
        ]
    }
}
