//! Event types for the shelf change-notification feed
//!
//! Every observable state change is published as a `ShelfEvent` on a
//! broadcast channel and can be serialized for SSE transmission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::slots::{LoadcellUnit, ShelfMode, SlotVector};

/// Shelf event types
///
/// Tagged by `type` when serialized so browser clients can dispatch on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ShelfEvent {
    /// Taken quantities, derived cart and slot error codes
    ///
    /// Sent on every derivation write-back and by the backup poll.
    CartUpdate {
        taken_quantity: SlotVector,
        cart: Vec<CartLine>,
        error_codes: Vec<SlotErrorCode>,
        timestamp: DateTime<Utc>,
    },

    /// Loadcell data link status inferred by the health monitor
    ConnectionStatus {
        status: LinkStatus,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// BLE session to one loadcell unit established or dropped
    UnitConnection {
        unit: LoadcellUnit,
        connected: bool,
        timestamp: DateTime<Utc>,
    },

    /// Shelf mode toggled by an accepted badge scan
    ModeChanged {
        mode: ShelfMode,
        badge_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Badge scan refused; no state changed
    BadgeRejected {
        reason: RejectReason,
        timestamp: DateTime<Utc>,
    },

    /// Restock finished and a new baseline is active
    RestockCommitted {
        verified_quantity: SlotVector,
        timestamp: DateTime<Utc>,
    },

    /// Payment (or forced checkout) committed the live weights as baseline
    PaymentCompleted {
        verified_quantity: SlotVector,
        timestamp: DateTime<Utc>,
    },

    /// Baseline snapshot could not be written to disk
    PersistenceFailed {
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Lean or shake detected by the environmental sensor
    ShelfAlarm {
        kind: AlarmKind,
        timestamp: DateTime<Utc>,
    },

    /// Voice command received from the voice sensor
    VoiceCommand {
        command: String,
        intent: VoiceIntent,
        timestamp: DateTime<Utc>,
    },

    /// Customer left without paying (escalation before the forced checkout)
    DepartureWarning {
        consecutive_misses: u32,
        timestamp: DateTime<Utc>,
    },

    /// Customer left without paying; unpaid order posted
    UnpaidCheckout {
        order_code: String,
        total_bill: u64,
        timestamp: DateTime<Utc>,
    },
}

impl ShelfEvent {
    /// Event name used for the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            ShelfEvent::CartUpdate { .. } => "CartUpdate",
            ShelfEvent::ConnectionStatus { .. } => "ConnectionStatus",
            ShelfEvent::UnitConnection { .. } => "UnitConnection",
            ShelfEvent::ModeChanged { .. } => "ModeChanged",
            ShelfEvent::BadgeRejected { .. } => "BadgeRejected",
            ShelfEvent::RestockCommitted { .. } => "RestockCommitted",
            ShelfEvent::PaymentCompleted { .. } => "PaymentCompleted",
            ShelfEvent::PersistenceFailed { .. } => "PersistenceFailed",
            ShelfEvent::ShelfAlarm { .. } => "ShelfAlarm",
            ShelfEvent::VoiceCommand { .. } => "VoiceCommand",
            ShelfEvent::DepartureWarning { .. } => "DepartureWarning",
            ShelfEvent::UnpaidCheckout { .. } => "UnpaidCheckout",
        }
    }
}

/// One line of the live cart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    /// Slot index the item was taken from
    pub position: usize,
    pub quantity: u32,
    pub product_id: String,
    pub product_name: String,
    /// Unit price after discount
    pub price: u64,
    pub original_price: u64,
    /// Percent discount (0-100)
    pub discount: u32,
    pub line_total: u64,
    pub img_url: Option<String>,
    /// Quantity entered by staff for a failed loadcell
    pub manual: bool,
}

/// Error class of a sentinel slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotErrorKind {
    /// 200/222: item must be physically repositioned
    PlacementError,
    /// 255: loadcell failed; staff may enter the quantity manually
    LoadcellError,
}

/// Sentinel reading surfaced to the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotErrorCode {
    pub position: usize,
    pub code: u32,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: SlotErrorKind,
    pub allow_manual_control: bool,
}

/// Inferred loadcell data link status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Connecting,
    Connected,
    Lost,
}

/// Why a badge scan was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Badge not on the allow-list
    UnknownBadge,
    /// A loadcell unit has no established session
    UnitDisconnected(LoadcellUnit),
}

/// Anomaly detected by the orientation sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmKind {
    Lean,
    Shake,
}

/// Action a voice command maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceIntent {
    ShowCombos,
    Checkout,
    EmptyCart,
    ShowShelf,
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = ShelfEvent::ModeChanged {
            mode: ShelfMode::Adding,
            badge_id: "0001529685".to_string(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ModeChanged");
        assert_eq!(json["mode"], "ADDING");
        assert_eq!(event.event_type(), "ModeChanged");
    }

    #[test]
    fn test_error_code_kind_renamed_to_type() {
        let code = SlotErrorCode {
            position: 3,
            code: 222,
            message: "Product at position 3 not placed correctly".to_string(),
            kind: SlotErrorKind::PlacementError,
            allow_manual_control: false,
        };
        let json = serde_json::to_value(&code).unwrap();
        assert_eq!(json["type"], "placement_error");
        assert_eq!(json["allow_manual_control"], false);
    }
}
