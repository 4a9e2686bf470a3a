//! External collaborators of the shelf core
//!
//! Cloud catalog, order sink, audio output and the presence signal are
//! consumed through these traits. Concrete adapters live in the submodules.

pub mod audio;
pub mod cloud;
pub mod presence;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use smartshelf_common::slots::{LoadcellUnit, SlotVector};

use crate::catalog::Catalog;
use crate::error::Result;

pub use audio::{LogAudio, ProcessAudio};
pub use cloud::CloudClient;
pub use presence::SharedPresence;

/// Product catalog and badge allow-list source
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Current products, cloud first with cached fallback
    async fn products(&self) -> Result<Catalog>;

    /// Staff badge ids, cloud first with cached fallback
    async fn badge_allow_list(&self) -> Result<Vec<String>>;

    /// Refresh combos and slideshow posters for the UI (best effort)
    async fn refresh_auxiliary(&self) -> Result<()>;
}

/// Order and audit collector
#[async_trait]
pub trait OrderSink: Send + Sync {
    async fn post_order(&self, order: &Order) -> Result<()>;

    async fn post_restock_audit(&self, audit: &RestockAudit) -> Result<()>;
}

/// Fire-and-forget audio output; implementations must return immediately
pub trait AudioSink: Send + Sync {
    fn play(&self, cue: Cue);

    fn speak(&self, text: &str);
}

/// "Person present in front of the shelf" signal
pub trait PresenceSignal: Send + Sync {
    fn is_person_present(&self) -> bool;
}

/// Audible cues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    UnitConnected(LoadcellUnit),
    SensorConnected,
    DeviceNotConnected,
    BadgeUnknown,
    RestockStarted,
    RestockCommitted,
    PlacementError,
    SensorError,
    LeanAlarm,
    ShakeAlarm,
    DepartureWarning,
    UnpaidCheckout,
    PaymentCompleted,
}

impl Cue {
    /// Sound file name under the sounds folder
    pub fn file_name(self) -> &'static str {
        match self {
            Cue::UnitConnected(LoadcellUnit::Unit1) => "connect-loadcell-1.mp3",
            Cue::UnitConnected(LoadcellUnit::Unit2) => "connect-loadcell-2.mp3",
            Cue::SensorConnected => "connect-sensor.mp3",
            Cue::DeviceNotConnected => "device-not-connected.mp3",
            Cue::BadgeUnknown => "rfid-invalid.mp3",
            Cue::RestockStarted => "adding-mode.mp3",
            Cue::RestockCommitted => "added-mode.mp3",
            Cue::PlacementError => "placement-error.mp3",
            Cue::SensorError => "loadcell-error.mp3",
            Cue::LeanAlarm => "imu_alert.mp3",
            Cue::ShakeAlarm => "imu_alert_2.mp3",
            Cue::DepartureWarning => "unpaid-warning.mp3",
            Cue::UnpaidCheckout => "unpaid-order.mp3",
            Cue::PaymentCompleted => "payment-success.mp3",
        }
    }
}

/// Settlement status of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Paid,
    Unpaid,
}

/// One product line of an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: String,
    pub quantity: u32,
    pub price: u64,
    pub total_price: u64,
}

/// Order posted to the cloud order collector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub status: OrderStatus,
    pub order_code: String,
    pub shelf_id: String,
    pub total_bill: u64,
    #[serde(rename = "orderDetails")]
    pub order_details: Vec<OrderLine>,
}

/// Restock history record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestockAudit {
    pub shelf_id: String,
    pub user_rfid: String,
    pub pre_products: Vec<String>,
    pub post_products: Vec<String>,
    pub pre_verified_quantity: SlotVector,
    pub post_verified_quantity: SlotVector,
}
