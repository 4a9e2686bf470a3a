//! BLE device transport
//!
//! The shelf talks to its peripherals through two small traits so the
//! channels can run against any GATT backend: the btleplug backend behind the
//! `ble` feature in production, in-memory fakes in tests.
//!
//! Disconnects are not reliably reported by the transport. Channels treat a
//! closed notification stream, a failed write or `is_connected() == false`
//! as the end of a session; the fan-out health monitor covers the rest.

pub mod command;
pub mod loadcell;
pub mod queue;

#[cfg(feature = "ble")]
pub mod btle;

use async_trait::async_trait;
use futures::stream::BoxStream;
use uuid::Uuid;

use crate::error::Result;

pub use command::LoadcellCommand;
pub use loadcell::LoadcellChannel;
pub use queue::{CommandQueue, UnitQueues};

/// Opens sessions to peripherals by hardware address
#[async_trait]
pub trait BleConnector: Send + Sync {
    /// Locate and connect to a peripheral
    ///
    /// Callers bound this with their own connect timeout.
    async fn connect(&self, address: &str) -> Result<Box<dyn BleSession>>;
}

/// One established GATT session
#[async_trait]
pub trait BleSession: Send + Sync {
    /// Subscribe to notifications of one characteristic
    ///
    /// The stream ends when the session drops.
    async fn subscribe(&self, characteristic: Uuid) -> Result<BoxStream<'static, Vec<u8>>>;

    /// Write with response
    async fn write(&self, characteristic: Uuid, payload: &[u8]) -> Result<()>;

    async fn read(&self, characteristic: Uuid) -> Result<Vec<u8>>;

    async fn is_connected(&self) -> bool;

    async fn disconnect(&self) -> Result<()>;
}
