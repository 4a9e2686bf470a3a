//! btleplug GATT backend (feature `ble`)

use async_trait::async_trait;
use btleplug::api::{Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::stream::BoxStream;
use futures::StreamExt;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use super::{BleConnector, BleSession};
use crate::error::{Error, Result};

const SCAN_POLL: Duration = Duration::from_millis(500);

fn transport(e: btleplug::Error) -> Error {
    Error::Transport(e.to_string())
}

/// Connects through the first system Bluetooth adapter
pub struct BtleConnector {
    adapter: Adapter,
}

impl BtleConnector {
    pub async fn new() -> Result<Self> {
        let manager = Manager::new().await.map_err(transport)?;
        let adapter = manager
            .adapters()
            .await
            .map_err(transport)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Transport("no Bluetooth adapter found".to_string()))?;
        adapter.start_scan(ScanFilter::default()).await.map_err(transport)?;
        info!("Bluetooth adapter ready, scanning");
        Ok(Self { adapter })
    }

    async fn find(&self, address: &str) -> Result<Peripheral> {
        loop {
            for peripheral in self.adapter.peripherals().await.map_err(transport)? {
                if peripheral.address().to_string().eq_ignore_ascii_case(address) {
                    return Ok(peripheral);
                }
            }
            tokio::time::sleep(SCAN_POLL).await;
        }
    }
}

#[async_trait]
impl BleConnector for BtleConnector {
    async fn connect(&self, address: &str) -> Result<Box<dyn BleSession>> {
        let peripheral = self.find(address).await?;
        debug!("Found {}, connecting", address);
        peripheral.connect().await.map_err(transport)?;
        peripheral.discover_services().await.map_err(transport)?;
        Ok(Box::new(BtleSession { peripheral }))
    }
}

struct BtleSession {
    peripheral: Peripheral,
}

impl BtleSession {
    fn characteristic(&self, uuid: Uuid) -> Result<Characteristic> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid)
            .ok_or_else(|| Error::Transport(format!("characteristic {} not found", uuid)))
    }
}

#[async_trait]
impl BleSession for BtleSession {
    async fn subscribe(&self, characteristic: Uuid) -> Result<BoxStream<'static, Vec<u8>>> {
        let target = self.characteristic(characteristic)?;
        self.peripheral.subscribe(&target).await.map_err(transport)?;
        let stream = self.peripheral.notifications().await.map_err(transport)?;
        Ok(stream
            .filter_map(move |n| async move { (n.uuid == characteristic).then_some(n.value) })
            .boxed())
    }

    async fn write(&self, characteristic: Uuid, payload: &[u8]) -> Result<()> {
        let target = self.characteristic(characteristic)?;
        self.peripheral
            .write(&target, payload, WriteType::WithResponse)
            .await
            .map_err(transport)
    }

    async fn read(&self, characteristic: Uuid) -> Result<Vec<u8>> {
        let target = self.characteristic(characteristic)?;
        self.peripheral.read(&target).await.map_err(transport)
    }

    async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    async fn disconnect(&self) -> Result<()> {
        self.peripheral.disconnect().await.map_err(transport)
    }
}
