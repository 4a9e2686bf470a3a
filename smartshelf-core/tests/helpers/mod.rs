//! Test helpers for smart shelf integration tests
//!
//! Provides reusable test infrastructure:
//! - MockConnector/SessionHandle: in-memory BLE peripherals driven by the test
//! - RecordingOrders/RecordingAudio/StaticCatalog: collaborator fakes
//! - Shelf: a fully wired core (state, committer, queues, mode, checkout)

#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

use smartshelf::baseline::{BaselineCommitter, BaselineStore};
use smartshelf::catalog::{Catalog, Product};
use smartshelf::checkout::Checkout;
use smartshelf::collaborators::{
    AudioSink, CatalogProvider, Cue, Order, OrderSink, RestockAudit, SharedPresence,
};
use smartshelf::device::{BleConnector, BleSession, UnitQueues};
use smartshelf::error::{Error, Result};
use smartshelf::fanout::Fanout;
use smartshelf::mode::ModeController;
use smartshelf::SharedState;
use smartshelf_common::slots::{LoadcellUnit, SlotVector};

// ============================================================================
// BLE fakes
// ============================================================================

/// Test-side controls of one fake GATT session
pub struct SessionHandle {
    /// Push a notification frame; drop to end the session
    pub notify: mpsc::UnboundedSender<Vec<u8>>,
    /// Every successful write, in order
    pub writes: mpsc::UnboundedReceiver<(Uuid, Vec<u8>)>,
    /// Fail the next write (and only that one)
    pub fail_next_write: Arc<AtomicBool>,
    pub connected: Arc<AtomicBool>,
}

impl SessionHandle {
    /// Wait for the next successful write
    pub async fn next_write(&mut self) -> (Uuid, Vec<u8>) {
        tokio::time::timeout(Duration::from_secs(5), self.writes.recv())
            .await
            .expect("no write within 5s")
            .expect("session dropped")
    }
}

struct MockSession {
    notifications: Mutex<Option<mpsc::UnboundedReceiver<Vec<u8>>>>,
    writes: mpsc::UnboundedSender<(Uuid, Vec<u8>)>,
    fail_next_write: Arc<AtomicBool>,
    connected: Arc<AtomicBool>,
    reads: HashMap<Uuid, Vec<u8>>,
}

#[async_trait]
impl BleSession for MockSession {
    async fn subscribe(&self, _characteristic: Uuid) -> Result<BoxStream<'static, Vec<u8>>> {
        let rx = self
            .notifications
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| Error::Transport("already subscribed".to_string()))?;
        Ok(UnboundedReceiverStream::new(rx).boxed())
    }

    async fn write(&self, characteristic: Uuid, payload: &[u8]) -> Result<()> {
        if self.fail_next_write.swap(false, Ordering::SeqCst) {
            return Err(Error::Transport("injected write failure".to_string()));
        }
        let _ = self.writes.send((characteristic, payload.to_vec()));
        Ok(())
    }

    async fn read(&self, characteristic: Uuid) -> Result<Vec<u8>> {
        self.reads
            .get(&characteristic)
            .cloned()
            .ok_or_else(|| Error::Transport(format!("no value for {}", characteristic)))
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Connector handing out pre-registered sessions per address
#[derive(Default)]
pub struct MockConnector {
    sessions: Mutex<HashMap<String, VecDeque<MockSession>>>,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register the next session for `address`
    pub fn add_session(&self, address: &str) -> SessionHandle {
        self.add_session_with_reads(address, HashMap::new())
    }

    /// Register a session whose characteristic reads return fixed values
    pub fn add_session_with_reads(&self, address: &str, reads: HashMap<Uuid, Vec<u8>>) -> SessionHandle {
        let (notify, notifications) = mpsc::unbounded_channel();
        let (writes_tx, writes) = mpsc::unbounded_channel();
        let fail_next_write = Arc::new(AtomicBool::new(false));
        let connected = Arc::new(AtomicBool::new(true));
        let session = MockSession {
            notifications: Mutex::new(Some(notifications)),
            writes: writes_tx,
            fail_next_write: fail_next_write.clone(),
            connected: connected.clone(),
            reads,
        };
        self.sessions
            .lock()
            .unwrap()
            .entry(address.to_string())
            .or_default()
            .push_back(session);
        SessionHandle {
            notify,
            writes,
            fail_next_write,
            connected,
        }
    }
}

#[async_trait]
impl BleConnector for MockConnector {
    async fn connect(&self, address: &str) -> Result<Box<dyn BleSession>> {
        let session = self
            .sessions
            .lock()
            .unwrap()
            .get_mut(address)
            .and_then(|queue| queue.pop_front());
        match session {
            Some(session) => Ok(Box::new(session)),
            None => Err(Error::Transport(format!("{} not advertising", address))),
        }
    }
}

// ============================================================================
// Collaborator fakes
// ============================================================================

#[derive(Default)]
pub struct RecordingOrders {
    pub orders: Mutex<Vec<Order>>,
    pub audits: Mutex<Vec<RestockAudit>>,
}

impl RecordingOrders {
    pub fn orders(&self) -> Vec<Order> {
        self.orders.lock().unwrap().clone()
    }

    pub fn audits(&self) -> Vec<RestockAudit> {
        self.audits.lock().unwrap().clone()
    }
}

#[async_trait]
impl OrderSink for RecordingOrders {
    async fn post_order(&self, order: &Order) -> Result<()> {
        self.orders.lock().unwrap().push(order.clone());
        Ok(())
    }

    async fn post_restock_audit(&self, audit: &RestockAudit) -> Result<()> {
        self.audits.lock().unwrap().push(audit.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingAudio {
    pub cues: Mutex<Vec<Cue>>,
    pub spoken: Mutex<Vec<String>>,
}

impl RecordingAudio {
    pub fn cues(&self) -> Vec<Cue> {
        self.cues.lock().unwrap().clone()
    }
}

impl AudioSink for RecordingAudio {
    fn play(&self, cue: Cue) {
        self.cues.lock().unwrap().push(cue);
    }

    fn speak(&self, text: &str) {
        self.spoken.lock().unwrap().push(text.to_string());
    }
}

/// Catalog provider that never touches the network
pub struct StaticCatalog {
    pub catalog: Catalog,
    pub badges: Vec<String>,
}

#[async_trait]
impl CatalogProvider for StaticCatalog {
    async fn products(&self) -> Result<Catalog> {
        Ok(self.catalog.clone())
    }

    async fn badge_allow_list(&self) -> Result<Vec<String>> {
        Ok(self.badges.clone())
    }

    async fn refresh_auxiliary(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Wired core
// ============================================================================

pub const STAFF_BADGE: &str = "0012345678";

/// One product per slot, priced 10_000 * (slot + 1)
pub fn test_catalog() -> Catalog {
    Catalog::new(
        (0..smartshelf_common::SLOT_COUNT)
            .map(|slot| Product {
                product_id: format!("p{}", slot),
                product_name: format!("Product {}", slot),
                price: 10_000 * (slot as u64 + 1),
                weight: 300,
                discount: 0,
                img_url: None,
            })
            .collect(),
    )
}

/// Core components wired the way `main` wires them, minus device tasks
pub struct Shelf {
    pub dir: TempDir,
    pub state: Arc<SharedState>,
    pub queues: UnitQueues,
    pub fanout: Fanout,
    pub modes: ModeController,
    pub checkout: Checkout,
    pub presence: Arc<SharedPresence>,
    pub orders: Arc<RecordingOrders>,
    pub audio: Arc<RecordingAudio>,
}

impl Shelf {
    pub fn new(verified: SlotVector) -> Self {
        Self::with_enqueue_wait(verified, Duration::from_millis(200))
    }

    pub fn with_enqueue_wait(verified: SlotVector, enqueue_wait: Duration) -> Self {
        let dir = TempDir::new().unwrap();
        let state = Arc::new(SharedState::new(verified, test_catalog(), vec![STAFF_BADGE.to_string()]));
        let committer = BaselineCommitter::spawn(state.clone(), BaselineStore::new(dir.path().join("loadcell.json")));
        let queues = UnitQueues::new(enqueue_wait);
        let audio = Arc::new(RecordingAudio::default());
        let orders = Arc::new(RecordingOrders::default());
        let fanout = Fanout::new(state.clone(), audio.clone());
        let catalog = Arc::new(StaticCatalog {
            catalog: test_catalog(),
            badges: vec![STAFF_BADGE.to_string()],
        });
        let modes = ModeController::new(
            "shelf-test".to_string(),
            state.clone(),
            queues.clone(),
            committer.clone(),
            catalog,
            orders.clone(),
            audio.clone(),
            fanout.clone(),
            test_catalog().product_ids(),
        );
        let checkout = Checkout::new(
            "shelf-test".to_string(),
            state.clone(),
            committer,
            queues.clone(),
            fanout.clone(),
            orders.clone(),
            audio.clone(),
        );
        Self {
            dir,
            state,
            queues,
            fanout,
            modes,
            checkout,
            presence: Arc::new(SharedPresence::default()),
            orders,
            audio,
        }
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.path().join("loadcell.json")
    }

    pub fn connect_all(&self) {
        for unit in LoadcellUnit::ALL {
            self.state.set_connection(unit, true);
        }
    }

    /// Feed a full 15-slot live vector as two unit notifications
    pub async fn report(&self, live: &SlotVector) {
        let bytes: Vec<u8> = live.iter().map(|&v| v as u8).collect();
        for unit in LoadcellUnit::ALL {
            self.state.apply_unit_reading(unit, &bytes[unit.slots()]).await;
        }
    }
}

/// Poll `check` until it holds or 5s pass
pub async fn eventually<F>(mut check: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..500 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 5s");
}
