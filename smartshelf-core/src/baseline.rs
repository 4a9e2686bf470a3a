//! Verified-quantity persistence and the baseline commit owner
//!
//! The baseline snapshot is a single JSON document:
//!
//! ```json
//! {"name": "verified_quantity", "values": [5, 0, 3, ...]}
//! ```
//!
//! It is rewritten by writing a sibling temp file and renaming it over the
//! original, so a crash mid-write leaves the previous snapshot intact.
//!
//! Restock commits and payment commits both go through one
//! [`BaselineCommitter`] task; requests are handled strictly one at a time,
//! so compute-then-persist never interleaves between the two paths.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use smartshelf_common::slots::{SlotVector, SLOT_COUNT};
use smartshelf_common::ShelfEvent;

use crate::error::{Error, Result};
use crate::state::SharedState;

const SNAPSHOT_NAME: &str = "verified_quantity";

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    name: String,
    values: Vec<u32>,
}

/// Reads and writes the verified-quantity snapshot file
#[derive(Debug, Clone)]
pub struct BaselineStore {
    path: PathBuf,
}

impl BaselineStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted baseline
    ///
    /// A missing or unreadable snapshot yields all zeros; a short vector is
    /// zero-padded.
    pub fn load(&self) -> SlotVector {
        let mut verified = [0; SLOT_COUNT];
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("No baseline snapshot at {}: {}; starting from zero", self.path.display(), e);
                return verified;
            }
        };
        match serde_json::from_str::<Snapshot>(&contents) {
            Ok(snapshot) => {
                for (slot, value) in snapshot.values.into_iter().take(SLOT_COUNT).enumerate() {
                    verified[slot] = value;
                }
                info!("Loaded baseline from {}: {:?}", self.path.display(), verified);
            }
            Err(e) => {
                warn!("Malformed baseline snapshot {}: {}; starting from zero", self.path.display(), e);
            }
        }
        verified
    }

    /// Atomically replace the snapshot file
    pub async fn save(&self, verified: &SlotVector) -> Result<()> {
        let snapshot = Snapshot {
            name: SNAPSHOT_NAME.to_string(),
            values: verified.to_vec(),
        };
        let json = serde_json::to_vec_pretty(&snapshot)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| Error::Persistence(format!("{}: {}", parent.display(), e)))?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| Error::Persistence(format!("{}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| Error::Persistence(format!("{}: {}", self.path.display(), e)))?;

        debug!("Baseline persisted to {}", self.path.display());
        Ok(())
    }
}

/// What triggered a baseline commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitReason {
    /// Staff left restock mode
    Restock { badge_id: String },
    /// Payment confirmed or checkout forced; taken quantities reset
    Payment,
}

/// Result of one baseline commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub previous: SlotVector,
    pub verified: SlotVector,
    /// False when the snapshot file could not be written
    pub persisted: bool,
}

struct CommitRequest {
    reason: CommitReason,
    reply: oneshot::Sender<CommitOutcome>,
}

/// Handle to the single task that owns baseline commits
#[derive(Clone)]
pub struct BaselineCommitter {
    tx: mpsc::Sender<CommitRequest>,
}

impl BaselineCommitter {
    /// Spawn the commit task
    pub fn spawn(state: Arc<SharedState>, store: BaselineStore) -> Self {
        let (tx, mut rx) = mpsc::channel::<CommitRequest>(16);

        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                let outcome = run_commit(&state, &store, &request.reason).await;
                // Requester may have given up; the commit stands regardless
                let _ = request.reply.send(outcome);
            }
            debug!("Baseline committer stopped");
        });

        Self { tx }
    }

    /// Commit the live weights as the new baseline and persist it
    pub async fn commit(&self, reason: CommitReason) -> Result<CommitOutcome> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(CommitRequest { reason, reply })
            .await
            .map_err(|_| Error::Internal("baseline committer stopped".to_string()))?;
        rx.await
            .map_err(|_| Error::Internal("baseline committer dropped the request".to_string()))
    }
}

async fn run_commit(state: &SharedState, store: &BaselineStore, reason: &CommitReason) -> CommitOutcome {
    let previous = state.verified_quantity().await;
    let verified = state.commit_live_as_baseline(*reason == CommitReason::Payment).await;

    let persisted = match store.save(&verified).await {
        Ok(()) => true,
        Err(e) => {
            error!("Baseline snapshot NOT persisted, restart will lose it: {}", e);
            state.broadcast_event(ShelfEvent::PersistenceFailed {
                message: e.to_string(),
                timestamp: Utc::now(),
            });
            false
        }
    };

    // Overrides belong to the cart that just got settled
    state.clear_overrides().await;

    let event = match reason {
        CommitReason::Restock { badge_id } => {
            info!("Restock committed by {}: {:?} -> {:?}", badge_id, previous, verified);
            ShelfEvent::RestockCommitted {
                verified_quantity: verified,
                timestamp: Utc::now(),
            }
        }
        CommitReason::Payment => {
            info!("Payment committed: {:?} -> {:?}", previous, verified);
            ShelfEvent::PaymentCompleted {
                verified_quantity: verified,
                timestamp: Utc::now(),
            }
        }
    };
    state.broadcast_event(event);

    CommitOutcome {
        previous,
        verified,
        persisted,
    }
}
