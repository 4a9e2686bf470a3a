//! Loadcell device channel
//!
//! One long-lived task per physical unit:
//!
//! ```text
//! Disconnected -> Connecting -> Subscribed -> Disconnected -> ...
//! ```
//!
//! While subscribed the task interleaves inbound weight notifications with
//! draining the unit's outbound command queue. Any transport error ends the
//! session; the channel waits the fixed backoff and reconnects, forever.

use chrono::Utc;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use smartshelf_common::slots::LoadcellUnit;
use smartshelf_common::ShelfEvent;

use super::queue::CommandQueue;
use super::{BleConnector, BleSession};
use crate::collaborators::{AudioSink, Cue};
use crate::config::LoadcellConfig;
use crate::error::{Error, Result};
use crate::fanout::Fanout;
use crate::state::SharedState;

/// Reconnecting session with one loadcell unit
pub struct LoadcellChannel {
    unit: LoadcellUnit,
    config: LoadcellConfig,
    connector: Arc<dyn BleConnector>,
    queue: Arc<CommandQueue>,
    state: Arc<SharedState>,
    fanout: Fanout,
    audio: Arc<dyn AudioSink>,
}

impl LoadcellChannel {
    pub fn new(
        unit: LoadcellUnit,
        config: LoadcellConfig,
        connector: Arc<dyn BleConnector>,
        queue: Arc<CommandQueue>,
        state: Arc<SharedState>,
        fanout: Fanout,
        audio: Arc<dyn AudioSink>,
    ) -> Self {
        Self {
            unit,
            config,
            connector,
            queue,
            state,
            fanout,
            audio,
        }
    }

    /// Run sessions forever with a fixed backoff between them
    pub async fn run(&self) -> Result<()> {
        loop {
            if let Err(e) = self.run_session().await {
                warn!("{}: session ended: {}", self.unit, e);
            }
            self.mark_disconnected();
            tokio::time::sleep(self.config.reconnect_backoff()).await;
        }
    }

    /// One connect-subscribe-serve cycle; returns when the session ends
    pub async fn run_session(&self) -> Result<()> {
        let address = self.config.address(self.unit).to_string();
        info!("{}: connecting to {}", self.unit, address);

        let session = tokio::time::timeout(self.config.connect_timeout(), self.connector.connect(&address))
            .await
            .map_err(|_| Error::Timeout(format!("connect to {}", address)))??;

        let result = self.serve(session.as_ref()).await;
        if let Err(e) = session.disconnect().await {
            debug!("{}: disconnect after session end: {}", self.unit, e);
        }
        result
    }

    async fn serve(&self, session: &dyn BleSession) -> Result<()> {
        let mut notifications = session.subscribe(self.config.notify_uuid).await?;

        self.state.set_connection(self.unit, true);
        self.state.broadcast_event(ShelfEvent::UnitConnection {
            unit: self.unit,
            connected: true,
            timestamp: Utc::now(),
        });
        self.audio.play(Cue::UnitConnected(self.unit));
        info!("{}: subscribed to weight notifications", self.unit);

        loop {
            tokio::select! {
                frame = notifications.next() => match frame {
                    Some(frame) => self.handle_notification(&frame).await,
                    None => return Err(Error::Disconnected(format!("{} notification stream closed", self.unit))),
                },
                pending = self.queue.next(self.config.queue_poll()) => match pending {
                    Some(pending) => {
                        let command = pending.command();
                        let characteristic = command.characteristic(&self.config);
                        let payload = command.payload();
                        let kind = command.kind();
                        let write = tokio::time::timeout(
                            self.config.write_timeout(),
                            session.write(characteristic, &payload),
                        )
                        .await;
                        match write {
                            Ok(Ok(())) => {
                                debug!("{}: wrote {} ({} bytes)", self.unit, kind, payload.len());
                                pending.complete();
                            }
                            Ok(Err(e)) => {
                                self.queue.requeue(pending).await;
                                return Err(e);
                            }
                            Err(_) => {
                                self.queue.requeue(pending).await;
                                return Err(Error::Timeout(format!("{} write of {}", self.unit, kind)));
                            }
                        }
                    }
                    None => {
                        if !session.is_connected().await {
                            return Err(Error::Disconnected(format!("{} link dropped", self.unit)));
                        }
                    }
                },
            }
        }
    }

    /// Write the unit's slots, rederive and publish
    pub async fn handle_notification(&self, frame: &[u8]) {
        trace!("{}: notification {:?}", self.unit, frame);
        let derivation = self.state.apply_unit_reading(self.unit, frame).await;
        self.fanout.on_derivation(&derivation).await;
    }

    fn mark_disconnected(&self) {
        if self.state.connection(self.unit) {
            self.state.set_connection(self.unit, false);
            self.state.broadcast_event(ShelfEvent::UnitConnection {
                unit: self.unit,
                connected: false,
                timestamp: Utc::now(),
            });
        }
    }
}
