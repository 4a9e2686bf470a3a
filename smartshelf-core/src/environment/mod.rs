//! Environmental and orientation sensor channel
//!
//! A second reconnecting BLE session with the combined sensor board. The
//! accelerometer is pushed as notifications and fed to the lean/shake
//! detectors; ambient values are polled one characteristic at a time.
//!
//! Reconnect policy: a fixed delay between attempts, and after
//! `max_retries` consecutive failed connects a longer pause before the
//! counter starts over.

pub mod anomaly;
pub mod voice;

use chrono::Utc;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use smartshelf_common::events::AlarmKind;
use smartshelf_common::ShelfEvent;

use crate::collaborators::{AudioSink, Cue};
use crate::config::SensorConfig;
use crate::device::{BleConnector, BleSession};
use crate::error::{Error, Result};
use crate::state::{AmbientKind, SharedState};

pub use anomaly::{ImuAnalyzer, ImuSample};
pub use voice::VoiceChannel;

/// Wire format of a polled ambient characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    U32,
    I16,
    U16,
}

/// Decode a little-endian ambient reading and apply its scale
fn decode_ambient(kind: AmbientKind, data: &[u8]) -> Option<f64> {
    let (format, scale) = match kind {
        AmbientKind::Pressure => (Format::U32, 1000.0),
        AmbientKind::Temperature => (Format::I16, 100.0),
        AmbientKind::Humidity => (Format::U16, 100.0),
        AmbientKind::Light => (Format::U32, 1.0),
        AmbientKind::Sound => (Format::U16, 1.0),
        AmbientKind::Magnetic => (Format::U32, 1.0),
    };
    let raw = match format {
        Format::U32 => f64::from(u32::from_le_bytes(data.try_into().ok()?)),
        Format::I16 => f64::from(i16::from_le_bytes(data.try_into().ok()?)),
        Format::U16 => f64::from(u16::from_le_bytes(data.try_into().ok()?)),
    };
    Some(raw / scale)
}

/// Reconnecting session with the environmental sensor board
pub struct EnvSensorChannel {
    config: SensorConfig,
    connector: Arc<dyn BleConnector>,
    state: Arc<SharedState>,
    audio: Arc<dyn AudioSink>,
    analyzer: Mutex<ImuAnalyzer>,
}

impl EnvSensorChannel {
    pub fn new(
        config: SensorConfig,
        connector: Arc<dyn BleConnector>,
        state: Arc<SharedState>,
        audio: Arc<dyn AudioSink>,
    ) -> Self {
        let analyzer = ImuAnalyzer::new(config.lean_threshold, config.shake_threshold);
        Self {
            config,
            connector,
            state,
            audio,
            analyzer: Mutex::new(analyzer),
        }
    }

    fn ambient_characteristics(&self) -> [(AmbientKind, Uuid); 6] {
        [
            (AmbientKind::Pressure, self.config.pressure_uuid),
            (AmbientKind::Temperature, self.config.temperature_uuid),
            (AmbientKind::Humidity, self.config.humidity_uuid),
            (AmbientKind::Light, self.config.light_uuid),
            (AmbientKind::Sound, self.config.sound_uuid),
            (AmbientKind::Magnetic, self.config.magnetic_uuid),
        ]
    }

    /// Connect and serve forever
    pub async fn run(&self) -> Result<()> {
        let mut failures = 0u32;
        loop {
            info!("Connecting to sensor board {}", self.config.address);
            let connect = tokio::time::timeout(
                self.config.connect_timeout(),
                self.connector.connect(&self.config.address),
            )
            .await;

            match connect {
                Ok(Ok(session)) => {
                    failures = 0;
                    if let Err(e) = self.serve(session.as_ref()).await {
                        warn!("Sensor session ended: {}", e);
                    }
                    if let Err(e) = session.disconnect().await {
                        debug!("Sensor disconnect: {}", e);
                    }
                }
                Ok(Err(e)) => {
                    failures += 1;
                    warn!("Sensor connect failed ({}/{}): {}", failures, self.config.max_retries, e);
                }
                Err(_) => {
                    failures += 1;
                    warn!("Sensor connect timed out ({}/{})", failures, self.config.max_retries);
                }
            }

            if failures >= self.config.max_retries {
                warn!("Sensor unreachable, pausing {}s", self.config.retry_cycle_pause_secs);
                tokio::time::sleep(std::time::Duration::from_secs(self.config.retry_cycle_pause_secs)).await;
                failures = 0;
            } else {
                tokio::time::sleep(std::time::Duration::from_secs(self.config.retry_delay_secs)).await;
            }
        }
    }

    async fn serve(&self, session: &dyn BleSession) -> Result<()> {
        self.analyzer.lock().await.reset();
        let mut imu = session.subscribe(self.config.imu_uuid).await?;
        self.audio.play(Cue::SensorConnected);
        info!("Sensor board connected");

        let mut poll = tokio::time::interval(self.config.poll_interval());
        loop {
            tokio::select! {
                frame = imu.next() => match frame {
                    Some(frame) => {
                        self.handle_imu(&frame).await;
                    }
                    None => return Err(Error::Disconnected("IMU notification stream closed".to_string())),
                },
                _ = poll.tick() => {
                    self.poll_ambient(session).await;
                    if !session.is_connected().await {
                        return Err(Error::Disconnected("sensor board link dropped".to_string()));
                    }
                }
            }
        }
    }

    /// Run the detectors on one accelerometer frame
    pub async fn handle_imu(&self, frame: &[u8]) -> Vec<AlarmKind> {
        let Some(sample) = ImuSample::decode(frame) else {
            trace!("Ignoring IMU frame of {} bytes", frame.len());
            return Vec::new();
        };
        let alarms = self.analyzer.lock().await.process(sample);
        for &kind in &alarms {
            warn!("Shelf {:?} detected", kind);
            self.state.raise_alarm(kind);
            self.audio.play(match kind {
                AlarmKind::Lean => Cue::LeanAlarm,
                AlarmKind::Shake => Cue::ShakeAlarm,
            });
            self.state.broadcast_event(ShelfEvent::ShelfAlarm {
                kind,
                timestamp: Utc::now(),
            });
        }
        alarms
    }

    /// Read each ambient characteristic; a failed read skips only that value
    async fn poll_ambient(&self, session: &dyn BleSession) {
        for (kind, uuid) in self.ambient_characteristics() {
            match tokio::time::timeout(self.config.read_timeout(), session.read(uuid)).await {
                Ok(Ok(data)) => match decode_ambient(kind, &data) {
                    Some(value) => self.state.set_ambient(kind, value).await,
                    None => debug!("{:?}: unexpected length {}", kind, data.len()),
                },
                Ok(Err(e)) => debug!("{:?}: read failed: {}", kind, e),
                Err(_) => debug!("{:?}: read timed out", kind),
            }
        }
    }
}
