//! Configuration for the shelf service
//!
//! Bootstrap configuration is a TOML document. Every field has a built-in
//! default, so a missing file or a missing section runs the shelf on
//! defaults; command-line arguments override the few values that differ
//! per deployment (port, data folder).
//!
//! ```toml
//! shelf_id = "shelf-01"
//! port = 5000
//!
//! [loadcell]
//! unit1_address = "60:A4:23:C9:8E:11"
//! unit2_address = "60:A4:23:C9:8E:12"
//!
//! [health]
//! stale_after_secs = 60
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

use smartshelf_common::slots::LoadcellUnit;

/// Top-level shelf configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShelfConfig {
    /// Shelf identifier reported to the cloud and in orders
    pub shelf_id: String,

    /// HTTP/SSE port
    pub port: u16,

    /// Folder for the baseline snapshot and catalog cache
    pub data_dir: PathBuf,

    pub loadcell: LoadcellConfig,
    pub sensor: SensorConfig,
    pub health: HealthConfig,
    pub watchdog: WatchdogConfig,
    pub cloud: CloudConfig,
    pub audio: AudioConfig,
    pub badge: BadgeConfig,
    pub logging: LoggingConfig,
}

impl Default for ShelfConfig {
    fn default() -> Self {
        Self {
            shelf_id: "shelf-01".to_string(),
            port: 5000,
            data_dir: smartshelf_common::config::default_data_dir(),
            loadcell: LoadcellConfig::default(),
            sensor: SensorConfig::default(),
            health: HealthConfig::default(),
            watchdog: WatchdogConfig::default(),
            cloud: CloudConfig::default(),
            audio: AudioConfig::default(),
            badge: BadgeConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ShelfConfig {
    /// Path of the persisted verified-quantity snapshot
    pub fn baseline_path(&self) -> PathBuf {
        self.data_dir.join("loadcell.json")
    }

    /// Catalog cache folder
    pub fn cache_dir(&self) -> &Path {
        &self.data_dir
    }
}

/// Loadcell unit addresses, GATT characteristics and timing
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoadcellConfig {
    pub unit1_address: String,
    pub unit2_address: String,

    /// Weight notification characteristic
    pub notify_uuid: Uuid,
    /// Per-slot unit weight table
    pub weight_uuid: Uuid,
    /// Commit/reset baseline flag
    pub save_quantity_uuid: Uuid,
    /// Packed product name table
    pub product_name_uuid: Uuid,
    /// Per-slot price table
    pub product_price_uuid: Uuid,

    pub connect_timeout_secs: u64,
    pub write_timeout_secs: u64,
    pub reconnect_backoff_secs: u64,
    /// How long a producer waits for a queued command to drain
    pub enqueue_wait_secs: u64,
    /// How long the write loop waits for a command before re-checking the link
    pub queue_poll_secs: u64,
}

impl Default for LoadcellConfig {
    fn default() -> Self {
        Self {
            unit1_address: "00:00:00:00:00:01".to_string(),
            unit2_address: "00:00:00:00:00:02".to_string(),
            notify_uuid: Uuid::from_u128(0x6e400003_b5a3_f393_e0a9_e50e24dcca9e),
            weight_uuid: Uuid::from_u128(0x6e400002_b5a3_f393_e0a9_e50e24dcca9e),
            save_quantity_uuid: Uuid::from_u128(0x6e400004_b5a3_f393_e0a9_e50e24dcca9e),
            product_name_uuid: Uuid::from_u128(0x6e400005_b5a3_f393_e0a9_e50e24dcca9e),
            product_price_uuid: Uuid::from_u128(0x6e400006_b5a3_f393_e0a9_e50e24dcca9e),
            connect_timeout_secs: 30,
            write_timeout_secs: 10,
            reconnect_backoff_secs: 5,
            enqueue_wait_secs: 10,
            queue_poll_secs: 10,
        }
    }
}

impl LoadcellConfig {
    pub fn address(&self, unit: LoadcellUnit) -> &str {
        match unit {
            LoadcellUnit::Unit1 => &self.unit1_address,
            LoadcellUnit::Unit2 => &self.unit2_address,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_secs(self.reconnect_backoff_secs)
    }

    pub fn enqueue_wait(&self) -> Duration {
        Duration::from_secs(self.enqueue_wait_secs)
    }

    pub fn queue_poll(&self) -> Duration {
        Duration::from_secs(self.queue_poll_secs)
    }
}

/// Environmental/voice sensor configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub address: String,

    pub imu_uuid: Uuid,
    pub pressure_uuid: Uuid,
    pub temperature_uuid: Uuid,
    pub humidity_uuid: Uuid,
    pub light_uuid: Uuid,
    pub sound_uuid: Uuid,
    pub magnetic_uuid: Uuid,

    pub connect_timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub read_timeout_secs: u64,
    /// Delay between ordinary reconnect attempts
    pub retry_delay_secs: u64,
    /// Consecutive failures before the long pause
    pub max_retries: u32,
    /// Long pause after `max_retries` failures
    pub retry_cycle_pause_secs: u64,

    /// Absolute drift from origin (sum of axis deltas) that counts as leaning
    pub lean_threshold: i32,
    /// Per-sample shake threshold, multiplied by the window length
    pub shake_threshold: i32,

    /// Voice sensor UART device; voice input disabled when empty
    pub voice_port: String,
    pub voice_baud: u32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            address: "00:00:00:00:00:26".to_string(),
            imu_uuid: Uuid::from_u128(0xa4e649f4_4be5_11e5_885d_feff819cdc9f),
            pressure_uuid: Uuid::from_u128(0x00002a6d_0000_1000_8000_00805f9b34fb),
            temperature_uuid: Uuid::from_u128(0x00002a6e_0000_1000_8000_00805f9b34fb),
            humidity_uuid: Uuid::from_u128(0x00002a6f_0000_1000_8000_00805f9b34fb),
            light_uuid: Uuid::from_u128(0xc8546913_bfd9_45eb_8dde_9f8754f4a32e),
            sound_uuid: Uuid::from_u128(0xc8546913_bf02_45eb_8dde_9f8754f4a32e),
            magnetic_uuid: Uuid::from_u128(0xefd658ae_c401_ef33_76e7_91b00019103b),
            connect_timeout_secs: 30,
            poll_interval_secs: 5,
            read_timeout_secs: 5,
            retry_delay_secs: 10,
            max_retries: 5,
            retry_cycle_pause_secs: 30,
            lean_threshold: 50,
            shake_threshold: 90,
            voice_port: String::new(),
            voice_baud: 115_200,
        }
    }
}

impl SensorConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

/// Fan-out backup poll and link health heuristic
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Period without a reception or a live-vector change after which the
    /// link is considered lost
    pub stale_after_secs: u64,
    pub check_interval_secs: u64,
    pub backup_poll_millis: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: 60,
            check_interval_secs: 20,
            backup_poll_millis: 1000,
        }
    }
}

impl HealthConfig {
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn backup_poll(&self) -> Duration {
        Duration::from_millis(self.backup_poll_millis)
    }
}

/// Unattended-departure watchdog thresholds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    pub sample_interval_millis: u64,
    /// Miss counts that play a warning
    pub warning_misses: Vec<u32>,
    /// Miss count that forces an unpaid checkout
    pub checkout_misses: u32,
    /// Poll interval while nobody is being tracked
    pub idle_poll_millis: u64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            sample_interval_millis: 50,
            warning_misses: vec![20, 60],
            checkout_misses: 100,
            idle_poll_millis: 1000,
        }
    }
}

/// Cloud endpoints; an empty URL disables that call
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// Shelf id as registered in the cloud (defaults to `shelf_id`)
    pub cloud_shelf_id: Option<String>,
    pub products_url: String,
    pub badges_url: String,
    pub combos_url: String,
    pub posters_url: String,
    pub order_url: String,
    pub restock_history_url: String,
    /// Prefix for relative product image paths
    pub image_prefix: String,
    /// Catalog and badge fetches
    pub fetch_timeout_secs: u64,
    /// Order and audit posts
    pub post_timeout_secs: u64,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            cloud_shelf_id: None,
            products_url: String::new(),
            badges_url: String::new(),
            combos_url: String::new(),
            posters_url: String::new(),
            order_url: String::new(),
            restock_history_url: String::new(),
            image_prefix: String::new(),
            fetch_timeout_secs: 5,
            post_timeout_secs: 30,
        }
    }
}

impl CloudConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn post_timeout(&self) -> Duration {
        Duration::from_secs(self.post_timeout_secs)
    }
}

/// Audible cue playback
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub enabled: bool,
    /// Player binary invoked with the sound file as last argument
    pub player: String,
    pub player_args: Vec<String>,
    /// Text-to-speech binary invoked with the text as last argument
    pub speech: String,
    pub sounds_dir: PathBuf,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            player: "mpg123".to_string(),
            player_args: vec!["-q".to_string()],
            speech: "espeak-ng".to_string(),
            sounds_dir: PathBuf::from("sounds"),
        }
    }
}

/// Badge (RFID keyboard-wedge) reader
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct BadgeConfig {
    /// Line-oriented input carrying scanned badge ids; stdin when empty
    pub input_path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log filter (trace, debug, info, warn, error or a full EnvFilter directive)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "smartshelf=debug,tower_http=info".to_string(),
        }
    }
}
