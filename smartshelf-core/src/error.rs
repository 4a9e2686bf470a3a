//! Error types for the shelf service
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for the shelf service
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode errors (snapshot, catalog cache)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Cloud HTTP errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Cloud endpoint answered with a non-success status
    #[error("Cloud request to {endpoint} failed with status {status}")]
    CloudStatus { endpoint: String, status: u16 },

    /// Cloud endpoint not configured
    #[error("Cloud endpoint not configured: {0}")]
    EndpointMissing(&'static str),

    /// BLE or serial transport failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Device session ended
    #[error("Device disconnected: {0}")]
    Disconnected(String),

    /// Operation exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Outbound device command could not be encoded or delivered
    #[error("Command error: {0}")]
    Command(String),

    /// Baseline snapshot could not be written
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Slot index outside the shelf layout
    #[error("Invalid slot: {0}")]
    InvalidSlot(usize),

    /// Manual override refused for the slot's current reading
    #[error("Manual override rejected for slot {slot}: {reason}")]
    OverrideRejected { slot: usize, reason: String },

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using the shelf Error
pub type Result<T> = std::result::Result<T, Error>;
