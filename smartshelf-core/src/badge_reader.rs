//! Badge reader input
//!
//! The RFID reader behaves like a keyboard: each badge arrives as one line
//! terminated by Enter. Lines are read from a configured device/FIFO path,
//! or from stdin when no path is set.

use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::mode::{BadgeOutcome, ModeController};

const REOPEN_DELAY: Duration = Duration::from_secs(5);

/// Feeds scanned badges into the mode controller
pub struct BadgeReader {
    input: Option<PathBuf>,
    controller: ModeController,
}

impl BadgeReader {
    pub fn new(input: Option<PathBuf>, controller: ModeController) -> Self {
        Self { input, controller }
    }

    /// Read until the input closes; a device path is reopened after a delay
    pub async fn run(&self) -> Result<()> {
        let Some(path) = &self.input else {
            info!("Reading badge scans from stdin");
            return self.read_from(BufReader::new(tokio::io::stdin())).await;
        };
        loop {
            match tokio::fs::File::open(path).await {
                Ok(file) => {
                    info!("Reading badge scans from {}", path.display());
                    if let Err(e) = self.read_from(BufReader::new(file)).await {
                        warn!("Badge input {}: {}", path.display(), e);
                    }
                }
                Err(e) => warn!("Cannot open badge input {}: {}", path.display(), e),
            }
            tokio::time::sleep(REOPEN_DELAY).await;
        }
    }

    /// Submit every non-empty line as a scan
    pub async fn read_from<R>(&self, reader: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let badge_id = line.trim();
            if badge_id.is_empty() {
                continue;
            }
            match self.controller.submit_badge_scan(badge_id).await {
                Ok(BadgeOutcome::Accepted(mode)) => debug!("Badge {} switched shelf to {}", badge_id, mode),
                Ok(BadgeOutcome::Rejected(reason)) => debug!("Badge {} rejected: {:?}", badge_id, reason),
                Err(e) => warn!("Badge {} scan failed: {}", badge_id, e),
            }
        }
        Err(Error::Disconnected("badge input reached end of file".to_string()))
    }
}
