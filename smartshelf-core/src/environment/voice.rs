//! Voice command input over UART
//!
//! The voice sensor prints one recognized phrase per line. Lines are read on
//! a blocking thread and handed to the async side through a channel.

use chrono::Utc;
use std::io::{BufRead, BufReader, ErrorKind};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use smartshelf_common::events::VoiceIntent;
use smartshelf_common::ShelfEvent;

use crate::error::{Error, Result};
use crate::state::SharedState;

const READ_TIMEOUT: Duration = Duration::from_secs(1);
const REOPEN_DELAY: Duration = Duration::from_secs(10);

/// Map a recognized phrase to a UI action
pub fn intent_for(command: &str, cart_empty: bool) -> VoiceIntent {
    let command = command.to_lowercase();
    if command.contains("combo") {
        VoiceIntent::ShowCombos
    } else if command.contains("pay") || command.contains("thanh toán") {
        if cart_empty {
            VoiceIntent::EmptyCart
        } else {
            VoiceIntent::Checkout
        }
    } else if command.contains("giảm giá") {
        VoiceIntent::ShowShelf
    } else {
        VoiceIntent::Unknown
    }
}

/// Serial voice command reader
pub struct VoiceChannel {
    port: String,
    baud: u32,
    state: Arc<SharedState>,
}

impl VoiceChannel {
    pub fn new(port: String, baud: u32, state: Arc<SharedState>) -> Self {
        Self { port, baud, state }
    }

    /// Store the phrase, map it and broadcast the intent
    pub async fn handle_command(&self, line: &str) -> Option<VoiceIntent> {
        let command = line.trim();
        if command.is_empty() {
            return None;
        }
        let cart_empty = self.state.taken_quantity().await.iter().all(|&q| q == 0)
            && self.state.overrides().await.is_empty();
        let intent = intent_for(command, cart_empty);
        info!("Voice command {:?} -> {:?}", command, intent);

        self.state.set_voice_command(Some(command.to_string())).await;
        self.state.broadcast_event(ShelfEvent::VoiceCommand {
            command: command.to_string(),
            intent,
            timestamp: Utc::now(),
        });
        Some(intent)
    }

    /// Read lines until the port fails, then reopen after a delay
    pub async fn run(&self) -> Result<()> {
        loop {
            let (tx, mut rx) = mpsc::channel::<String>(16);
            let port = self.port.clone();
            let baud = self.baud;
            let reader = tokio::task::spawn_blocking(move || read_lines(&port, baud, tx));

            while let Some(line) = rx.recv().await {
                self.handle_command(&line).await;
            }

            match reader.await {
                Ok(Err(e)) => warn!("Voice port {}: {}", self.port, e),
                Err(e) => warn!("Voice reader task failed: {}", e),
                Ok(Ok(())) => debug!("Voice reader stopped"),
            }
            tokio::time::sleep(REOPEN_DELAY).await;
        }
    }
}

fn read_lines(port: &str, baud: u32, tx: mpsc::Sender<String>) -> Result<()> {
    let serial = serialport::new(port, baud)
        .timeout(READ_TIMEOUT)
        .open()
        .map_err(|e| Error::Transport(format!("open {}: {}", port, e)))?;
    info!("Listening for voice commands on {} at {}", port, baud);

    let mut reader = BufReader::new(serial);
    let mut buf = Vec::new();
    loop {
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => return Err(Error::Disconnected(format!("{} closed", port))),
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf).trim().to_string();
                buf.clear();
                if !line.is_empty() && tx.blocking_send(line).is_err() {
                    return Ok(());
                }
            }
            Err(e) if e.kind() == ErrorKind::TimedOut => continue,
            Err(e) => return Err(Error::Transport(format!("read {}: {}", port, e))),
        }
    }
}
