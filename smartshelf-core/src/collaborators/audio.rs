//! Audio output adapters

use std::path::PathBuf;
use tokio::process::Command;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use super::{AudioSink, Cue};
use crate::config::AudioConfig;

/// Plays cues and speech through external player processes
///
/// Each call spawns a detached task that launches the process and reaps it,
/// so the caller never waits on playback.
pub struct ProcessAudio {
    config: AudioConfig,
}

impl ProcessAudio {
    pub fn new(config: AudioConfig) -> Self {
        Self { config }
    }

    fn cue_path(&self, cue: Cue) -> PathBuf {
        self.config.sounds_dir.join(cue.file_name())
    }

    fn launch(&self, program: String, args: Vec<String>) {
        let Ok(handle) = Handle::try_current() else {
            warn!("No runtime for audio playback of {}", program);
            return;
        };
        handle.spawn(async move {
            match Command::new(&program).args(&args).spawn() {
                Ok(mut child) => {
                    if let Err(e) = child.wait().await {
                        warn!("{} did not finish: {}", program, e);
                    }
                }
                Err(e) => warn!("Failed to start {}: {}", program, e),
            }
        });
    }
}

impl AudioSink for ProcessAudio {
    fn play(&self, cue: Cue) {
        if !self.config.enabled {
            debug!("Audio disabled, skipping cue {:?}", cue);
            return;
        }
        let mut args = self.config.player_args.clone();
        args.push(self.cue_path(cue).to_string_lossy().into_owned());
        self.launch(self.config.player.clone(), args);
    }

    fn speak(&self, text: &str) {
        if !self.config.enabled {
            debug!("Audio disabled, skipping speech: {}", text);
            return;
        }
        self.launch(self.config.speech.clone(), vec![text.to_string()]);
    }
}

/// Logs cues instead of playing them (headless deployments)
#[derive(Debug, Default)]
pub struct LogAudio;

impl AudioSink for LogAudio {
    fn play(&self, cue: Cue) {
        info!("Audio cue: {:?}", cue);
    }

    fn speak(&self, text: &str) {
        info!("Speech: {}", text);
    }
}
