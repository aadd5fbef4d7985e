//! System fallback TTS engine
//!
//! Drives the speech-dispatcher CLI (spd-say). The CLI exposes no pause
//! control and no lifecycle callbacks, so events are synthesized from the
//! child process: started on spawn, ended or errored on exit.

use crate::settings::VoiceDescriptor;
use crate::tts::{SpeechRequest, TtsEngine, TtsEvent};
use anyhow::Result;
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Notify;
use tracing::debug;

#[derive(Debug)]
pub struct SystemEngine {
    events: UnboundedSender<TtsEvent>,
    cancel: Arc<Notify>,
}

impl SystemEngine {
    pub fn new(events: UnboundedSender<TtsEvent>) -> Self {
        Self {
            events,
            cancel: Arc::new(Notify::new()),
        }
    }
}

/// Map a speaking-rate factor (0.1..4.0, 1.0 = normal) onto spd-say's
/// logarithmic -100..100 scale, where ±100 spans a factor of 4.
fn rate_to_spd(rate: f32) -> i32 {
    ((rate.max(0.01).log2() / 2.0) * 100.0).round().clamp(-100.0, 100.0) as i32
}

/// Pitch factor (1.0 = normal) onto spd-say's -100..100 scale.
fn pitch_to_spd(pitch: f32) -> i32 {
    ((pitch - 1.0) * 100.0).round().clamp(-100.0, 100.0) as i32
}

/// Volume 0.0..1.0 onto spd-say's -100..100 scale.
fn volume_to_spd(volume: f32) -> i32 {
    (volume * 200.0 - 100.0).round().clamp(-100.0, 100.0) as i32
}

/// Parse `spd-say -L` output: a header line, then NAME LANGUAGE VARIANT
/// columns. Multi-word names keep their spaces.
fn parse_voice_list(output: &str) -> Vec<VoiceDescriptor> {
    let mut voices = Vec::new();
    for line in output.lines().skip(1) {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 2 {
            continue;
        }
        let (name, language) = if tokens.len() == 2 {
            (tokens[0].to_string(), tokens[1])
        } else {
            (
                tokens[..tokens.len() - 2].join(" "),
                tokens[tokens.len() - 2],
            )
        };
        voices.push(VoiceDescriptor::new(name, language));
    }
    voices
}

#[async_trait]
impl TtsEngine for SystemEngine {
    async fn voices(&self) -> Result<Vec<VoiceDescriptor>> {
        let output = Command::new("spd-say").arg("-L").output().await?;
        if !output.status.success() {
            return Err(anyhow::anyhow!(
                "spd-say -L failed with status {}",
                output.status
            ));
        }
        Ok(parse_voice_list(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn speak(&self, request: &SpeechRequest) -> Result<()> {
        let mut command = Command::new("spd-say");
        command
            .arg("-w")
            .arg("-r")
            .arg(rate_to_spd(request.rate).to_string())
            .arg("-p")
            .arg(pitch_to_spd(request.pitch).to_string())
            .arg("-i")
            .arg(volume_to_spd(request.volume).to_string())
            .arg("-l")
            .arg(&request.language);
        if let Some(voice) = &request.voice {
            command.arg("-y").arg(&voice.name);
        }
        command
            .arg("--")
            .arg(&request.text)
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        debug!("System speaking utterance {}: '{}'", request.id, request.text);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                let _ = self
                    .events
                    .send(TtsEvent::Errored(request.id, e.to_string()));
                return Err(anyhow::anyhow!("Failed to spawn spd-say: {}", e));
            }
        };

        // spd-say gives no audio-start notification; spawn is the closest
        // observable moment.
        let _ = self.events.send(TtsEvent::Started(request.id));

        let id = request.id;
        let events = self.events.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => {
                    let event = match status {
                        Ok(status) if status.success() => TtsEvent::Ended(id),
                        Ok(status) => {
                            TtsEvent::Errored(id, format!("spd-say exited with {}", status))
                        }
                        Err(e) => TtsEvent::Errored(id, e.to_string()),
                    };
                    let _ = events.send(event);
                }
                _ = cancel.notified() => {
                    // An interrupted utterance reports an error, not an
                    // end, so the sentence chain does not advance past it.
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    let _ = events.send(TtsEvent::Errored(id, "interrupted".to_string()));
                }
            }
        });

        Ok(())
    }

    async fn cancel(&self) -> Result<()> {
        // Fire-and-forget: an utterance that has not reached its waiter
        // yet may still play out.
        self.cancel.notify_waiters();
        Ok(())
    }

    async fn is_paused(&self) -> Result<bool> {
        // spd-say exposes no pause state
        Ok(false)
    }

    async fn resume(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "system"
    }
}
