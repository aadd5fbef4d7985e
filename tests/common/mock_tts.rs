//! Mock TTS Engine for Testing
//!
//! Records handed-off requests and lets tests drive lifecycle events
//! through the same channel a real engine would use.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tuxreader::settings::VoiceDescriptor;
use tuxreader::tts::{SpeechRequest, TtsEngine, TtsEvent};

/// Mock TTS engine that records every interaction
#[derive(Debug)]
pub struct MockTts {
    events: UnboundedSender<TtsEvent>,
    /// Catalog reported by voices()
    pub voices: Mutex<Vec<VoiceDescriptor>>,
    /// Every request that reached speak()
    pub spoken: Mutex<Vec<SpeechRequest>>,
    pub cancels: Mutex<u32>,
    pub resumes: Mutex<u32>,
    pub paused: Mutex<bool>,
    /// Emit Started as soon as speak() is called
    pub auto_start: Mutex<bool>,
}

impl MockTts {
    pub fn new(events: UnboundedSender<TtsEvent>, voices: Vec<VoiceDescriptor>) -> Self {
        Self {
            events,
            voices: Mutex::new(voices),
            spoken: Mutex::new(Vec::new()),
            cancels: Mutex::new(0),
            resumes: Mutex::new(0),
            paused: Mutex::new(false),
            auto_start: Mutex::new(true),
        }
    }

    /// Get all requests handed off so far
    pub fn spoken(&self) -> Vec<SpeechRequest> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn cancel_count(&self) -> u32 {
        *self.cancels.lock().unwrap()
    }

    pub fn resume_count(&self) -> u32 {
        *self.resumes.lock().unwrap()
    }

    /// Inject a lifecycle event, as the platform would
    pub fn send(&self, event: TtsEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl TtsEngine for MockTts {
    async fn voices(&self) -> Result<Vec<VoiceDescriptor>> {
        Ok(self.voices.lock().unwrap().clone())
    }

    async fn speak(&self, request: &SpeechRequest) -> Result<()> {
        self.spoken.lock().unwrap().push(request.clone());
        if *self.auto_start.lock().unwrap() {
            let _ = self.events.send(TtsEvent::Started(request.id));
        }
        Ok(())
    }

    async fn cancel(&self) -> Result<()> {
        *self.cancels.lock().unwrap() += 1;
        Ok(())
    }

    async fn is_paused(&self) -> Result<bool> {
        Ok(*self.paused.lock().unwrap())
    }

    async fn resume(&self) -> Result<()> {
        *self.resumes.lock().unwrap() += 1;
        *self.paused.lock().unwrap() = false;
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
