pub mod mock_tts;

use self::mock_tts::MockTts;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tuxreader::config::Config;
use tuxreader::controller::{NarrationListener, SpeechController};
use tuxreader::settings::VoiceDescriptor;

/// Short debounce delay so tests settle quickly
pub const TEST_DELAY_MS: u64 = 20;

/// Listener that records lifecycle callbacks
pub struct RecordingListener {
    pub current: Mutex<String>,
    pub ends: Mutex<u32>,
    pub voice_lists: Mutex<u32>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(String::new()),
            ends: Mutex::new(0),
            voice_lists: Mutex::new(0),
        }
    }

    pub fn set_text(&self, text: &str) {
        *self.current.lock().unwrap() = text.to_string();
    }

    pub fn end_count(&self) -> u32 {
        *self.ends.lock().unwrap()
    }

    pub fn voice_list_count(&self) -> u32 {
        *self.voice_lists.lock().unwrap()
    }
}

impl NarrationListener for RecordingListener {
    fn text(&self) -> String {
        self.current.lock().unwrap().clone()
    }

    fn on_voice_list(&self) {
        *self.voice_lists.lock().unwrap() += 1;
    }

    fn on_end(&self) {
        *self.ends.lock().unwrap() += 1;
    }
}

pub fn test_voices() -> Vec<VoiceDescriptor> {
    vec![
        VoiceDescriptor::new("A", "en-US"),
        VoiceDescriptor::new("B", "fr-FR"),
    ]
}

/// Build a controller wired to a mock engine with a short debounce delay
pub fn harness(
    voices: Vec<VoiceDescriptor>,
) -> (SpeechController, Arc<MockTts>, Arc<RecordingListener>) {
    let config = Config {
        retry_delay_ms: TEST_DELAY_MS,
        ..Config::default()
    };
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let engine = Arc::new(MockTts::new(events_tx, voices));
    let listener = Arc::new(RecordingListener::new());
    let controller = SpeechController::new(engine.clone(), listener.clone(), &config);
    let _ = controller.listen(events_rx);
    (controller, engine, listener)
}
