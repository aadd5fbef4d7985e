//! TTS (Text-to-Speech) Module
//!
//! Provides a unified interface for multiple TTS backends.

use crate::config::Config;
use crate::settings::VoiceDescriptor;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

pub mod speechd;
pub mod system;

/// The one reusable utterance object. The controller overwrites it for each
/// sentence with a snapshot of the current settings; engines read it at
/// hand-off and must not hold on to it.
#[derive(Debug, Clone, Default)]
pub struct SpeechRequest {
    /// Monotonic id, echoed back in lifecycle events.
    pub id: u64,
    pub text: String,
    pub rate: f32,
    pub pitch: f32,
    pub voice: Option<VoiceDescriptor>,
    pub language: String,
    pub volume: f32,
}

/// Lifecycle events reported by a TTS engine.
#[derive(Debug, Clone, PartialEq)]
pub enum TtsEvent {
    /// The engine started producing audio for an utterance.
    Started(u64),
    /// An utterance finished normally.
    Ended(u64),
    /// An utterance failed; the message is engine-specific.
    Errored(u64, String),
    /// The platform's voice catalog changed; re-enumerate.
    VoicesChanged,
}

/// Trait for TTS engines
#[async_trait]
pub trait TtsEngine: Send + Sync + std::fmt::Debug {
    /// Enumerate the voices currently offered by the platform. May be
    /// empty until the platform finishes loading its catalog.
    async fn voices(&self) -> Result<Vec<VoiceDescriptor>>;

    /// Hand an utterance to the platform. Completion is reported
    /// asynchronously through the event channel, not the return value.
    async fn speak(&self, request: &SpeechRequest) -> Result<()>;

    /// Cancel whatever is speaking. Fire-and-forget: engines cancel
    /// asynchronously and may still emit events for the cancelled
    /// utterance.
    async fn cancel(&self) -> Result<()>;

    /// Whether the platform reports playback as paused.
    async fn is_paused(&self) -> Result<bool>;

    /// Resume paused playback.
    async fn resume(&self) -> Result<()>;

    /// Get the engine name
    fn name(&self) -> &str;
}

/// Factory to create the configured TTS engine. Lifecycle events are
/// delivered on `events`.
pub async fn create_engine(
    config: &Config,
    events: UnboundedSender<TtsEvent>,
) -> Result<Arc<dyn TtsEngine>> {
    info!("🛠️ Creating TTS engine: {}", config.tts_engine);
    let engine: Arc<dyn TtsEngine> = match config.tts_engine.as_str() {
        "speechd_ng" | "speechd" => {
            info!("  - Using Speechd TTS");
            let client = speechd::SpeechdEngine::connect(events).await?;
            Arc::new(client)
        }
        "system" => {
            info!("  - Using System TTS Fallback");
            Arc::new(system::SystemEngine::new(events))
        }
        _ => {
            warn!(
                "  - Unknown engine '{}', falling back to System",
                config.tts_engine
            );
            Arc::new(system::SystemEngine::new(events))
        }
    };
    info!("✅ TTS engine '{}' initialized", engine.name());
    Ok(engine)
}
