//! Speechd-ng TTS backend using D-Bus
//!
//! Uses zbus for async D-Bus communication with the speechd-ng daemon.
//! Utterance lifecycle arrives as D-Bus signals and is forwarded into the
//! controller's event channel.

use crate::settings::VoiceDescriptor;
use crate::tts::{SpeechRequest, TtsEngine, TtsEvent};
use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};
use zbus::{proxy, Connection};

#[proxy(
    interface = "org.speech.Service",
    default_service = "org.speech.Service",
    default_path = "/org/speech/Service"
)]
trait SpeechService {
    /// Speak text with explicit utterance parameters. The id is echoed
    /// back in the lifecycle signals.
    #[allow(clippy::too_many_arguments)]
    fn speak_request(
        &self,
        id: u64,
        text: &str,
        voice: &str,
        language: &str,
        rate: f64,
        pitch: f64,
        volume: f64,
    ) -> zbus::Result<()>;

    /// Cancel queued and playing utterances
    fn cancel(&self) -> zbus::Result<()>;

    /// Whether playback is currently paused
    fn is_paused(&self) -> zbus::Result<bool>;

    /// Resume paused playback
    fn resume(&self) -> zbus::Result<()>;

    /// List voices as (name, language) pairs
    fn list_voices(&self) -> zbus::Result<Vec<(String, String)>>;

    /// Ping the service
    fn ping(&self) -> zbus::Result<String>;

    #[zbus(signal)]
    fn utterance_started(&self, id: u64) -> zbus::Result<()>;

    #[zbus(signal)]
    fn utterance_ended(&self, id: u64) -> zbus::Result<()>;

    #[zbus(signal)]
    fn utterance_error(&self, id: u64, message: String) -> zbus::Result<()>;

    #[zbus(signal)]
    fn voices_changed(&self) -> zbus::Result<()>;
}

pub struct SpeechdEngine {
    proxy: SpeechServiceProxy<'static>,
}

impl std::fmt::Debug for SpeechdEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechdEngine").finish()
    }
}

impl SpeechdEngine {
    pub async fn connect(events: UnboundedSender<TtsEvent>) -> Result<Self> {
        let connection = Connection::session().await?;
        let proxy = SpeechServiceProxy::new(&connection).await?;

        match proxy.ping().await {
            Ok(response) => {
                info!("🔊 Connected to speechd-ng: {}", response);
            }
            Err(e) => {
                warn!("⚠️ speechd-ng not responding: {}", e);
                return Err(anyhow::anyhow!("speechd-ng not responding: {}", e));
            }
        }

        Self::forward_signals(&proxy, events).await?;

        Ok(Self { proxy })
    }

    /// Forward daemon lifecycle signals into the event channel.
    async fn forward_signals(
        proxy: &SpeechServiceProxy<'static>,
        events: UnboundedSender<TtsEvent>,
    ) -> Result<()> {
        let mut started = proxy.receive_utterance_started().await?;
        let tx = events.clone();
        tokio::spawn(async move {
            while let Some(signal) = started.next().await {
                if let Ok(args) = signal.args() {
                    let _ = tx.send(TtsEvent::Started(*args.id()));
                }
            }
        });

        let mut ended = proxy.receive_utterance_ended().await?;
        let tx = events.clone();
        tokio::spawn(async move {
            while let Some(signal) = ended.next().await {
                if let Ok(args) = signal.args() {
                    let _ = tx.send(TtsEvent::Ended(*args.id()));
                }
            }
        });

        let mut errors = proxy.receive_utterance_error().await?;
        let tx = events.clone();
        tokio::spawn(async move {
            while let Some(signal) = errors.next().await {
                if let Ok(args) = signal.args() {
                    let _ = tx.send(TtsEvent::Errored(*args.id(), args.message().clone()));
                }
            }
        });

        let mut voices = proxy.receive_voices_changed().await?;
        tokio::spawn(async move {
            while voices.next().await.is_some() {
                let _ = events.send(TtsEvent::VoicesChanged);
            }
        });

        Ok(())
    }
}

#[async_trait]
impl TtsEngine for SpeechdEngine {
    async fn voices(&self) -> Result<Vec<VoiceDescriptor>> {
        let voices = self.proxy.list_voices().await?;
        Ok(voices
            .into_iter()
            .map(|(name, language)| VoiceDescriptor { name, language })
            .collect())
    }

    async fn speak(&self, request: &SpeechRequest) -> Result<()> {
        let voice = request
            .voice
            .as_ref()
            .map(|v| v.name.as_str())
            .unwrap_or_default();
        debug!("Speaking utterance {} via speechd-ng", request.id);
        self.proxy
            .speak_request(
                request.id,
                &request.text,
                voice,
                &request.language,
                f64::from(request.rate),
                f64::from(request.pitch),
                f64::from(request.volume),
            )
            .await?;
        Ok(())
    }

    async fn cancel(&self) -> Result<()> {
        self.proxy.cancel().await?;
        Ok(())
    }

    async fn is_paused(&self) -> Result<bool> {
        Ok(self.proxy.is_paused().await?)
    }

    async fn resume(&self) -> Result<()> {
        self.proxy.resume().await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "speechd_ng"
    }
}
