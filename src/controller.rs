//! Utterance sequencing controller
//!
//! Speech engines only accept voice, rate and pitch before an utterance
//! starts, never while it is speaking. The controller works around that by
//! narrating one sentence per utterance: it snapshots the current settings
//! onto a single reusable request, hands it to the engine, and asks the
//! caller for the next sentence from the end event. Changed settings take
//! effect on the next sentence without restarting the narration.
//!
//! Engines also cancel asynchronously with no completion callback, so a
//! speak issued straight after a cancel can be dropped or overlap the old
//! utterance. All hand-offs therefore go through a single delayed action
//! (see [`Config::retry_delay_ms`](crate::config::Config)).

use crate::config::Config;
use crate::error::{ReaderError, ReaderResult};
use crate::settings::{SettingsStore, VoiceDescriptor};
use crate::tts::{SpeechRequest, TtsEngine, TtsEvent};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Utterances always play at full volume; sentence-level ducking is not a
/// narration concern.
pub const DEFAULT_VOLUME: f32 = 1.0;

/// Where the controller is in the utterance lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing outstanding.
    Idle,
    /// A delayed speak or delayed cancel-retry is scheduled.
    Debouncing,
    /// A request has been handed to the engine, awaiting start/end/error.
    Speaking,
}

/// Caller-side hooks. The controller pulls the current sentence from
/// `text()` and reports lifecycle through the `on_*` methods.
pub trait NarrationListener: Send + Sync {
    /// The current segment to narrate, one sentence at a time.
    fn text(&self) -> String;

    /// Invoked whenever the voice catalog was (re)populated, e.g. to
    /// refresh a voice picker.
    fn on_voice_list(&self) {}

    /// Invoked after a segment completes normally. This is where callers
    /// supply the next sentence and call
    /// [`SpeechController::prepare_and_speak`] again, or end the chain.
    ///
    /// Not invoked for engine-reported errors: a failed utterance stops
    /// the narration silently.
    fn on_end(&self) {}
}

/// The delayed actions that may be pending. Only one at a time.
#[derive(Debug, Clone, Copy)]
enum TimerAction {
    /// Re-enter the start sequence after a cancel.
    Start,
    /// Hand the prepared request to the engine.
    Speak,
}

struct ControllerState {
    settings: SettingsStore,
    /// The one reusable request, overwritten per sentence.
    request: SpeechRequest,
    phase: Phase,
    /// Started-but-not-ended utterances as observed via engine events.
    /// A busy heuristic; never expected to exceed 1.
    active_count: u32,
    /// Id of the utterance currently with the engine, if any.
    active_utterance: Option<u64>,
    utterance_seq: u64,
    /// At most one outstanding delayed action.
    pending: Option<JoinHandle<()>>,
    /// Bumped whenever the pending timer is replaced or cleared, so a
    /// timer that already woke cannot act after being superseded.
    timer_gen: u64,
}

struct Inner {
    state: Mutex<ControllerState>,
    engine: Arc<dyn TtsEngine>,
    listener: Arc<dyn NarrationListener>,
    retry_delay: Duration,
}

/// One narration session. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SpeechController {
    inner: Arc<Inner>,
}

impl SpeechController {
    pub fn new(
        engine: Arc<dyn TtsEngine>,
        listener: Arc<dyn NarrationListener>,
        config: &Config,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(ControllerState {
                    settings: SettingsStore::new(config.default_language.clone()),
                    request: SpeechRequest::default(),
                    phase: Phase::Idle,
                    active_count: 0,
                    active_utterance: None,
                    utterance_seq: 0,
                    pending: None,
                    timer_gen: 0,
                }),
                engine,
                listener,
                retry_delay: Duration::from_millis(config.retry_delay_ms),
            }),
        }
    }

    /// Consume engine lifecycle events. Events are dispatched one at a
    /// time, so every relay runs to completion before the next.
    pub fn listen(&self, mut events: UnboundedReceiver<TtsEvent>) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                controller.dispatch(event).await;
            }
        })
    }

    async fn dispatch(&self, event: TtsEvent) {
        match event {
            TtsEvent::Started(id) => self.on_started(id),
            TtsEvent::Ended(id) => self.on_ended(id),
            TtsEvent::Errored(id, message) => self.on_errored(id, &message),
            TtsEvent::VoicesChanged => {
                if let Err(e) = self.populate_voices().await {
                    warn!("⚠️ Voice re-enumeration failed: {}", e);
                }
            }
        }
    }

    /// Read the engine's voice catalog into the settings store and notify
    /// the listener. Engines may report an empty catalog until their
    /// voices finish loading; this is re-run on a voices-changed event.
    /// Returns the number of voices the engine reported.
    pub async fn populate_voices(&self) -> ReaderResult<usize> {
        let voices = self
            .inner
            .engine
            .voices()
            .await
            .map_err(|e| ReaderError::Tts(e.to_string()))?;
        let count = voices.len();

        let populated = self.with_state(|state| state.settings.populate_voices(voices))?;
        if populated {
            self.inner.listener.on_voice_list();
        }
        Ok(count)
    }

    /// Snapshot the current settings and listener text onto the shared
    /// request and arrange for it to be spoken. Returns the utterance id
    /// synchronously; everything else is observed through the listener.
    ///
    /// Refused without side effects until the voice catalog populates.
    pub fn prepare_and_speak(&self) -> ReaderResult<u64> {
        // Pull the text before locking; listeners may call back into the
        // controller.
        let text = self.inner.listener.text();

        let (id, busy) = {
            let mut state = self.inner.state.lock().map_err(ReaderError::from)?;
            if !state.settings.is_initiated() {
                return Err(ReaderError::NotReady);
            }

            state.utterance_seq += 1;
            let id = state.utterance_seq;

            // Snapshot point: settings changed after this call do not
            // affect this utterance.
            state.request.id = id;
            state.request.text = text;
            state.request.rate = state.settings.rate();
            state.request.pitch = state.settings.pitch();
            state.request.voice = state.settings.voice().cloned();
            state.request.language = state.settings.language().to_string();
            state.request.volume = DEFAULT_VOLUME;

            state.phase = Phase::Debouncing;
            (id, state.active_count > 0)
        };

        if busy {
            // The previous utterance has not reported its end. Normally the
            // caller only re-enters from on_end, but engines queue
            // internally; cancel and retry once the engine has settled.
            debug!("Utterance {} requested while engine busy, cancelling first", id);
            self.stop();
            self.schedule(TimerAction::Start);
        } else {
            self.start_utterance();
        }

        Ok(id)
    }

    /// Clear any pending delayed action and cancel in-flight speech.
    /// Idempotent, callable in any state. Cancellation is fire-and-forget;
    /// the engine may still emit events for the cancelled utterance.
    pub fn stop(&self) {
        self.clear_timer();
        if let Ok(mut state) = self.inner.state.lock() {
            state.phase = Phase::Idle;
        }

        let engine = self.inner.engine.clone();
        tokio::spawn(async move {
            if let Err(e) = engine.cancel().await {
                warn!("⚠️ TTS cancel failed: {}", e);
            }
        });
    }

    /// Enter the start sequence: drop any stale delayed action, then
    /// resume-check and schedule the hand-off. The generation returned by
    /// clear_timer ties the spawned continuation to this start attempt, so
    /// a stop or a newer request issued meanwhile supersedes it.
    fn start_utterance(&self) {
        let gen = self.clear_timer();
        let controller = self.clone();
        tokio::spawn(async move { controller.resume_and_schedule(gen).await });
    }

    /// Engines can be left paused by a previous session; a paused engine
    /// swallows the speak call. The hand-off itself is delayed so a
    /// preceding cancel has settled by the time the speak is issued.
    async fn resume_and_schedule(&self, gen: u64) {
        match self.inner.engine.is_paused().await {
            Ok(true) => {
                if let Err(e) = self.inner.engine.resume().await {
                    warn!("⚠️ Failed to resume TTS engine: {}", e);
                }
            }
            Ok(false) => {}
            Err(e) => debug!("Paused query failed: {}", e),
        }
        self.schedule_if_current(gen, TimerAction::Speak);
    }

    /// Schedule `action` after the configured delay, replacing whatever
    /// delayed action was pending.
    fn schedule(&self, action: TimerAction) {
        if let Ok(mut state) = self.inner.state.lock() {
            self.schedule_locked(&mut state, action);
        }
    }

    /// Like schedule, but a no-op when `gen` is no longer the current
    /// timer generation: the attempt it belongs to was superseded.
    fn schedule_if_current(&self, gen: u64, action: TimerAction) {
        if let Ok(mut state) = self.inner.state.lock() {
            if state.timer_gen != gen {
                return;
            }
            self.schedule_locked(&mut state, action);
        }
    }

    fn schedule_locked(&self, state: &mut ControllerState, action: TimerAction) {
        if let Some(handle) = state.pending.take() {
            handle.abort();
        }
        state.timer_gen += 1;
        state.phase = Phase::Debouncing;
        let gen = state.timer_gen;
        let delay = self.inner.retry_delay;

        let controller = self.clone();
        state.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            controller.on_timer(gen, action).await;
        }));
    }

    async fn on_timer(&self, gen: u64, action: TimerAction) {
        {
            let Ok(mut state) = self.inner.state.lock() else {
                return;
            };
            if state.timer_gen != gen {
                // Superseded between waking and running.
                return;
            }
            state.pending = None;
        }

        match action {
            TimerAction::Start => self.resume_and_schedule(gen).await,
            TimerAction::Speak => self.hand_off(gen).await,
        }
    }

    /// Hand the prepared request to the engine, unless this attempt was
    /// superseded after its timer fired.
    async fn hand_off(&self, gen: u64) {
        let request = {
            let Ok(mut state) = self.inner.state.lock() else {
                return;
            };
            if state.timer_gen != gen {
                return;
            }
            state.phase = Phase::Speaking;
            state.active_utterance = Some(state.request.id);
            state.request.clone()
        };

        debug!("🔈 Speaking utterance {} ({} chars)", request.id, request.text.len());
        if let Err(e) = self.inner.engine.speak(&request).await {
            warn!("⚠️ TTS speak failed: {}", e);
        }
    }

    /// Abort any pending delayed action and invalidate a timer that
    /// already woke but has not yet run. Returns the new generation.
    fn clear_timer(&self) -> u64 {
        match self.inner.state.lock() {
            Ok(mut state) => {
                if let Some(handle) = state.pending.take() {
                    handle.abort();
                }
                state.timer_gen += 1;
                state.timer_gen
            }
            Err(_) => 0,
        }
    }

    fn on_started(&self, id: u64) {
        if let Ok(mut state) = self.inner.state.lock() {
            state.active_count += 1;
            debug!("Utterance {} started (active: {})", id, state.active_count);
        }
    }

    fn on_ended(&self, id: u64) {
        match self.inner.state.lock() {
            Ok(mut state) => {
                // Floored: duplicate or error events must not drive the
                // busy heuristic negative.
                state.active_count = state.active_count.saturating_sub(1);
                state.active_utterance = None;
                if state.active_count == 0 && state.pending.is_none() {
                    state.phase = Phase::Idle;
                }
            }
            Err(_) => return,
        }

        debug!("Utterance {} ended", id);
        self.inner.listener.on_end();
    }

    fn on_errored(&self, id: u64, message: &str) {
        if let Ok(mut state) = self.inner.state.lock() {
            state.active_count = state.active_count.saturating_sub(1);
            state.active_utterance = None;
            if state.active_count == 0 && state.pending.is_none() {
                state.phase = Phase::Idle;
            }
        }

        // The listener's end hook is deliberately not invoked: a failed
        // utterance ends the narration instead of advancing it.
        warn!("⚠️ Utterance {} failed: {}", id, message);
    }

    // Settings passthroughs, so callers adjust narration parameters
    // through the session handle. Changes apply from the next
    // prepare_and_speak, never to an utterance already prepared.

    pub fn set_rate(&self, rate: f32) -> ReaderResult<()> {
        self.with_state(|state| state.settings.set_rate(rate))
    }

    pub fn set_rate_text(&self, rate: &str) -> ReaderResult<()> {
        self.with_state(|state| state.settings.set_rate_text(rate))
    }

    pub fn set_pitch(&self, pitch: f32) -> ReaderResult<()> {
        self.with_state(|state| state.settings.set_pitch(pitch))
    }

    /// Select a voice by exact name, falling back to the catalog's first
    /// entry for unknown names. Returns the voice actually selected, or
    /// None while the catalog is empty.
    pub fn set_voice(&self, name: &str) -> ReaderResult<Option<VoiceDescriptor>> {
        self.with_state(|state| state.settings.set_voice(name).cloned())
    }

    pub fn is_initiated(&self) -> bool {
        self.with_state(|state| state.settings.is_initiated())
            .unwrap_or(false)
    }

    pub fn voices(&self) -> ReaderResult<Vec<VoiceDescriptor>> {
        self.with_state(|state| state.settings.voices().to_vec())
    }

    pub fn rate(&self) -> ReaderResult<f32> {
        self.with_state(|state| state.settings.rate())
    }

    pub fn phase(&self) -> Phase {
        self.with_state(|state| state.phase).unwrap_or(Phase::Idle)
    }

    /// Started-but-not-ended utterances as observed via engine events.
    pub fn active_count(&self) -> u32 {
        self.with_state(|state| state.active_count).unwrap_or(0)
    }

    /// Id of the utterance currently with the engine, if any.
    pub fn active_utterance(&self) -> Option<u64> {
        self.with_state(|state| state.active_utterance).unwrap_or(None)
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ControllerState) -> R) -> ReaderResult<R> {
        let mut state = self.inner.state.lock().map_err(ReaderError::from)?;
        Ok(f(&mut state))
    }
}

impl std::fmt::Debug for SpeechController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechController")
            .field("engine", &self.inner.engine.name())
            .field("phase", &self.phase())
            .finish()
    }
}
