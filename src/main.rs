//! TuxReader - Sentence-by-sentence narration for Linux
//!
//! Reads text from an argument or stdin, splits it into sentences and
//! narrates them one at a time, so rate, pitch and voice changes take
//! effect on the next sentence.

use anyhow::Result;
use clap::Parser;
use std::io::Read;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use tuxreader::config::Config;
use tuxreader::controller::{NarrationListener, SpeechController};
use tuxreader::tts;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Text to narrate; reads stdin when omitted
    text: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// TTS engine to use (speechd, system)
    #[arg(long)]
    engine: Option<String>,

    /// Voice name, as printed by --list-voices
    #[arg(long)]
    voice: Option<String>,

    /// Speaking rate, 0.1 to 4.0
    #[arg(short, long)]
    rate: Option<String>,

    /// Voice pitch, 1.0 is normal
    #[arg(short, long)]
    pitch: Option<f32>,

    /// List available voices and exit
    #[arg(long)]
    list_voices: bool,
}

/// The caller side of the narration loop: hands out the current sentence
/// and wakes the main loop when one finishes.
struct CliListener {
    current: Mutex<String>,
    ended: mpsc::UnboundedSender<()>,
}

impl CliListener {
    fn set_text(&self, text: &str) {
        if let Ok(mut current) = self.current.lock() {
            *current = text.to_string();
        }
    }
}

impl NarrationListener for CliListener {
    fn text(&self) -> String {
        self.current
            .lock()
            .map(|current| current.clone())
            .unwrap_or_default()
    }

    fn on_voice_list(&self) {
        info!("🗣️ Voice catalog ready");
    }

    fn on_end(&self) {
        let _ = self.ended.send(());
    }
}

/// Minimal splitter for CLI input: one sentence per terminal punctuation
/// mark, punctuation kept with its sentence.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            let sentence = current.trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            current.clear();
        }
    }
    let rest = current.trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }
    sentences
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("🐧 TuxReader v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load()?;
    if let Some(engine) = args.engine {
        config.tts_engine = engine;
    }

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let engine = tts::create_engine(&config, events_tx).await?;

    let (ended_tx, mut ended_rx) = mpsc::unbounded_channel();
    let listener = Arc::new(CliListener {
        current: Mutex::new(String::new()),
        ended: ended_tx,
    });

    let controller = SpeechController::new(engine, listener.clone(), &config);
    let _events_task = controller.listen(events_rx);

    controller.populate_voices().await?;
    if !controller.is_initiated() {
        warn!("⚠️ Engine reported no voices yet, narration unavailable");
        return Ok(());
    }

    if args.list_voices {
        for voice in controller.voices()? {
            println!("{}\t{}", voice.name, voice.language);
        }
        return Ok(());
    }

    if let Some(rate) = args.rate.as_deref() {
        controller.set_rate_text(rate)?;
    }
    if let Some(pitch) = args.pitch {
        controller.set_pitch(pitch)?;
    }
    if let Some(name) = args.voice.as_deref() {
        if let Some(voice) = controller.set_voice(name)? {
            info!("🗣️ Narrating with voice '{}'", voice.name);
        }
    }

    let text = match args.text {
        Some(text) => text,
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    let sentences = split_sentences(&text);
    if sentences.is_empty() {
        warn!("Nothing to narrate");
        return Ok(());
    }
    info!("📖 Narrating {} sentences", sentences.len());

    for sentence in &sentences {
        listener.set_text(sentence);
        controller.prepare_and_speak()?;

        // A playback error ends the chain without a completion callback;
        // don't wait on one forever.
        match tokio::time::timeout(Duration::from_secs(120), ended_rx.recv()).await {
            Ok(Some(())) => {}
            Ok(None) => break,
            Err(_) => {
                warn!("⚠️ Narration stalled, stopping");
                break;
            }
        }
    }

    controller.stop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sentences() {
        let sentences = split_sentences("One. Two! Three? And a tail");
        assert_eq!(sentences, vec!["One.", "Two!", "Three?", "And a tail"]);
    }

    #[test]
    fn test_split_sentences_empty() {
        assert!(split_sentences("  \n ").is_empty());
    }
}
