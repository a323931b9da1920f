//! Terminal speech backends
//!
//! Typed lines stand in for recognized speech and replies are printed instead
//! of spoken. Used by the `crab run` loop and handy for manual testing.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, mpsc};

use super::speech::{Recognizer, RecognizerEvent, Synthesizer, Utterance, VoiceInfo, VoiceSelection};
use crate::{Error, Result};

/// Simulated speaking speed
const WORDS_PER_MINUTE: u64 = 180;

/// Recognizer fed from terminal lines
pub struct ConsoleRecognizer {
    events: mpsc::UnboundedSender<RecognizerEvent>,
    active: AtomicBool,
    seq: AtomicU64,
}

impl ConsoleRecognizer {
    /// Create a recognizer that pushes into `events`
    #[must_use]
    pub const fn new(events: mpsc::UnboundedSender<RecognizerEvent>) -> Self {
        Self {
            events,
            active: AtomicBool::new(false),
            seq: AtomicU64::new(0),
        }
    }

    /// Deliver a typed line as a final transcript
    ///
    /// Lines typed while the recognizer is stopped are dropped, matching a
    /// microphone that is not capturing.
    pub fn feed(&self, line: &str) {
        let text = line.trim();
        if text.is_empty() {
            return;
        }

        if !self.active.load(Ordering::Acquire) {
            tracing::debug!(text, "not listening, input dropped");
            return;
        }

        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let _ = self
            .events
            .send(RecognizerEvent::Result(Utterance::new(text, seq, true)));
    }
}

impl Recognizer for ConsoleRecognizer {
    fn start(&self, _continuous: bool) -> Result<()> {
        if self.events.is_closed() {
            return Err(Error::Stt("recognizer event channel closed".to_string()));
        }

        self.active.store(true, Ordering::Release);
        let _ = self.events.send(RecognizerEvent::Started);
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        if self.active.swap(false, Ordering::AcqRel) {
            let _ = self.events.send(RecognizerEvent::Ended);
        }
        Ok(())
    }
}

/// Synthesizer that prints replies
pub struct ConsoleSynthesizer {
    speaker: String,
    cancelled: Notify,
}

impl ConsoleSynthesizer {
    /// Create a synthesizer that prefixes output with `speaker`
    #[must_use]
    pub fn new(speaker: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            cancelled: Notify::new(),
        }
    }

    /// Time a human would need to hear `text`
    #[must_use]
    pub fn reading_time(text: &str) -> Duration {
        let words = text.split_whitespace().count() as u64;
        Duration::from_millis(words * 60_000 / WORDS_PER_MINUTE)
    }
}

#[async_trait]
impl Synthesizer for ConsoleSynthesizer {
    fn voices(&self) -> Vec<VoiceInfo> {
        vec![
            VoiceInfo::new("Console US English", "en-US"),
            VoiceInfo::new("Console UK English Male", "en-GB"),
        ]
    }

    async fn speak(&self, text: &str, voice: &VoiceSelection) -> Result<()> {
        println!("{}: {text}", self.speaker);
        tracing::trace!(voice = ?voice.voice, pitch = voice.pitch, rate = voice.rate, "console speech");

        tokio::select! {
            () = tokio::time::sleep(Self::reading_time(text)) => Ok(()),
            () = self.cancelled.notified() => Ok(()),
        }
    }

    fn cancel(&self) {
        self.cancelled.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_only_while_listening() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let recognizer = ConsoleRecognizer::new(tx);

        recognizer.feed("ignored");
        assert!(rx.try_recv().is_err());

        recognizer.start(true).unwrap();
        assert_eq!(rx.try_recv().unwrap(), RecognizerEvent::Started);

        recognizer.feed("  hey crab  ");
        match rx.try_recv().unwrap() {
            RecognizerEvent::Result(u) => {
                assert_eq!(u.text, "hey crab");
                assert!(u.is_final);
            }
            other => panic!("unexpected event {other:?}"),
        }

        recognizer.stop().unwrap();
        recognizer.stop().unwrap();
        assert_eq!(rx.try_recv().unwrap(), RecognizerEvent::Ended);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_reading_time() {
        assert_eq!(ConsoleSynthesizer::reading_time(""), Duration::ZERO);
        assert_eq!(
            ConsoleSynthesizer::reading_time("one two three"),
            Duration::from_millis(1000)
        );
    }
}
