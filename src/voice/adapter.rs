//! Speech I/O adapter
//!
//! Presents recognition and synthesis as two capabilities with uniform
//! restart and failure semantics. Owns the "should be listening" flag and the
//! restart-on-drop timer; nothing else in the crate touches either.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};
use std::task::{Context, Poll};
use std::time::Duration;

use regex::Regex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::presets::VoicePreset;
use super::speech::{Recognizer, RecognizerError, RecognizerEvent, Synthesizer, Utterance};
use crate::Error;

/// Default delay before restarting a recognizer that stopped on its own
pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_millis(50);

static BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]*\]").expect("valid regex"));

static MARKUP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[*#`_~>]").expect("valid regex"));

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// How a `speak` call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechOutcome {
    /// Playback ran to completion
    Finished,
    /// Synthesis or playback failed
    Failed,
    /// Superseded by another `speak` or cancelled explicitly
    Cancelled,
    /// No synthesis capability on this platform
    Unavailable,
}

/// Signals the adapter surfaces to the conversation controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterSignal {
    /// The live transcript changed
    Transcript(Utterance),
    /// Recognizer started or stopped
    ListeningChanged(bool),
    /// Recognition permission refused; listening is off until re-enabled
    PermissionDenied,
}

/// Result of a `start_listening` request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenOutcome {
    /// Recognizer was asked to start
    Started,
    /// Already listening, nothing to do
    AlreadyListening,
    /// Start failed with a transient error
    Failed,
    /// Start refused for lack of permission
    Denied,
}

/// Fires the completion exactly once, on success, failure or drop
struct CompletionGuard {
    tx: Option<oneshot::Sender<SpeechOutcome>>,
}

impl CompletionGuard {
    const fn new(tx: oneshot::Sender<SpeechOutcome>) -> Self {
        Self { tx: Some(tx) }
    }

    fn complete(mut self, outcome: SpeechOutcome) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(outcome);
        }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(SpeechOutcome::Cancelled);
        }
    }
}

/// Single-shot completion of one `speak` call
///
/// Resolves exactly once, whatever happened to the synthesis task.
#[derive(Debug)]
pub struct SpeechCompletion {
    rx: oneshot::Receiver<SpeechOutcome>,
}

impl SpeechCompletion {
    fn ready(outcome: SpeechOutcome) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(outcome);
        Self { rx }
    }
}

impl Future for SpeechCompletion {
    type Output = SpeechOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(SpeechOutcome::Cancelled))
    }
}

/// Wraps the platform recognizer and synthesizer
pub struct SpeechAdapter {
    recognizer: Arc<dyn Recognizer>,
    synthesizer: Option<Arc<dyn Synthesizer>>,
    restart_delay: Duration,
    should_listen: Arc<AtomicBool>,
    continuous: bool,
    active: bool,
    transcript: String,
    transcript_final: bool,
    notices_tx: mpsc::UnboundedSender<RecognizerEvent>,
    notices_rx: mpsc::UnboundedReceiver<RecognizerEvent>,
    speech_task: Option<JoinHandle<()>>,
    restart_task: Option<JoinHandle<()>>,
}

impl SpeechAdapter {
    /// Create an adapter over the given capabilities
    ///
    /// Pass `None` for `synthesizer` on platforms without speech output;
    /// `speak` then completes immediately.
    #[must_use]
    pub fn new(
        recognizer: Arc<dyn Recognizer>,
        synthesizer: Option<Arc<dyn Synthesizer>>,
        restart_delay: Duration,
    ) -> Self {
        let (notices_tx, notices_rx) = mpsc::unbounded_channel();
        Self {
            recognizer,
            synthesizer,
            restart_delay,
            should_listen: Arc::new(AtomicBool::new(false)),
            continuous: false,
            active: false,
            transcript: String::new(),
            transcript_final: false,
            notices_tx,
            notices_rx,
            speech_task: None,
            restart_task: None,
        }
    }

    /// Start listening; a no-op if the recognizer is already running
    ///
    /// Any speech in progress is cancelled first: synthesis and recognition
    /// never overlap.
    pub fn start_listening(&mut self, continuous: bool) -> ListenOutcome {
        self.cancel_speech();
        self.continuous = continuous;
        self.should_listen.store(continuous, Ordering::Release);

        if self.active {
            return ListenOutcome::AlreadyListening;
        }

        self.abort_restart();

        match self.recognizer.start(continuous) {
            Ok(()) => {
                self.active = true;
                tracing::debug!(continuous, "recognizer started");
                ListenOutcome::Started
            }
            Err(Error::PermissionDenied) => {
                tracing::warn!("recognizer permission denied on start");
                self.should_listen.store(false, Ordering::Release);
                ListenOutcome::Denied
            }
            Err(e) => {
                tracing::warn!(error = %e, "recognizer failed to start, retrying");
                self.schedule_restart();
                ListenOutcome::Failed
            }
        }
    }

    /// Stop listening and suppress auto-restart
    pub fn stop_listening(&mut self) {
        self.should_listen.store(false, Ordering::Release);
        self.abort_restart();

        if !self.active {
            return;
        }

        if let Err(e) = self.recognizer.stop() {
            tracing::debug!(error = %e, "recognizer stop failed");
        }
        self.active = false;
        tracing::debug!("recognizer stopped");
    }

    /// Process a raw recognizer event
    ///
    /// Transient errors and silence timeouts are absorbed here; only
    /// transcripts, listening changes and permission denial reach the caller.
    pub fn handle_event(&mut self, event: RecognizerEvent) -> Option<AdapterSignal> {
        match event {
            RecognizerEvent::Started => {
                // an Ended queued before a restart must not trigger another
                self.abort_restart();
                self.active = true;
                Some(AdapterSignal::ListeningChanged(true))
            }
            RecognizerEvent::Ended => {
                self.active = false;
                if self.should_listen() && !self.is_speaking() {
                    self.schedule_restart();
                }
                Some(AdapterSignal::ListeningChanged(false))
            }
            RecognizerEvent::Result(utterance) => {
                // a final result confirming the last interim still counts
                if utterance.text == self.transcript
                    && (self.transcript_final || !utterance.is_final)
                {
                    return None;
                }
                self.transcript.clone_from(&utterance.text);
                self.transcript_final = utterance.is_final;
                Some(AdapterSignal::Transcript(utterance))
            }
            RecognizerEvent::Error(error) if error.is_fatal() => {
                tracing::warn!("speech recognition permission denied, giving up");
                self.should_listen.store(false, Ordering::Release);
                self.abort_restart();
                self.active = false;
                Some(AdapterSignal::PermissionDenied)
            }
            RecognizerEvent::Error(RecognizerError::NoSpeech) => None,
            RecognizerEvent::Error(error) => {
                tracing::debug!(?error, "transient recognizer error");
                None
            }
        }
    }

    /// Re-issue start after the host surface regains focus
    pub fn foreground_resumed(&mut self) {
        if !self.should_listen() || self.active {
            return;
        }

        tracing::debug!("foreground resumed, restarting recognizer");
        match self.recognizer.start(self.continuous) {
            Ok(()) => self.active = true,
            Err(Error::PermissionDenied) => {
                self.should_listen.store(false, Ordering::Release);
                let _ = self.notices_tx.send(RecognizerEvent::Error(
                    RecognizerError::PermissionDenied,
                ));
            }
            Err(e) => {
                tracing::warn!(error = %e, "recognizer restart on resume failed, retrying");
                self.schedule_restart();
            }
        }
    }

    /// Next event raised by the adapter itself rather than the recognizer
    ///
    /// Permission denials hit while restarting arrive here; feed them back
    /// through [`Self::handle_event`]. Cancel safe.
    pub async fn next_notice(&mut self) -> Option<RecognizerEvent> {
        self.notices_rx.recv().await
    }

    /// Speak `text` with the given voice preset
    ///
    /// Cancels any prior speech. Markup is stripped before synthesis. The
    /// returned completion resolves exactly once.
    pub fn speak(&mut self, text: &str, preset_id: Option<&str>) -> SpeechCompletion {
        self.cancel_speech();

        let Some(synthesizer) = self.synthesizer.clone() else {
            tracing::debug!("no synthesizer available, skipping speech");
            return SpeechCompletion::ready(SpeechOutcome::Unavailable);
        };

        let cleaned = strip_markup(text);
        if cleaned.is_empty() {
            return SpeechCompletion::ready(SpeechOutcome::Finished);
        }

        let selection = VoicePreset::find(preset_id).select(&synthesizer.voices());
        tracing::debug!(
            text = %cleaned,
            voice = ?selection.voice.as_ref().map(|v| v.name.as_str()),
            "speaking"
        );

        let (tx, rx) = oneshot::channel();
        let guard = CompletionGuard::new(tx);

        self.speech_task = Some(tokio::spawn(async move {
            let outcome = match synthesizer.speak(&cleaned, &selection).await {
                Ok(()) => SpeechOutcome::Finished,
                Err(e) => {
                    tracing::warn!(error = %e, "speech synthesis failed");
                    SpeechOutcome::Failed
                }
            };
            guard.complete(outcome);
        }));

        SpeechCompletion { rx }
    }

    /// Stop any speech in progress
    pub fn cancel_speech(&mut self) {
        if let Some(task) = self.speech_task.take() {
            if !task.is_finished() {
                tracing::debug!("cancelling speech");
            }
            task.abort();
        }

        if let Some(synthesizer) = &self.synthesizer {
            synthesizer.cancel();
        }
    }

    /// Clear the live transcript without touching listen/speak state
    pub fn reset_transcript(&mut self) {
        self.transcript.clear();
        self.transcript_final = false;
    }

    /// Current live transcript
    #[must_use]
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Whether the recognizer is running (or has been asked to start)
    #[must_use]
    pub const fn is_listening(&self) -> bool {
        self.active
    }

    /// Whether the adapter wants the recognizer running
    #[must_use]
    pub fn should_listen(&self) -> bool {
        self.should_listen.load(Ordering::Acquire)
    }

    /// Whether a speech task is still running
    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.speech_task.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn schedule_restart(&mut self) {
        self.abort_restart();

        let recognizer = Arc::clone(&self.recognizer);
        let should_listen = Arc::clone(&self.should_listen);
        let notices = self.notices_tx.clone();
        let continuous = self.continuous;
        let delay = self.restart_delay;

        tracing::trace!(?delay, "scheduling recognizer restart");
        self.restart_task = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(delay).await;
                if !should_listen.load(Ordering::Acquire) {
                    return;
                }
                match recognizer.start(continuous) {
                    Ok(()) => return,
                    Err(Error::PermissionDenied) => {
                        should_listen.store(false, Ordering::Release);
                        let _ = notices.send(RecognizerEvent::Error(
                            RecognizerError::PermissionDenied,
                        ));
                        return;
                    }
                    Err(e) => tracing::debug!(error = %e, "recognizer restart failed, retrying"),
                }
            }
        }));
    }

    fn abort_restart(&mut self) {
        if let Some(task) = self.restart_task.take() {
            task.abort();
        }
    }
}

impl Drop for SpeechAdapter {
    fn drop(&mut self) {
        self.abort_restart();
        if let Some(task) = self.speech_task.take() {
            task.abort();
        }
    }
}

/// Remove formatting tokens that should not be vocalized
#[must_use]
pub fn strip_markup(text: &str) -> String {
    let without_brackets = BRACKETED.replace_all(text, "");
    let without_markup = MARKUP.replace_all(&without_brackets, "");
    WHITESPACE.replace_all(&without_markup, " ").trim().to_string()
}
