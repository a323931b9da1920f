//! Conversation controller
//!
//! Owns the state machine, speech adapter and dispatcher, and runs them on a
//! single task. Recognizer events, control requests and async results are
//! multiplexed through one `select!` loop, so state is only ever touched from
//! here.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::machine::{Command, Event, StateMachine};
use super::state::Phase;
use crate::Result;
use crate::intent::{DispatchOutcome, Dispatcher, FALLBACK_REPLY};
use crate::llm::History;
use crate::voice::{AdapterSignal, ListenOutcome, RecognizerEvent, SpeechAdapter};

/// Requests from outside the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Begin wake-word listening
    Activate,
    /// Stop everything (sign-out)
    Deactivate,
    /// Close the assistant
    Close,
    EnterDictation,
    ExitDictation,
    /// The host surface regained focus
    ForegroundResumed,
    /// Stop the controller task
    Shutdown,
}

/// Observable controller state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub phase: Phase,
    pub transcript: String,
    pub is_open: bool,
    pub listening: bool,
    pub listening_blocked: bool,
    pub turn: u64,
}

/// Cloneable handle for driving a running [`Controller`]
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    control: mpsc::UnboundedSender<Control>,
    snapshot: watch::Receiver<Snapshot>,
}

impl ControllerHandle {
    fn send(&self, control: Control) {
        if self.control.send(control).is_err() {
            tracing::debug!(?control, "controller stopped, request dropped");
        }
    }

    pub fn activate(&self) {
        self.send(Control::Activate);
    }

    pub fn deactivate(&self) {
        self.send(Control::Deactivate);
    }

    pub fn close(&self) {
        self.send(Control::Close);
    }

    pub fn enter_dictation(&self) {
        self.send(Control::EnterDictation);
    }

    pub fn exit_dictation(&self) {
        self.send(Control::ExitDictation);
    }

    pub fn foreground_resumed(&self) {
        self.send(Control::ForegroundResumed);
    }

    pub fn shutdown(&self) {
        self.send(Control::Shutdown);
    }

    /// Latest published state
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to state changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.clone()
    }

    /// Wait until the published state satisfies `predicate`
    ///
    /// # Errors
    ///
    /// Returns error if the controller stopped first
    pub async fn wait_for(&self, predicate: impl FnMut(&Snapshot) -> bool) -> Result<Snapshot> {
        let mut rx = self.snapshot.clone();
        let snapshot = rx
            .wait_for(predicate)
            .await
            .map_err(|_| crate::Error::Voice("controller stopped".to_string()))?;
        Ok(snapshot.clone())
    }
}

/// Runs the conversation loop
pub struct Controller {
    machine: StateMachine,
    adapter: SpeechAdapter,
    dispatcher: Dispatcher,
    history: History,
    voice: String,
    recognizer_events: mpsc::UnboundedReceiver<RecognizerEvent>,
    control: mpsc::UnboundedReceiver<Control>,
    internal_tx: mpsc::UnboundedSender<Event>,
    internal_rx: mpsc::UnboundedReceiver<Event>,
    snapshot: watch::Sender<Snapshot>,
    dictation: Option<mpsc::UnboundedSender<String>>,
    debounce_task: Option<JoinHandle<()>>,
    cooldown_task: Option<JoinHandle<()>>,
}

impl Controller {
    /// Create a controller and the handle used to drive it
    ///
    /// `recognizer_events` is the channel the adapter's recognizer pushes
    /// into. `voice` is the preset id used for every reply.
    #[must_use]
    pub fn new(
        machine: StateMachine,
        adapter: SpeechAdapter,
        dispatcher: Dispatcher,
        recognizer_events: mpsc::UnboundedReceiver<RecognizerEvent>,
        voice: impl Into<String>,
    ) -> (Self, ControllerHandle) {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot::default());

        let controller = Self {
            machine,
            adapter,
            dispatcher,
            history: History::new(),
            voice: voice.into(),
            recognizer_events,
            control: control_rx,
            internal_tx,
            internal_rx,
            snapshot: snapshot_tx,
            dictation: None,
            debounce_task: None,
            cooldown_task: None,
        };

        let handle = ControllerHandle {
            control: control_tx,
            snapshot: snapshot_rx,
        };

        (controller, handle)
    }

    /// Forward dictated text to `sink`
    #[must_use]
    pub fn with_dictation(mut self, sink: mpsc::UnboundedSender<String>) -> Self {
        self.dictation = Some(sink);
        self
    }

    /// Seed the conversation history
    #[must_use]
    pub fn with_history(mut self, history: History) -> Self {
        self.history = history;
        self
    }

    /// Run until shut down or every handle is dropped
    pub async fn run(mut self) {
        tracing::info!(voice = %self.voice, "conversation controller started");
        self.publish();

        loop {
            tokio::select! {
                Some(event) = self.recognizer_events.recv() => self.on_recognizer(event),
                Some(event) = self.adapter.next_notice() => self.on_recognizer(event),
                control = self.control.recv() => match control {
                    Some(Control::Shutdown) | None => break,
                    Some(control) => self.on_control(control),
                },
                Some(event) = self.internal_rx.recv() => self.apply(event),
            }

            self.publish();
        }

        self.abort_timers();
        self.adapter.cancel_speech();
        self.adapter.stop_listening();
        tracing::info!("conversation controller stopped");
    }

    fn on_recognizer(&mut self, event: RecognizerEvent) {
        match self.adapter.handle_event(event) {
            Some(AdapterSignal::Transcript(utterance)) => self.apply(Event::Transcript(utterance)),
            Some(AdapterSignal::PermissionDenied) => self.apply(Event::PermissionDenied),
            Some(AdapterSignal::ListeningChanged(listening)) => {
                tracing::trace!(listening, "listening changed");
            }
            None => {}
        }
    }

    fn on_control(&mut self, control: Control) {
        tracing::debug!(?control, "control request");
        let event = match control {
            Control::Activate => Event::Activate,
            Control::Deactivate => Event::Deactivate,
            Control::Close => Event::CloseRequested,
            Control::EnterDictation => Event::EnterDictation,
            Control::ExitDictation => Event::ExitDictation,
            Control::ForegroundResumed => {
                self.adapter.foreground_resumed();
                return;
            }
            Control::Shutdown => return,
        };
        self.apply(event);
    }

    fn apply(&mut self, event: Event) {
        if let Event::DispatchCompleted { turn, outcome } = &event
            && self.machine.accepts_dispatch(*turn)
        {
            self.history.extend(outcome.exchange.iter().cloned());
        }

        for command in self.machine.handle(event) {
            self.execute(command);
        }
    }

    fn execute(&mut self, command: Command) {
        tracing::trace!(?command, "executing");

        match command {
            Command::StartListening { continuous } => {
                match self.adapter.start_listening(continuous) {
                    ListenOutcome::Denied => self.emit(Event::PermissionDenied),
                    ListenOutcome::Failed => tracing::warn!("could not start listening"),
                    ListenOutcome::Started | ListenOutcome::AlreadyListening => {}
                }
            }
            Command::StopListening => self.adapter.stop_listening(),
            Command::CancelSpeech => self.adapter.cancel_speech(),
            Command::ResetTranscript => self.adapter.reset_transcript(),
            Command::Speak { turn, text } => {
                let completion = self.adapter.speak(&text, Some(self.voice.as_str()));
                let tx = self.internal_tx.clone();
                tokio::spawn(async move {
                    let outcome = completion.await;
                    let _ = tx.send(Event::SpeechFinished { turn, outcome });
                });
            }
            Command::Dispatch { turn, text } => {
                let dispatcher = self.dispatcher.clone();
                let history = self.history.clone();
                let tx = self.internal_tx.clone();
                tokio::spawn(async move {
                    let task =
                        tokio::spawn(async move { dispatcher.dispatch(&text, &history).await });
                    // a panicking collaborator must still end the turn
                    let outcome = task.await.unwrap_or_else(|e| {
                        tracing::error!(error = %e, turn, "dispatch task failed");
                        DispatchOutcome::say(FALLBACK_REPLY)
                    });
                    let _ = tx.send(Event::DispatchCompleted { turn, outcome });
                });
            }
            Command::ArmDebounce { generation, after } => {
                if let Some(task) = self.debounce_task.take() {
                    task.abort();
                }
                let tx = self.internal_tx.clone();
                self.debounce_task = Some(tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    let _ = tx.send(Event::DebounceElapsed { generation });
                }));
            }
            Command::ArmCooldown { turn, after } => {
                if let Some(task) = self.cooldown_task.take() {
                    task.abort();
                }
                let tx = self.internal_tx.clone();
                self.cooldown_task = Some(tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    let _ = tx.send(Event::CooldownElapsed { turn });
                }));
            }
            Command::Dictate(text) => {
                tracing::info!(text, "dictation");
                if let Some(sink) = &self.dictation {
                    let _ = sink.send(text);
                }
            }
        }
    }

    fn emit(&self, event: Event) {
        let _ = self.internal_tx.send(event);
    }

    fn abort_timers(&mut self) {
        for task in [self.debounce_task.take(), self.cooldown_task.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
    }

    fn publish(&self) {
        let state = self.machine.state();
        let snapshot = Snapshot {
            phase: state.phase,
            transcript: state.transcript.clone(),
            is_open: state.is_assistant_open(),
            listening: self.adapter.is_listening(),
            listening_blocked: state.listening_blocked,
            turn: state.turn,
        };

        self.snapshot.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}
