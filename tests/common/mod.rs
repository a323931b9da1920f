//! Shared test utilities
//!
//! Scriptable fakes for every collaborator plus a harness that runs a real
//! controller against them.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crab_voice::conversation::{Controller, ControllerHandle, MachineSettings, Snapshot};
use crab_voice::intent::{
    ActionSink, Article, ConsoleSink, Lookups, SearchResult, Section, Setting, StockQuote,
    TimeSpec, Weather,
};
use crab_voice::llm::{History, LanguageModel, StructuredAction};
use crab_voice::voice::{
    Recognizer, RecognizerError, RecognizerEvent, SpeechAdapter, Synthesizer, Utterance,
    VoiceInfo, VoiceSelection,
};
use crab_voice::{Dispatcher, Error, Result, StateMachine, WakeWordDetector};

/// Recognizer driven by the test
pub struct FakeRecognizer {
    events: mpsc::UnboundedSender<RecognizerEvent>,
    active: AtomicBool,
    deny: AtomicBool,
    failures: AtomicUsize,
    starts: AtomicUsize,
    seq: AtomicU64,
}

impl FakeRecognizer {
    pub fn new(events: mpsc::UnboundedSender<RecognizerEvent>) -> Self {
        Self {
            events,
            active: AtomicBool::new(false),
            deny: AtomicBool::new(false),
            failures: AtomicUsize::new(0),
            starts: AtomicUsize::new(0),
            seq: AtomicU64::new(0),
        }
    }

    /// Emit a final transcript if the microphone is open
    pub fn say(&self, text: &str) -> bool {
        self.hear(text, true)
    }

    /// Emit an interim transcript if the microphone is open
    pub fn hear(&self, text: &str, is_final: bool) -> bool {
        if !self.is_active() {
            return false;
        }
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        self.events
            .send(RecognizerEvent::Result(Utterance::new(text, seq, is_final)))
            .is_ok()
    }

    /// Emit a transcript regardless of microphone state
    pub fn leak(&self, text: &str) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let _ = self
            .events
            .send(RecognizerEvent::Result(Utterance::new(text, seq, true)));
    }

    /// Simulate the platform stopping recognition on its own
    pub fn drop_session(&self) {
        self.active.store(false, Ordering::Release);
        let _ = self.events.send(RecognizerEvent::Ended);
    }

    /// Simulate a runtime permission revocation
    pub fn revoke_permission(&self) {
        self.deny.store(true, Ordering::Release);
        self.active.store(false, Ordering::Release);
        let _ = self
            .events
            .send(RecognizerEvent::Error(RecognizerError::PermissionDenied));
    }

    /// Make the next `count` start attempts fail with a transient error
    pub fn fail_starts(&self, count: usize) {
        self.failures.store(count, Ordering::Release);
    }

    /// Refuse future starts without reporting anything
    pub fn deny_starts(&self) {
        self.deny.store(true, Ordering::Release);
    }

    pub fn grant_permission(&self) {
        self.deny.store(false, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::Acquire)
    }
}

impl Recognizer for FakeRecognizer {
    fn start(&self, _continuous: bool) -> Result<()> {
        if self.deny.load(Ordering::Acquire) {
            return Err(Error::PermissionDenied);
        }
        self.starts.fetch_add(1, Ordering::AcqRel);
        if self
            .failures
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::Stt("audio session busy".to_string()));
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

/// Synthesizer that records what it was asked to say
pub struct FakeSynthesizer {
    spoken: Mutex<Vec<String>>,
    duration: Duration,
    fail: AtomicBool,
    cancels: AtomicUsize,
}

impl FakeSynthesizer {
    pub fn new(duration: Duration) -> Self {
        Self {
            spoken: Mutex::new(Vec::new()),
            duration,
            fail: AtomicBool::new(false),
            cancels: AtomicUsize::new(0),
        }
    }

    pub fn failing(duration: Duration) -> Self {
        let synth = Self::new(duration);
        synth.fail.store(true, Ordering::Release);
        synth
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn last_spoken(&self) -> Option<String> {
        self.spoken.lock().unwrap().last().cloned()
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Synthesizer for FakeSynthesizer {
    fn voices(&self) -> Vec<VoiceInfo> {
        vec![
            VoiceInfo::new("Samantha", "en-US"),
            VoiceInfo::new("Daniel", "en-GB"),
        ]
    }

    async fn speak(&self, text: &str, _voice: &VoiceSelection) -> Result<()> {
        self.spoken.lock().unwrap().push(text.to_string());
        tokio::time::sleep(self.duration).await;
        if self.fail.load(Ordering::Acquire) {
            return Err(Error::Tts("speaker unplugged".to_string()));
        }
        Ok(())
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::AcqRel);
    }
}

/// Language model with scripted answers
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String>>>,
    extraction: Mutex<Option<Result<Option<StructuredAction>>>>,
    delay: Duration,
    prompts: Mutex<Vec<(String, usize, bool)>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            extraction: Mutex::new(None),
            delay,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queue a completion reply
    pub fn reply(self, text: &str) -> Self {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    /// Queue a completion failure
    pub fn fail(self) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(Error::Llm("503 service unavailable".to_string())));
        self
    }

    /// Answer every extraction with `action`
    pub fn extract_json(self, json: &str) -> Self {
        let action = StructuredAction::from_json(json).unwrap();
        *self.extraction.lock().unwrap() = Some(Ok(Some(action)));
        self
    }

    /// Fail every extraction
    pub fn extract_fails(self) -> Self {
        *self.extraction.lock().unwrap() =
            Some(Err(Error::Llm("malformed json".to_string())));
        self
    }

    /// Completion calls as (text, history length, had image)
    pub fn prompts(&self) -> Vec<(String, usize, bool)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, history: &History, text: &str, image: Option<&[u8]>) -> Result<String> {
        self.prompts
            .lock()
            .unwrap()
            .push((text.to_string(), history.len(), image.is_some()));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("Sure.".to_string()))
    }

    async fn extract(&self, _history: &History, _text: &str) -> Result<Option<StructuredAction>> {
        match &*self.extraction.lock().unwrap() {
            None => Ok(None),
            Some(Ok(action)) => Ok(action.clone()),
            Some(Err(_)) => Err(Error::Llm("malformed json".to_string())),
        }
    }
}

/// Sink whose every action fails
pub struct FailingSink;

#[async_trait]
impl ActionSink for FailingSink {
    async fn add_reminder(&self, _: &str, _: &TimeSpec, _: Option<NaiveDate>) -> Result<()> {
        Err(Error::Action("backend offline".to_string()))
    }

    async fn add_schedule(&self, _: &str, _: NaiveTime, _: NaiveTime, _: NaiveDate) -> Result<()> {
        Err(Error::Action("backend offline".to_string()))
    }

    async fn navigate(&self, _: Section) -> Result<()> {
        Err(Error::Action("backend offline".to_string()))
    }

    async fn launch_external(&self, _: &str, _: bool) -> Result<()> {
        Err(Error::Action("backend offline".to_string()))
    }

    async fn toggle_setting(&self, _: Setting, _: bool) -> Result<()> {
        Err(Error::Action("backend offline".to_string()))
    }

    async fn health_report(&self) -> Result<String> {
        Err(Error::Action("backend offline".to_string()))
    }

    async fn start_workout(&self) -> Result<()> {
        Err(Error::Action("backend offline".to_string()))
    }

    async fn stop_workout(&self) -> Result<Option<String>> {
        Err(Error::Action("backend offline".to_string()))
    }

    async fn capture_screen(&self) -> Result<Option<Vec<u8>>> {
        Err(Error::Action("backend offline".to_string()))
    }

    async fn take_screenshot(&self) -> Result<()> {
        Err(Error::Action("backend offline".to_string()))
    }
}

/// Sink whose backend crashes on every call
pub struct PanickingSink;

#[async_trait]
impl ActionSink for PanickingSink {
    async fn add_reminder(&self, _: &str, _: &TimeSpec, _: Option<NaiveDate>) -> Result<()> {
        panic!("sink crashed")
    }

    async fn add_schedule(&self, _: &str, _: NaiveTime, _: NaiveTime, _: NaiveDate) -> Result<()> {
        panic!("sink crashed")
    }

    async fn navigate(&self, _: Section) -> Result<()> {
        panic!("sink crashed")
    }

    async fn launch_external(&self, _: &str, _: bool) -> Result<()> {
        panic!("sink crashed")
    }

    async fn toggle_setting(&self, _: Setting, _: bool) -> Result<()> {
        panic!("sink crashed")
    }

    async fn health_report(&self) -> Result<String> {
        panic!("sink crashed")
    }

    async fn start_workout(&self) -> Result<()> {
        panic!("sink crashed")
    }

    async fn stop_workout(&self) -> Result<Option<String>> {
        panic!("sink crashed")
    }

    async fn capture_screen(&self) -> Result<Option<Vec<u8>>> {
        panic!("sink crashed")
    }

    async fn take_screenshot(&self) -> Result<()> {
        panic!("sink crashed")
    }
}

/// Sink that can capture the screen
pub struct ScreenSink(pub ConsoleSink);

#[async_trait]
impl ActionSink for ScreenSink {
    async fn add_reminder(&self, text: &str, time: &TimeSpec, date: Option<NaiveDate>) -> Result<()> {
        self.0.add_reminder(text, time, date).await
    }

    async fn add_schedule(&self, title: &str, start: NaiveTime, end: NaiveTime, date: NaiveDate) -> Result<()> {
        self.0.add_schedule(title, start, end, date).await
    }

    async fn navigate(&self, section: Section) -> Result<()> {
        self.0.navigate(section).await
    }

    async fn launch_external(&self, target: &str, is_website: bool) -> Result<()> {
        self.0.launch_external(target, is_website).await
    }

    async fn toggle_setting(&self, setting: Setting, value: bool) -> Result<()> {
        self.0.toggle_setting(setting, value).await
    }

    async fn health_report(&self) -> Result<String> {
        self.0.health_report().await
    }

    async fn start_workout(&self) -> Result<()> {
        self.0.start_workout().await
    }

    async fn stop_workout(&self) -> Result<Option<String>> {
        self.0.stop_workout().await
    }

    async fn capture_screen(&self) -> Result<Option<Vec<u8>>> {
        Ok(Some(vec![0xFF, 0xD8, 0xFF]))
    }

    async fn take_screenshot(&self) -> Result<()> {
        self.0.take_screenshot().await
    }
}

/// Lookups with canned data
pub struct CannedLookups;

#[async_trait]
impl Lookups for CannedLookups {
    async fn weather(&self, location: &str) -> Result<Weather> {
        Ok(Weather {
            location: location.to_string(),
            temp: 18.0,
            condition: "Cloudy".to_string(),
        })
    }

    async fn news(&self, _query: Option<&str>) -> Result<Vec<Article>> {
        Ok(vec![Article {
            title: "Crabs learn Rust".to_string(),
            source: "Shell Times".to_string(),
        }])
    }

    async fn stock(&self, symbol: &str) -> Result<StockQuote> {
        Ok(StockQuote {
            symbol: symbol.to_uppercase(),
            price: 123.5,
        })
    }

    async fn web_search(&self, query: &str) -> Result<Vec<SearchResult>> {
        Ok(vec![SearchResult {
            title: format!("About {query}"),
            snippet: "A snippet.".to_string(),
            url: "https://example.com".to_string(),
        }])
    }
}

/// Settings used by controller tests
pub fn test_settings() -> MachineSettings {
    MachineSettings {
        greeting: "Hi".to_string(),
        debounce: Duration::from_millis(500),
        cooldown: Duration::from_millis(600),
    }
}

/// A running controller wired to fakes
pub struct Harness {
    pub handle: ControllerHandle,
    pub recognizer: Arc<FakeRecognizer>,
    pub synthesizer: Arc<FakeSynthesizer>,
    pub sink: Arc<ConsoleSink>,
    pub dictation: mpsc::UnboundedReceiver<String>,
    pub task: JoinHandle<()>,
}

impl Harness {
    pub fn start(model: Arc<dyn LanguageModel>, synthesizer: FakeSynthesizer) -> Self {
        Self::start_with(model, synthesizer, test_settings())
    }

    pub fn start_with(
        model: Arc<dyn LanguageModel>,
        synthesizer: FakeSynthesizer,
        settings: MachineSettings,
    ) -> Self {
        Self::build(model, synthesizer, settings, None)
    }

    /// Run against `action_sink` instead of the recording console sink
    pub fn start_with_sink(
        model: Arc<dyn LanguageModel>,
        synthesizer: FakeSynthesizer,
        action_sink: Arc<dyn ActionSink>,
    ) -> Self {
        Self::build(model, synthesizer, test_settings(), Some(action_sink))
    }

    fn build(
        model: Arc<dyn LanguageModel>,
        synthesizer: FakeSynthesizer,
        settings: MachineSettings,
        action_sink: Option<Arc<dyn ActionSink>>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let recognizer = Arc::new(FakeRecognizer::new(events_tx));
        let synthesizer = Arc::new(synthesizer);
        let sink = Arc::new(ConsoleSink::new());

        let recognizer_dyn: Arc<dyn Recognizer> = recognizer.clone();
        let synthesizer_dyn: Arc<dyn Synthesizer> = synthesizer.clone();
        let adapter = SpeechAdapter::new(recognizer_dyn, Some(synthesizer_dyn), Duration::from_millis(50));

        let sink_dyn: Arc<dyn ActionSink> = action_sink.unwrap_or_else(|| sink.clone() as Arc<dyn ActionSink>);
        let dispatcher = Dispatcher::new(model, sink_dyn, Arc::new(CannedLookups));

        let detector = WakeWordDetector::for_agent("crab", "hey crab").unwrap();
        let machine = StateMachine::new(detector, settings);

        let (dictation_tx, dictation) = mpsc::unbounded_channel();
        let (controller, handle) = Controller::new(machine, adapter, dispatcher, events_rx, "Cosmic");
        let task = tokio::spawn(controller.with_dictation(dictation_tx).run());

        Self {
            handle,
            recognizer,
            synthesizer,
            sink,
            dictation,
            task,
        }
    }

    /// Let spawned tasks and timers run for `duration` of (paused) time
    pub async fn advance(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    /// Let every ready task run without moving the clock
    pub async fn settle(&self) {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        self.handle.snapshot()
    }

    /// Activate, wake with the wake phrase and wait for the greeting to end
    pub async fn open(&self) {
        self.handle.activate();
        self.settle().await;
        assert!(self.recognizer.say("hey crab"));
        self.settle().await;
        // greeting playback plus cooldown
        self.advance(Duration::from_millis(1_000)).await;
        self.advance(Duration::from_millis(700)).await;
        self.settle().await;
    }

    pub async fn shutdown(self) {
        self.handle.shutdown();
        let _ = self.task.await;
    }
}
