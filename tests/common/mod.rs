//! Shared test utilities
//!
//! In-memory stand-ins for every platform collaborator.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, mpsc};

use recipe_voice::voice::{
    AudioBuffer, AudioInput, AudioPlayer, AudioSessionBackend, AudioSessionManager,
    CategoryOptions, PermissionProvider, RecognitionEvent, RecognitionRequest, RecognitionTask,
    SessionCategory, SessionMode, SpeechCaptureEngine, SpeechRecognizer, TtsClient,
};
use recipe_voice::{Error, Listener, Recipe, RecipeSource, Result, Speaker};

/// Shared call log
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn calls(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Yield until `condition` holds; paused time does not advance meanwhile
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never became true");
}

// Audio session

#[derive(Default, Clone)]
pub struct FakeSessionBackend {
    pub log: CallLog,
    pub deny_record: bool,
    pub fail_deactivate: bool,
}

#[async_trait]
impl AudioSessionBackend for FakeSessionBackend {
    async fn set_category(
        &self,
        category: SessionCategory,
        mode: SessionMode,
        _options: CategoryOptions,
    ) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("category {category:?} {mode:?}"));
        if self.deny_record && category == SessionCategory::Record {
            return Err(Error::AudioEngine("record category denied".to_string()));
        }
        Ok(())
    }

    async fn set_active(&self, active: bool) -> Result<()> {
        self.log.lock().unwrap().push(format!("active {active}"));
        if !active && self.fail_deactivate {
            return Err(Error::AudioEngine("not active".to_string()));
        }
        Ok(())
    }
}

/// Session manager over a fake backend, plus the backend's call log
pub fn fake_session() -> (AudioSessionManager, CallLog) {
    let backend = FakeSessionBackend::default();
    let log = Arc::clone(&backend.log);
    (AudioSessionManager::new(backend), log)
}

// Microphone

#[derive(Default)]
pub struct FakeAudioInput {
    pub installs: AtomicUsize,
    pub removes: AtomicUsize,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    pub running: AtomicBool,
    pub fail_start: bool,
    pub sink: Mutex<Option<mpsc::UnboundedSender<AudioBuffer>>>,
}

impl FakeAudioInput {
    pub fn failing_start() -> Self {
        Self {
            fail_start: true,
            ..Self::default()
        }
    }

    pub fn has_tap(&self) -> bool {
        self.sink.lock().unwrap().is_some()
    }
}

impl AudioInput for FakeAudioInput {
    fn install_tap(
        &self,
        _buffer_size: usize,
        sink: mpsc::UnboundedSender<AudioBuffer>,
    ) -> Result<()> {
        self.installs.fetch_add(1, Ordering::SeqCst);
        *self.sink.lock().unwrap() = Some(sink);
        Ok(())
    }

    fn remove_tap(&self) {
        self.removes.fetch_add(1, Ordering::SeqCst);
        self.sink.lock().unwrap().take();
    }

    fn start(&self) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            return Err(Error::AudioEngine("engine failed to start".to_string()));
        }
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

// Recognizer

pub struct FakeTask {
    cancelled: Arc<AtomicUsize>,
}

impl RecognitionTask for FakeTask {
    fn cancel(&mut self) {
        self.cancelled.fetch_add(1, Ordering::SeqCst);
    }
}

/// Recognizer whose events are emitted by the test
pub struct ScriptedRecognizer {
    pub available: bool,
    pub cancelled: Arc<AtomicUsize>,
    senders: Mutex<Vec<mpsc::UnboundedSender<RecognitionEvent>>>,
    requests: Mutex<Vec<RecognitionRequest>>,
}

impl Default for ScriptedRecognizer {
    fn default() -> Self {
        Self {
            available: true,
            cancelled: Arc::new(AtomicUsize::new(0)),
            senders: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedRecognizer {
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::default()
        }
    }

    pub fn task_count(&self) -> usize {
        self.senders.lock().unwrap().len()
    }

    /// Emit an event from the most recent task
    pub fn emit(&self, event: RecognitionEvent) {
        let senders = self.senders.lock().unwrap();
        let _ = senders.last().expect("no task started").send(event);
    }

    /// Emit an event from the task started `index`-th
    pub fn emit_from(&self, index: usize, event: RecognitionEvent) {
        let _ = self.senders.lock().unwrap()[index].send(event);
    }

    pub fn cancel_count(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn last_request_wants_partials(&self) -> bool {
        self.requests
            .lock()
            .unwrap()
            .last()
            .is_some_and(RecognitionRequest::reports_partial_results)
    }
}

impl SpeechRecognizer for ScriptedRecognizer {
    fn is_available(&self) -> bool {
        self.available
    }

    fn start_task(
        &self,
        request: RecognitionRequest,
        events: mpsc::UnboundedSender<RecognitionEvent>,
    ) -> Result<Box<dyn RecognitionTask>> {
        self.senders.lock().unwrap().push(events);
        self.requests.lock().unwrap().push(request);
        Ok(Box::new(FakeTask {
            cancelled: Arc::clone(&self.cancelled),
        }))
    }
}

// Permissions

pub struct FakePermissions {
    pub microphone: bool,
    pub speech: bool,
}

impl FakePermissions {
    pub const fn granted() -> Self {
        Self {
            microphone: true,
            speech: true,
        }
    }
}

#[async_trait]
impl PermissionProvider for FakePermissions {
    async fn request_microphone(&self) -> bool {
        self.microphone
    }

    async fn request_speech_recognition(&self) -> bool {
        self.speech
    }
}

/// Capture engine over fakes
pub struct CaptureRig {
    pub engine: Arc<SpeechCaptureEngine>,
    pub session: AudioSessionManager,
    pub session_log: CallLog,
    pub input: Arc<FakeAudioInput>,
    pub recognizer: Arc<ScriptedRecognizer>,
}

impl CaptureRig {
    pub fn new() -> Self {
        Self::with(
            FakeAudioInput::default(),
            ScriptedRecognizer::default(),
            FakePermissions::granted(),
        )
    }

    pub fn with(
        input: FakeAudioInput,
        recognizer: ScriptedRecognizer,
        permissions: FakePermissions,
    ) -> Self {
        let (session, session_log) = fake_session();
        let input = Arc::new(input);
        let recognizer = Arc::new(recognizer);
        let engine = SpeechCaptureEngine::new(
            session.clone(),
            Arc::clone(&input) as Arc<dyn AudioInput>,
            Arc::clone(&recognizer) as Arc<dyn SpeechRecognizer>,
            Arc::new(permissions),
        )
        .with_silence_timeout(Duration::from_secs(5));

        Self {
            engine: Arc::new(engine),
            session,
            session_log,
            input,
            recognizer,
        }
    }
}

// Speech synthesis

/// TTS that returns the chunk text as "audio", after `delay`
#[derive(Default)]
pub struct FakeTts {
    pub requests: Mutex<Vec<String>>,
    pub fail_on: Option<usize>,
    pub delay: Duration,
}

impl FakeTts {
    pub fn failing_on(index: usize) -> Self {
        Self {
            fail_on: Some(index),
            ..Self::default()
        }
    }

    pub fn delayed(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TtsClient for FakeTts {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        {
            let mut requests = self.requests.lock().unwrap();
            if self.fail_on == Some(requests.len()) {
                return Err(Error::SynthesisRequestFailed("status 500".to_string()));
            }
            requests.push(text.to_string());
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(text.as_bytes().to_vec())
    }
}

/// Player that reads the file it is given and takes `duration` to play it
#[derive(Default)]
pub struct FakePlayer {
    pub duration: Duration,
    pub played: Mutex<Vec<(PathBuf, String)>>,
    pub playing: AtomicUsize,
    pub max_playing: AtomicUsize,
    pub stops: AtomicUsize,
    pub halted: Notify,
}

impl FakePlayer {
    pub fn taking(duration: Duration) -> Self {
        Self {
            duration,
            ..Self::default()
        }
    }

    pub fn played_texts(&self) -> Vec<String> {
        self.played
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn played_paths(&self) -> Vec<PathBuf> {
        self.played
            .lock()
            .unwrap()
            .iter()
            .map(|(path, _)| path.clone())
            .collect()
    }
}

#[async_trait]
impl AudioPlayer for FakePlayer {
    async fn play_file(&self, path: &Path) -> Result<()> {
        let now = self.playing.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_playing.fetch_max(now, Ordering::SeqCst);

        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::PlaybackFailed(e.to_string()))?;
        self.played
            .lock()
            .unwrap()
            .push((path.to_path_buf(), text));

        tokio::select! {
            () = tokio::time::sleep(self.duration) => {}
            () = self.halted.notified() => {}
        }

        self.playing.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.halted.notify_waiters();
    }
}

// Conversation collaborators

/// One scripted outcome of `start_listening`
pub enum Heard {
    Text(&'static str),
    Nothing,
    Silence,
    Failure(Error),
    /// Block until `stop_recording`, then report cancellation
    UntilStopped,
}

#[derive(Default)]
pub struct FakeListener {
    script: Mutex<VecDeque<Heard>>,
    pub attempts: AtomicUsize,
    pub stops: AtomicUsize,
    stopped: Notify,
}

impl FakeListener {
    pub fn hearing(script: impl IntoIterator<Item = Heard>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Listener for FakeListener {
    async fn start_listening(&self) -> Result<Option<String>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next.unwrap_or(Heard::Silence) {
            Heard::Text(text) => Ok(Some(text.to_string())),
            Heard::Nothing => Ok(None),
            Heard::Silence => Err(Error::NoSpeechDetected),
            Heard::Failure(e) => Err(e),
            Heard::UntilStopped => {
                self.stopped.notified().await;
                Err(Error::Cancelled)
            }
        }
    }

    async fn stop_recording(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.stopped.notify_waiters();
    }
}

#[derive(Default)]
pub struct FakeSpeaker {
    pub spoken: Mutex<Vec<String>>,
    pub stops: AtomicUsize,
    pub fail_on: Option<&'static str>,
}

impl FakeSpeaker {
    pub fn failing_on(text: &'static str) -> Self {
        Self {
            fail_on: Some(text),
            ..Self::default()
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait]
impl Speaker for FakeSpeaker {
    async fn speak(&self, text: &str) -> Result<()> {
        self.spoken.lock().unwrap().push(text.to_string());
        if self.fail_on == Some(text) {
            return Err(Error::PlaybackFailed("speaker unplugged".to_string()));
        }
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FakeRecipes {
    pub queries: Mutex<Vec<String>>,
    pub fail: bool,
}

impl FakeRecipes {
    pub const fn working() -> Self {
        Self {
            queries: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub const fn failing() -> Self {
        Self {
            queries: Mutex::new(Vec::new()),
            fail: true,
        }
    }
}

#[async_trait]
impl RecipeSource for FakeRecipes {
    async fn get_recipe(&self, query: &str) -> Result<Recipe> {
        self.queries.lock().unwrap().push(query.to_string());
        if self.fail {
            return Err(Error::MalformedResponse("no recipe found".to_string()));
        }
        Ok(pancakes())
    }
}

pub fn pancakes() -> Recipe {
    Recipe {
        title: "Pancakes".to_string(),
        preparation_time: "20 minutes".to_string(),
        servings: 2,
        ingredients: vec!["1 cup flour".to_string(), "1 egg".to_string()],
        instructions: vec!["1. Mix.".to_string(), "2. Fry.".to_string()],
    }
}
