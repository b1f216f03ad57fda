//! Conversation orchestrator
//!
//! One button press runs one conversation: listen, look up the recipe, read
//! it out. Silence is retried a bounded number of times; anything else ends
//! the conversation with an apology. The UI-facing fields always return to
//! neutral afterwards.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::watch;

use crate::recipe::{Recipe, RecipeSource, format_recipe_details};
use crate::voice::{SpeechCaptureEngine, SpeechSynthesizer};
use crate::{Error, Result};

/// Button label while idle
pub const IDLE_BUTTON_TEXT: &str = "Tap to Ask for a Recipe";
/// Button label while a conversation runs
pub const LISTENING_BUTTON_TEXT: &str = "Listening...";
/// Status shown before the first conversation
pub const IDLE_STATUS: &str = "Tap the button and ask for a recipe!";
/// Status while listening
pub const LISTENING_STATUS: &str = "I'm listening... What recipe would you like to know about?";
/// Status once a request was heard
pub const ACKNOWLEDGE_STATUS: &str = "Got it! Let me find a recipe for you...";
/// Spoken once a request was heard
pub const ACKNOWLEDGE_SPEECH: &str = "Got it! Let me find a recipe for you.";
/// Spoken before the ingredients
pub const INGREDIENTS_LEAD_IN: &str = "Here are the ingredients you'll need:";
/// Spoken before the steps
pub const INSTRUCTIONS_LEAD_IN: &str = "Now, let me walk you through the instructions:";
/// Spoken after the last step
pub const CLOSING_PROMPT: &str = "Would you like to try another recipe? Just tap the button again!";
/// Shown and spoken before listening again
pub const RETRY_PROMPT: &str = "I couldn't hear that clearly. Please try again.";
/// Shown and spoken when a conversation fails
pub const TROUBLE_MESSAGE: &str =
    "I'm having trouble hearing you. Please check your microphone and try again.";
/// Spoken at startup
pub const GREETING: &str =
    "Welcome! Tap the button and ask me about any recipe you'd like to make.";

/// Source of spoken requests
#[async_trait]
pub trait Listener: Send + Sync {
    /// Capture one request; `Ok(None)` if a capture is already running
    async fn start_listening(&self) -> Result<Option<String>>;

    /// Abort any capture
    async fn stop_recording(&self);
}

/// Sink for spoken replies
#[async_trait]
pub trait Speaker: Send + Sync {
    /// Speak `text` to completion
    async fn speak(&self, text: &str) -> Result<()>;

    /// Halt speech
    fn stop(&self);
}

#[async_trait]
impl Listener for SpeechCaptureEngine {
    async fn start_listening(&self) -> Result<Option<String>> {
        Self::start_listening(self).await
    }

    async fn stop_recording(&self) {
        Self::stop_recording(self).await;
    }
}

#[async_trait]
impl Speaker for SpeechSynthesizer {
    async fn speak(&self, text: &str) -> Result<()> {
        Self::speak(self, text).await
    }

    fn stop(&self) {
        Self::stop(self);
    }
}

/// Orchestrator phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationPhase {
    /// Waiting for a button press
    Idle,
    /// Capturing the request
    Listening,
    /// Looking up the recipe
    Loading,
    /// Reading the recipe out
    Speaking,
}

/// Phase and retry bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversationState {
    /// Current phase
    pub phase: ConversationPhase,
    /// Silence retries used in the current conversation
    pub retry_count: u32,
}

impl ConversationState {
    const IDLE: Self = Self {
        phase: ConversationPhase::Idle,
        retry_count: 0,
    };
}

/// What the presentation layer shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationStatus {
    /// Label of the talk button
    pub button_text: String,
    /// A conversation is running
    pub is_listening: bool,
    /// A recipe lookup is running
    pub is_loading: bool,
    /// One-line status
    pub status_message: String,
    /// Formatted recipe, empty until the first one arrives
    pub recipe_details: String,
}

impl Default for ConversationStatus {
    fn default() -> Self {
        Self {
            button_text: IDLE_BUTTON_TEXT.to_string(),
            is_listening: false,
            is_loading: false,
            status_message: IDLE_STATUS.to_string(),
            recipe_details: String::new(),
        }
    }
}

/// Runs listen, lookup and read-out for each button press
pub struct ConversationOrchestrator {
    listener: Arc<dyn Listener>,
    speaker: Arc<dyn Speaker>,
    recipes: Arc<dyn RecipeSource>,
    max_retries: u32,
    state: Mutex<ConversationState>,
    status: watch::Sender<ConversationStatus>,
    running: AtomicBool,
    stop_requested: AtomicBool,
}

impl ConversationOrchestrator {
    /// Default silence retries per conversation
    pub const DEFAULT_MAX_RETRIES: u32 = 2;

    /// Create an orchestrator over its collaborators
    #[must_use]
    pub fn new(
        listener: Arc<dyn Listener>,
        speaker: Arc<dyn Speaker>,
        recipes: Arc<dyn RecipeSource>,
    ) -> Self {
        let (status, _) = watch::channel(ConversationStatus::default());
        Self {
            listener,
            speaker,
            recipes,
            max_retries: Self::DEFAULT_MAX_RETRIES,
            state: Mutex::new(ConversationState::IDLE),
            status,
            running: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
        }
    }

    /// Set the number of silence retries
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Current phase and retry count
    #[must_use]
    pub fn state(&self) -> ConversationState {
        *self.lock_state()
    }

    /// Current UI snapshot
    #[must_use]
    pub fn status(&self) -> ConversationStatus {
        self.status.borrow().clone()
    }

    /// Watch UI snapshots
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConversationStatus> {
        self.status.subscribe()
    }

    /// Speak the welcome line; failures are only logged
    pub async fn greet(&self) {
        if let Err(e) = self.speaker.speak(GREETING).await {
            tracing::error!(error = %e, "greeting failed");
        }
    }

    /// Run one conversation
    ///
    /// Returns `Ok(None)` without side effects if a conversation is already
    /// running, otherwise the recipe that was read out.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the conversation, after the trouble
    /// message was shown and spoken. [`Error::NoSpeechDetected`] is returned
    /// once retries are exhausted; [`Error::Cancelled`] after [`stop`](Self::stop)
    pub async fn start_conversation(&self) -> Result<Option<Recipe>> {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::debug!("conversation already running, ignoring");
            return Ok(None);
        }
        self.stop_requested.store(false, Ordering::SeqCst);

        let result = self.converse().await;

        *self.lock_state() = ConversationState::IDLE;
        self.status.send_modify(|s| {
            s.is_listening = false;
            s.is_loading = false;
            IDLE_BUTTON_TEXT.clone_into(&mut s.button_text);
        });
        self.running.store(false, Ordering::SeqCst);

        result.map(Some)
    }

    /// Stop listening and speaking; a running conversation ends with
    /// [`Error::Cancelled`]
    pub async fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        self.listener.stop_recording().await;
        self.speaker.stop();
    }

    async fn converse(&self) -> Result<Recipe> {
        loop {
            self.set_phase(ConversationPhase::Listening);
            self.status.send_modify(|s| {
                s.is_listening = true;
                LISTENING_BUTTON_TEXT.clone_into(&mut s.button_text);
                LISTENING_STATUS.clone_into(&mut s.status_message);
            });

            let error = match self.attempt().await {
                Ok(recipe) => {
                    self.lock_state().retry_count = 0;
                    return Ok(recipe);
                }
                Err(e) => e,
            };

            if matches!(error, Error::Cancelled) || self.stop_requested.load(Ordering::SeqCst) {
                tracing::info!("conversation stopped");
                self.set_status_message(IDLE_STATUS);
                return Err(Error::Cancelled);
            }

            let retry_count = self.lock_state().retry_count;
            if error.is_no_speech() && retry_count < self.max_retries {
                self.lock_state().retry_count = retry_count + 1;
                tracing::info!(retry = retry_count + 1, max = self.max_retries, "no speech, retrying");

                self.set_status_message(RETRY_PROMPT);
                if let Err(e) = self.say(RETRY_PROMPT).await {
                    tracing::warn!(error = %e, "retry prompt failed");
                }
                continue;
            }

            tracing::error!(error = %error, retries = retry_count, "conversation failed");
            self.set_status_message(TROUBLE_MESSAGE);
            if let Err(e) = self.say(TROUBLE_MESSAGE).await {
                tracing::warn!(error = %e, "trouble message failed");
            }
            self.lock_state().retry_count = 0;
            return Err(error);
        }
    }

    async fn attempt(&self) -> Result<Recipe> {
        let transcript = match self.listener.start_listening().await? {
            Some(t) if !t.trim().is_empty() => t,
            _ => return Err(Error::NoSpeechDetected),
        };
        tracing::info!(transcript = %transcript, "request heard");

        self.set_phase(ConversationPhase::Loading);
        self.status.send_modify(|s| {
            ACKNOWLEDGE_STATUS.clone_into(&mut s.status_message);
            s.is_loading = true;
        });
        self.say(ACKNOWLEDGE_SPEECH).await?;

        let recipe = self.recipes.get_recipe(&transcript).await?;
        let details = format_recipe_details(&recipe);

        self.set_phase(ConversationPhase::Speaking);
        self.status.send_modify(|s| {
            s.recipe_details = details;
            s.status_message = format!("Here's your recipe for {}:", recipe.title);
        });

        self.say(&format!("I found a great recipe for {}.", recipe.title))
            .await?;
        self.say(INGREDIENTS_LEAD_IN).await?;
        for ingredient in &recipe.ingredients {
            self.say(ingredient).await?;
        }
        self.say(INSTRUCTIONS_LEAD_IN).await?;
        for step in &recipe.instructions {
            self.say(step).await?;
        }
        self.say(CLOSING_PROMPT).await?;

        Ok(recipe)
    }

    async fn say(&self, text: &str) -> Result<()> {
        if self.stop_requested.load(Ordering::SeqCst) {
            return Err(Error::Cancelled);
        }
        self.speaker.speak(text).await
    }

    fn set_phase(&self, phase: ConversationPhase) {
        self.lock_state().phase = phase;
    }

    fn set_status_message(&self, message: &str) {
        self.status
            .send_modify(|s| message.clone_into(&mut s.status_message));
    }

    fn lock_state(&self) -> MutexGuard<'_, ConversationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
