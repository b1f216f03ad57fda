//! Recipe Voice - voice-driven recipe assistant
//!
//! Speak a request, hear the recipe:
//! - Speech capture with a silence timeout (microphone tap + streaming recognizer)
//! - Recipe lookup through a chat completion model
//! - Chunked speech synthesis with strictly sequential playback
//! - A conversation state machine with bounded retry on silence
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              ConversationOrchestrator               │
//! │   listen  →  look up  →  read out  (retry silence)  │
//! └──────┬─────────────────┬──────────────────┬─────────┘
//!        │                 │                  │
//! ┌──────▼───────┐  ┌──────▼───────┐  ┌───────▼────────┐
//! │ SpeechCapture│  │ RecipeClient │  │SpeechSynthesizer│
//! │    Engine    │  │  (chat API)  │  │ (TTS, playback) │
//! └──────┬───────┘  └──────────────┘  └───────┬────────┘
//!        │                                    │
//! ┌──────▼────────────────────────────────────▼────────┐
//! │        AudioSessionManager (record | playback)      │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod platform;
pub mod recipe;
pub mod voice;

pub use config::Config;
pub use conversation::{
    ConversationOrchestrator, ConversationPhase, ConversationState, ConversationStatus, Listener,
    Speaker,
};
pub use error::{Error, Result};
pub use recipe::{Recipe, RecipeClient, RecipeSource, format_recipe_details, parse_recipe};
