//! Capture permissions

use async_trait::async_trait;
use cpal::traits::HostTrait;

/// OS-level grants needed before capture
#[async_trait]
pub trait PermissionProvider: Send + Sync {
    /// Ask for microphone access
    async fn request_microphone(&self) -> bool;

    /// Ask for speech recognition access
    async fn request_speech_recognition(&self) -> bool;
}

/// Desktop permissions
///
/// Desktop hosts do not prompt. The microphone counts as granted when an
/// input device exists; speech recognition when a recognizer was configured.
pub struct HostPermissions {
    speech_authorized: bool,
}

impl HostPermissions {
    /// Create desktop permissions
    #[must_use]
    pub const fn new(speech_authorized: bool) -> Self {
        Self { speech_authorized }
    }
}

#[async_trait]
impl PermissionProvider for HostPermissions {
    async fn request_microphone(&self) -> bool {
        let granted = cpal::default_host().default_input_device().is_some();
        if !granted {
            tracing::info!("microphone permission denied: no input device");
        }
        granted
    }

    async fn request_speech_recognition(&self) -> bool {
        if !self.speech_authorized {
            tracing::info!("speech recognition permission denied");
        }
        self.speech_authorized
    }
}
