//! Shared audio session
//!
//! The microphone and the speaker share one platform audio session. Capture
//! and synthesis both go through [`AudioSessionManager`], which always
//! deactivates the current configuration before applying the next one.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cpal::traits::HostTrait;
use tokio::sync::{broadcast, watch};

use crate::{Error, Result};

/// Platform session category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCategory {
    /// Microphone input
    Record,
    /// Speaker output
    Playback,
}

/// Platform session mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Platform default processing
    Default,
    /// Minimal signal processing, suited to speech recognition
    Measurement,
}

/// Options applied together with a category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryOptions {
    /// Let other applications keep playing alongside us
    pub mix_with_others: bool,
}

/// Configuration the session is currently in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioMode {
    /// No configuration active
    Inactive,
    /// Configured for microphone capture
    Recording,
    /// Configured for speaker output
    Playback,
}

/// A state change of the shared session, in the order it happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTransition {
    /// The previous configuration was deactivated
    Deactivated {
        /// Mode that was active before deactivation
        from: AudioMode,
    },
    /// A configuration was applied and activated
    Configured(AudioMode),
}

/// Platform audio session primitive
#[async_trait]
pub trait AudioSessionBackend: Send + Sync {
    /// Apply a category, mode, and options
    async fn set_category(
        &self,
        category: SessionCategory,
        mode: SessionMode,
        options: CategoryOptions,
    ) -> Result<()>;

    /// Activate or deactivate the session
    async fn set_active(&self, active: bool) -> Result<()>;
}

struct Inner {
    backend: Box<dyn AudioSessionBackend>,
    switch_lock: tokio::sync::Mutex<()>,
    mode: watch::Sender<AudioMode>,
    transitions: broadcast::Sender<SessionTransition>,
}

/// Owns the shared audio session and serializes mode switches
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct AudioSessionManager {
    inner: Arc<Inner>,
}

impl AudioSessionManager {
    /// Create a manager around a platform backend
    #[must_use]
    pub fn new(backend: impl AudioSessionBackend + 'static) -> Self {
        let (mode, _) = watch::channel(AudioMode::Inactive);
        let (transitions, _) = broadcast::channel(64);

        Self {
            inner: Arc::new(Inner {
                backend: Box::new(backend),
                switch_lock: tokio::sync::Mutex::new(()),
                mode,
                transitions,
            }),
        }
    }

    /// Current session mode
    #[must_use]
    pub fn mode(&self) -> AudioMode {
        *self.inner.mode.borrow()
    }

    /// Subscribe to session transitions
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionTransition> {
        self.inner.transitions.subscribe()
    }

    /// Configure the session for microphone capture
    ///
    /// # Errors
    ///
    /// Returns [`Error::AudioEngine`] if the platform rejects the record
    /// category, measurement mode, or activation
    pub async fn configure_for_recording(&self) -> Result<()> {
        self.switch_to(AudioMode::Recording).await
    }

    /// Configure the session for speaker output, mixing with other apps
    ///
    /// # Errors
    ///
    /// Returns [`Error::AudioEngine`] if the platform rejects the playback
    /// category or activation
    pub async fn configure_for_playback(&self) -> Result<()> {
        self.switch_to(AudioMode::Playback).await
    }

    /// Deactivate whatever configuration is active
    ///
    /// Failures are logged and treated as already inactive.
    pub async fn release(&self) {
        let _guard = self.inner.switch_lock.lock().await;
        let current = self.mode();
        if current == AudioMode::Inactive {
            return;
        }
        self.deactivate(current).await;
    }

    async fn switch_to(&self, target: AudioMode) -> Result<()> {
        let _guard = self.inner.switch_lock.lock().await;
        let current = self.mode();
        if current == target {
            return Ok(());
        }

        self.deactivate(current).await;

        let (category, mode, options) = match target {
            AudioMode::Recording => (
                SessionCategory::Record,
                SessionMode::Measurement,
                CategoryOptions::default(),
            ),
            AudioMode::Playback => (
                SessionCategory::Playback,
                SessionMode::Default,
                CategoryOptions {
                    mix_with_others: true,
                },
            ),
            AudioMode::Inactive => return Ok(()),
        };

        self.inner
            .backend
            .set_category(category, mode, options)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, ?target, "audio session configuration rejected");
                Error::AudioEngine(format!("failed to configure audio session: {e}"))
            })?;

        self.inner.backend.set_active(true).await.map_err(|e| {
            tracing::error!(error = %e, ?target, "audio session activation failed");
            Error::AudioEngine(format!("failed to activate audio session: {e}"))
        })?;

        self.inner.mode.send_replace(target);
        let _ = self.inner.transitions.send(SessionTransition::Configured(target));
        tracing::debug!(?target, "audio session configured");

        Ok(())
    }

    async fn deactivate(&self, from: AudioMode) {
        if let Err(e) = self.inner.backend.set_active(false).await {
            tracing::warn!(error = %e, "session was already inactive");
        }
        self.inner.mode.send_replace(AudioMode::Inactive);
        let _ = self
            .inner
            .transitions
            .send(SessionTransition::Deactivated { from });
    }
}

/// Desktop session backend
///
/// Desktop hosts have no session object; activation checks that the default
/// device for the requested category exists.
#[derive(Default)]
pub struct HostAudioSession {
    category: Mutex<Option<SessionCategory>>,
}

impl HostAudioSession {
    /// Create a desktop session backend
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AudioSessionBackend for HostAudioSession {
    async fn set_category(
        &self,
        category: SessionCategory,
        mode: SessionMode,
        options: CategoryOptions,
    ) -> Result<()> {
        tracing::trace!(?category, ?mode, ?options, "host session category");
        if let Ok(mut current) = self.category.lock() {
            *current = Some(category);
        }
        Ok(())
    }

    async fn set_active(&self, active: bool) -> Result<()> {
        if !active {
            return Ok(());
        }

        let category = self.category.lock().ok().and_then(|c| *c);
        let host = cpal::default_host();
        match category {
            Some(SessionCategory::Record) => host
                .default_input_device()
                .map(|_| ())
                .ok_or_else(|| Error::AudioEngine("no input device available".to_string())),
            Some(SessionCategory::Playback) => host
                .default_output_device()
                .map(|_| ())
                .ok_or_else(|| Error::AudioEngine("no output device available".to_string())),
            None => Err(Error::AudioEngine("no session category set".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeBackend {
        calls: Arc<Mutex<Vec<String>>>,
        fail_deactivate: bool,
        deny_record: bool,
    }

    #[async_trait]
    impl AudioSessionBackend for FakeBackend {
        async fn set_category(
            &self,
            category: SessionCategory,
            mode: SessionMode,
            options: CategoryOptions,
        ) -> Result<()> {
            self.calls.lock().unwrap().push(format!(
                "category {category:?} {mode:?} mix={}",
                options.mix_with_others
            ));
            if self.deny_record && category == SessionCategory::Record {
                return Err(Error::AudioEngine("denied".to_string()));
            }
            Ok(())
        }

        async fn set_active(&self, active: bool) -> Result<()> {
            self.calls.lock().unwrap().push(format!("active {active}"));
            if !active && self.fail_deactivate {
                return Err(Error::AudioEngine("not active".to_string()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_recording_uses_measurement_mode() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let manager = AudioSessionManager::new(FakeBackend {
            calls: Arc::clone(&calls),
            ..FakeBackend::default()
        });

        manager.configure_for_recording().await.unwrap();

        assert_eq!(manager.mode(), AudioMode::Recording);
        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                "active false".to_string(),
                "category Record Measurement mix=false".to_string(),
                "active true".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_playback_after_recording_deactivates_first() {
        let manager = AudioSessionManager::new(FakeBackend::default());
        let mut events = manager.subscribe();

        manager.configure_for_recording().await.unwrap();
        manager.configure_for_playback().await.unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }

        assert_eq!(
            seen,
            vec![
                SessionTransition::Deactivated {
                    from: AudioMode::Inactive
                },
                SessionTransition::Configured(AudioMode::Recording),
                SessionTransition::Deactivated {
                    from: AudioMode::Recording
                },
                SessionTransition::Configured(AudioMode::Playback),
            ]
        );
        assert_eq!(manager.mode(), AudioMode::Playback);
    }

    #[tokio::test]
    async fn test_deactivation_failure_is_not_fatal() {
        let manager = AudioSessionManager::new(FakeBackend {
            fail_deactivate: true,
            ..FakeBackend::default()
        });

        manager.configure_for_playback().await.unwrap();
        assert_eq!(manager.mode(), AudioMode::Playback);

        manager.release().await;
        assert_eq!(manager.mode(), AudioMode::Inactive);
    }

    #[tokio::test]
    async fn test_denied_record_category_fails_closed() {
        let manager = AudioSessionManager::new(FakeBackend {
            deny_record: true,
            ..FakeBackend::default()
        });

        let err = manager.configure_for_recording().await.unwrap_err();
        assert!(matches!(err, Error::AudioEngine(_)));
        assert_eq!(manager.mode(), AudioMode::Inactive);
    }

    #[tokio::test]
    async fn test_same_mode_is_not_reconfigured() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let manager = AudioSessionManager::new(FakeBackend {
            calls: Arc::clone(&calls),
            ..FakeBackend::default()
        });

        manager.configure_for_playback().await.unwrap();
        manager.configure_for_playback().await.unwrap();

        assert_eq!(calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_switches_do_not_interleave() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let manager = AudioSessionManager::new(FakeBackend {
            calls: Arc::clone(&calls),
            ..FakeBackend::default()
        });

        let a = manager.clone();
        let b = manager.clone();
        let (ra, rb) = tokio::join!(a.configure_for_recording(), b.configure_for_playback());
        ra.unwrap();
        rb.unwrap();

        // Each switch is an uninterrupted deactivate, category, activate triple
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 6);
        for triple in calls.chunks(3) {
            assert_eq!(triple[0], "active false");
            assert!(triple[1].starts_with("category"));
            assert_eq!(triple[2], "active true");
        }
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let manager = AudioSessionManager::new(FakeBackend {
            calls: Arc::clone(&calls),
            ..FakeBackend::default()
        });

        manager.release().await;
        manager.configure_for_recording().await.unwrap();
        manager.release().await;
        manager.release().await;

        assert_eq!(manager.mode(), AudioMode::Inactive);
        assert_eq!(calls.lock().unwrap().len(), 4);
    }
}
