//! Notification scheduling for the desktop agent.
//!
//! [`NotificationScheduler`] turns routed events into one notification at a
//! time: it deduplicates repeats, throttles alert-class events, owns every
//! hide / talk / animation timer, and drives the [`Renderer`] and
//! [`AudioBackend`] collaborators. [`ErrorSurface`] applies the user-facing
//! error policy on top of the same renderer.

pub mod animation;
pub mod collaborator;
pub mod scheduler;
pub mod surface;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use animation::Animation;
pub use collaborator::{AudioBackend, AudioFuture, Renderer, SpeechEnd};
pub use scheduler::{
    NotificationRequest, NotificationScheduler, SchedulerConfig, SpeakFuture,
    estimate_speech_duration,
};
pub use surface::{ErrorSurface, ErrorSurfaceConfig};

/// Failures reported by renderer and audio collaborators.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("renderer unavailable: {0}")]
    Renderer(String),

    #[error("speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("preset playback failed: {0}")]
    Playback(String),
}
