//! Interfaces to the rendering and audio layers.

use std::future::Future;
use std::pin::Pin;

use crate::CollaboratorError;
use crate::animation::Animation;

/// A boxed future returned by audio backend methods.
pub type AudioFuture<'a> = Pin<Box<dyn Future<Output = Result<(), CollaboratorError>> + Send + 'a>>;

/// The notification surface and character display.
///
/// Calls must not block: they are made while scheduler state is held.
pub trait Renderer: Send + Sync {
    /// Shows the notification surface with `text`.
    ///
    /// Returns `Ok` only once the surface is actually displayed.
    fn show(&self, text: &str) -> Result<(), CollaboratorError>;

    fn hide(&self);

    fn set_expression(&self, emotion: &str);

    fn start_talking(&self);

    fn stop_talking(&self);

    fn start_animation(&self, animation: Animation);

    fn stop_animation(&self, animation: Animation);

    /// Displays a user-facing error message.
    fn show_error(&self, message: &str);

    /// Called once a notification has been hidden and the expression reset.
    fn on_speech_end(&self, _end: &SpeechEnd) {}
}

/// Speech synthesis and preset clip playback.
pub trait AudioBackend: Send + Sync {
    /// Synthesizes and plays `text`. Resolves once playback has started.
    fn synthesize<'a>(&'a self, text: &'a str, emotion: &'a str) -> AudioFuture<'a>;

    /// Plays a named preset clip.
    fn play_preset<'a>(&'a self, preset: &'a str) -> AudioFuture<'a>;
}

/// Completion report for a hidden notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechEnd {
    pub message: String,
    pub emotion: String,
    pub event_type: String,
    /// Whether synthesis succeeded.
    pub spoke: bool,
}
