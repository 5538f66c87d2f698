//! Headless presentation layer.
//!
//! Stands in for the character window: every renderer call becomes a
//! structured log line under the `hisho::display` target.

use std::sync::atomic::{AtomicBool, Ordering};

use hisho_protocol::BoundingBox;
use hisho_router::DetectionOverlay;
use hisho_speech::{Animation, CollaboratorError, Renderer, SpeechEnd};
use tracing::{debug, info, warn};

const TARGET: &str = "hisho::display";

#[derive(Debug, Default)]
pub struct LogRenderer {
    visible: AtomicBool,
}

impl LogRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the notification surface is currently shown.
    #[cfg(test)]
    pub(crate) fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }
}

impl Renderer for LogRenderer {
    fn show(&self, text: &str) -> Result<(), CollaboratorError> {
        self.visible.store(true, Ordering::SeqCst);
        info!(target: TARGET, text, "notification");
        Ok(())
    }

    fn hide(&self) {
        if self.visible.swap(false, Ordering::SeqCst) {
            debug!(target: TARGET, "notification hidden");
        }
    }

    fn set_expression(&self, emotion: &str) {
        debug!(target: TARGET, emotion, "expression");
    }

    fn start_talking(&self) {
        debug!(target: TARGET, "talking");
    }

    fn stop_talking(&self) {
        debug!(target: TARGET, "quiet");
    }

    fn start_animation(&self, animation: Animation) {
        debug!(target: TARGET, animation = animation.as_str(), "animation started");
    }

    fn stop_animation(&self, animation: Animation) {
        debug!(target: TARGET, animation = animation.as_str(), "animation stopped");
    }

    fn show_error(&self, message: &str) {
        warn!(target: TARGET, message, "error shown");
    }

    fn on_speech_end(&self, end: &SpeechEnd) {
        debug!(
            target: TARGET,
            event_type = %end.event_type,
            spoke = end.spoke,
            "speech finished"
        );
    }
}

impl DetectionOverlay for LogRenderer {
    fn show_detection(&self, boxes: &[BoundingBox], resnet_alive: bool) {
        info!(target: TARGET, boxes = boxes.len(), resnet_alive, "detection overlay");
    }
}
