//! User-facing error display policy.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::collaborator::Renderer;

#[derive(Debug, Clone)]
pub struct ErrorSurfaceConfig {
    /// Errors are suppressed for this long after startup.
    pub grace: Duration,
    /// An identical message within this window is suppressed.
    pub repeat_window: Duration,
}

impl Default for ErrorSurfaceConfig {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(5),
            repeat_window: Duration::from_secs(3),
        }
    }
}

/// Forwards errors to the renderer, suppressing startup noise and floods.
pub struct ErrorSurface {
    renderer: Arc<dyn Renderer>,
    config: ErrorSurfaceConfig,
    started: Instant,
    last: Mutex<Option<(String, Instant)>>,
}

impl ErrorSurface {
    pub fn new(renderer: Arc<dyn Renderer>, config: ErrorSurfaceConfig) -> Self {
        Self {
            renderer,
            config,
            started: Instant::now(),
            last: Mutex::new(None),
        }
    }

    /// Shows `message` unless still in the startup grace period or repeated.
    ///
    /// Returns whether the message was shown.
    pub fn report(&self, message: &str) -> bool {
        if self.started.elapsed() < self.config.grace {
            debug!(message, "error suppressed during startup grace period");
            return false;
        }
        self.report_forced(message)
    }

    /// Like [`report`](Self::report) but ignores the grace period.
    pub fn report_forced(&self, message: &str) -> bool {
        let now = Instant::now();
        {
            let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
            let repeated = last.as_ref().is_some_and(|(prev, at)| {
                prev == message && now.duration_since(*at) < self.config.repeat_window
            });
            if repeated {
                debug!(message, "repeated error suppressed");
                return false;
            }
            *last = Some((message.to_string(), now));
        }
        self.renderer.show_error(message);
        true
    }
}
