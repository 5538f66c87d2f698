//! Recording collaborator doubles.
//!
//! Every call is appended to a shared log as a short string such as
//! `show:「hi」`, `expr:normal` or `anim:stop:trembling`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use std::sync::{Arc, Mutex, PoisonError};

use crate::CollaboratorError;
use crate::animation::Animation;
use crate::collaborator::{AudioBackend, AudioFuture, Renderer, SpeechEnd};

#[derive(Debug, Default)]
pub struct Log(Mutex<Vec<String>>);

impl Log {
    pub fn push(&self, entry: impl Into<String>) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of entries starting with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.entries().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

#[derive(Debug, Default)]
pub struct RecordingRenderer {
    pub log: Log,
    fail_show: AtomicBool,
}

impl RecordingRenderer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_fail_show(&self, fail: bool) {
        self.fail_show.store(fail, Ordering::Relaxed);
    }
}

impl Renderer for RecordingRenderer {
    fn show(&self, text: &str) -> Result<(), CollaboratorError> {
        if self.fail_show.load(Ordering::Relaxed) {
            return Err(CollaboratorError::Renderer("surface missing".into()));
        }
        self.log.push(format!("show:{text}"));
        Ok(())
    }

    fn hide(&self) {
        self.log.push("hide");
    }

    fn set_expression(&self, emotion: &str) {
        self.log.push(format!("expr:{emotion}"));
    }

    fn start_talking(&self) {
        self.log.push("talk:start");
    }

    fn stop_talking(&self) {
        self.log.push("talk:stop");
    }

    fn start_animation(&self, animation: Animation) {
        self.log.push(format!("anim:start:{}", animation.as_str()));
    }

    fn stop_animation(&self, animation: Animation) {
        self.log.push(format!("anim:stop:{}", animation.as_str()));
    }

    fn show_error(&self, message: &str) {
        self.log.push(format!("error:{message}"));
    }

    fn on_speech_end(&self, end: &SpeechEnd) {
        self.log
            .push(format!("end:{}:{}:{}", end.event_type, end.message, end.spoke));
    }
}

#[derive(Debug, Default)]
pub struct RecordingAudio {
    pub log: Log,
    fail_synthesis: AtomicBool,
    fail_preset: AtomicBool,
    /// Milliseconds each synthesis call takes.
    synthesis_delay_ms: AtomicU64,
}

impl RecordingAudio {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_fail_synthesis(&self, fail: bool) {
        self.fail_synthesis.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_preset(&self, fail: bool) {
        self.fail_preset.store(fail, Ordering::Relaxed);
    }

    pub fn set_synthesis_delay(&self, delay: Duration) {
        let ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.synthesis_delay_ms.store(ms, Ordering::Relaxed);
    }
}

impl AudioBackend for RecordingAudio {
    fn synthesize<'a>(&'a self, text: &'a str, emotion: &'a str) -> AudioFuture<'a> {
        Box::pin(async move {
            self.log.push(format!("say:{emotion}:{text}"));
            let delay = self.synthesis_delay_ms.load(Ordering::Relaxed);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            if self.fail_synthesis.load(Ordering::Relaxed) {
                return Err(CollaboratorError::Synthesis("engine offline".into()));
            }
            Ok(())
        })
    }

    fn play_preset<'a>(&'a self, preset: &'a str) -> AudioFuture<'a> {
        Box::pin(async move {
            self.log.push(format!("preset:{preset}"));
            if self.fail_preset.load(Ordering::Relaxed) {
                return Err(CollaboratorError::Playback("clip missing".into()));
            }
            Ok(())
        })
    }
}
