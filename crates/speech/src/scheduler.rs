//! Notification scheduler.
//!
//! A `speak` call is admitted or rejected synchronously, in call order:
//! dedup, alert exclusion and alert cooldown are checked, pending hide
//! timers are cancelled and the surface is shown before `speak` returns.
//! The returned future then runs the audio phase (preset clip, synthesis)
//! and arms the hide timer.
//!
//! Invariant: at most one hide timer is pending across all event types.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::{Instant, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::animation::Animation;
use crate::collaborator::{AudioBackend, Renderer, SpeechEnd};

/// Event type used when the caller does not name one.
pub const DEFAULT_EVENT_TYPE: &str = "default";

/// Expression restored after a notification is hidden.
pub const NEUTRAL_EMOTION: &str = "normal";

const SPEECH_MS_PER_CHAR: u64 = 150;
const MIN_SPEECH: Duration = Duration::from_millis(2000);
const MAX_SPEECH: Duration = Duration::from_millis(10_000);

/// A boxed future resolving to whether the notification was spoken.
pub type SpeakFuture = Pin<Box<dyn Future<Output = bool> + Send + 'static>>;

/// Estimated time needed to speak `message`, clamped to 2–10 s.
pub fn estimate_speech_duration(message: &str) -> Duration {
    let ms = (message.chars().count() as u64).saturating_mul(SPEECH_MS_PER_CHAR);
    Duration::from_millis(ms).clamp(MIN_SPEECH, MAX_SPEECH)
}

/// Scheduler policy.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Display time when the request does not set one.
    pub default_display_time: Duration,
    /// Event types subject to audio exclusion and the shared cooldown.
    pub alert_events: HashSet<String>,
    /// Minimum spacing between accepted alert-class notifications.
    pub alert_cooldown: Duration,
    /// How long an animation accent runs.
    pub animation_window: Duration,
    /// Delay between hiding the surface and resetting the expression.
    pub settle_delay: Duration,
    /// Event types with this prefix stay open until dismissed.
    pub settings_prefix: String,
    /// Upper bound on each preset clip and synthesis call.
    pub audio_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_display_time: Duration::from_millis(5000),
            alert_events: ["zombie_warning", "zombie_few"]
                .into_iter()
                .map(String::from)
                .collect(),
            alert_cooldown: Duration::from_secs(10),
            animation_window: Duration::from_secs(2),
            settle_delay: Duration::from_millis(500),
            settings_prefix: "setting_".to_string(),
            audio_timeout: Duration::from_secs(30),
        }
    }
}

/// A single notification to show and speak.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    pub message: String,
    pub emotion: String,
    pub display_time: Option<Duration>,
    /// Wire animation name; unknown names are ignored.
    pub animation: Option<String>,
    pub event_type: String,
    pub preset_sound: Option<String>,
    pub auto_close: bool,
}

impl NotificationRequest {
    pub fn new(message: impl Into<String>, emotion: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            emotion: emotion.into(),
            display_time: None,
            animation: None,
            event_type: DEFAULT_EVENT_TYPE.to_string(),
            preset_sound: None,
            auto_close: true,
        }
    }

    pub fn display_time(mut self, display_time: Duration) -> Self {
        self.display_time = Some(display_time);
        self
    }

    pub fn animation(mut self, animation: impl Into<String>) -> Self {
        self.animation = Some(animation.into());
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = event_type.into();
        self
    }

    pub fn preset_sound(mut self, preset: impl Into<String>) -> Self {
        self.preset_sound = Some(preset.into());
        self
    }

    /// Keeps the surface open until another notification replaces it.
    pub fn keep_open(mut self) -> Self {
        self.auto_close = false;
        self
    }
}

/// Wraps notification text in 「」 unless it already is.
fn bubble_text(message: &str) -> String {
    if message.starts_with('「') && message.ends_with('」') {
        message.to_string()
    } else {
        format!("「{message}」")
    }
}

struct TimerEntry {
    id: u64,
    cancel: CancellationToken,
}

#[derive(Default)]
struct State {
    /// `(event_type, message)` of the last accepted notification.
    last_accepted: Option<(String, String)>,
    last_alert: Option<Instant>,
    hide_timers: HashMap<String, TimerEntry>,
    animations: HashMap<Animation, TimerEntry>,
    /// Bumped on every accepted notification.
    display_generation: u64,
    /// Bumped whenever talking starts.
    audio_generation: u64,
    playing: bool,
    next_timer_id: u64,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_timer_id += 1;
        self.next_timer_id
    }

    fn is_duplicate(&self, req: &NotificationRequest) -> bool {
        self.last_accepted
            .as_ref()
            .is_some_and(|(event_type, message)| {
                *event_type == req.event_type && *message == req.message
            })
    }
}

struct Inner {
    renderer: Arc<dyn Renderer>,
    audio: Arc<dyn AudioBackend>,
    config: SchedulerConfig,
    state: Mutex<State>,
}

/// Shared handle to the notification scheduler.
#[derive(Clone)]
pub struct NotificationScheduler {
    inner: Arc<Inner>,
}

impl NotificationScheduler {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        audio: Arc<dyn AudioBackend>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                renderer,
                audio,
                config,
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// Shows and speaks a notification.
    ///
    /// Admission happens before this returns; the future resolves to `true`
    /// only if the notification was accepted and synthesis succeeded. Must be
    /// called inside a Tokio runtime.
    pub fn speak(&self, req: NotificationRequest) -> SpeakFuture {
        let admitted = self.inner.admit(&req);
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            match admitted {
                Some(generation) => inner.perform(req, generation).await,
                None => false,
            }
        })
    }

    /// Speaks with a preset clip, deriving the animation from `emotion`.
    pub fn speak_with_preset(
        &self,
        preset: &str,
        message: &str,
        emotion: &str,
        display_time: Option<Duration>,
        event_type: &str,
    ) -> SpeakFuture {
        let mut req = NotificationRequest::new(message, emotion)
            .event_type(event_type)
            .preset_sound(preset);
        req.display_time = display_time;
        req.animation = Animation::for_emotion(emotion).map(|a| a.as_str().to_string());
        self.speak(req)
    }

    /// Sets the expression and plays a preset clip without speech.
    pub fn play_preset(&self, preset: &str, emotion: &str) -> SpeakFuture {
        self.inner.renderer.set_expression(emotion);
        let inner = Arc::clone(&self.inner);
        let preset = preset.to_string();
        Box::pin(async move {
            match inner.audio.play_preset(&preset).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(preset = %preset, "preset playback failed: {e}");
                    false
                }
            }
        })
    }

    /// Whether speech audio is currently playing.
    pub fn is_playing(&self) -> bool {
        self.inner.state().playing
    }

    /// Number of pending hide timers.
    pub fn pending_hide_timers(&self) -> usize {
        self.inner.state().hide_timers.len()
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the display generation of an accepted request.
    fn admit(&self, req: &NotificationRequest) -> Option<u64> {
        let mut st = self.state();

        if st.is_duplicate(req) {
            debug!(event_type = %req.event_type, "duplicate notification suppressed");
            return None;
        }

        let alert = self.config.alert_events.contains(&req.event_type);
        if alert && st.playing {
            debug!(event_type = %req.event_type, "alert suppressed while audio is playing");
            return None;
        }
        if alert
            && st
                .last_alert
                .is_some_and(|at| at.elapsed() < self.config.alert_cooldown)
        {
            debug!(event_type = %req.event_type, "alert suppressed by cooldown");
            return None;
        }

        for (_, timer) in st.hide_timers.drain() {
            timer.cancel.cancel();
        }

        self.renderer.set_expression(&req.emotion);
        if let Err(e) = self.renderer.show(&bubble_text(&req.message)) {
            error!(event_type = %req.event_type, "failed to show notification: {e}");
            return None;
        }

        st.display_generation += 1;
        st.last_accepted = Some((req.event_type.clone(), req.message.clone()));
        if alert {
            st.last_alert = Some(Instant::now());
        }
        info!(event_type = %req.event_type, emotion = %req.emotion, "notification shown");
        Some(st.display_generation)
    }

    async fn perform(self: Arc<Self>, req: NotificationRequest, generation: u64) -> bool {
        let limit = self.config.audio_timeout;

        if let Some(preset) = req.preset_sound.as_deref() {
            match timeout(limit, self.audio.play_preset(preset)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(preset, "preset playback failed: {e}"),
                Err(_) => warn!(preset, ?limit, "preset playback timed out"),
            }
        }

        // The hide timer below is armed however this phase ends.
        let spoke = match timeout(limit, self.audio.synthesize(&req.message, &req.emotion)).await {
            Ok(Ok(())) => {
                self.begin_talking(estimate_speech_duration(&req.message));
                true
            }
            Ok(Err(e)) => {
                error!(event_type = %req.event_type, "speech synthesis failed: {e}");
                false
            }
            Err(_) => {
                error!(event_type = %req.event_type, ?limit, "speech synthesis timed out");
                false
            }
        };

        if let Some(name) = req.animation.as_deref() {
            match Animation::parse(name) {
                Some(animation) => self.start_animation(animation),
                None => debug!(animation = name, "unknown animation ignored"),
            }
        }

        if req.auto_close && !req.event_type.starts_with(&self.config.settings_prefix) {
            let display = req.display_time.unwrap_or(self.config.default_display_time);
            self.arm_hide(req, generation, display, spoke);
        }

        spoke
    }

    fn begin_talking(self: &Arc<Self>, duration: Duration) {
        let generation = {
            let mut st = self.state();
            st.audio_generation += 1;
            st.playing = true;
            st.audio_generation
        };
        self.renderer.start_talking();

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let current = {
                let mut st = inner.state();
                let current = st.audio_generation == generation;
                if current {
                    st.playing = false;
                }
                current
            };
            if current {
                inner.renderer.stop_talking();
            }
        });
    }

    fn start_animation(self: &Arc<Self>, animation: Animation) {
        let cancel = CancellationToken::new();
        let id = {
            let mut st = self.state();
            let id = st.next_id();
            let entry = TimerEntry {
                id,
                cancel: cancel.clone(),
            };
            if let Some(prev) = st.animations.insert(animation, entry) {
                prev.cancel.cancel();
            }
            id
        };
        self.renderer.start_animation(animation);

        let inner = Arc::clone(self);
        let window = self.config.animation_window;
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(window) => {}
            }
            let current = {
                let mut st = inner.state();
                let current = st.animations.get(&animation).is_some_and(|t| t.id == id);
                if current {
                    st.animations.remove(&animation);
                }
                current
            };
            if current {
                inner.renderer.stop_animation(animation);
            }
        });
    }

    fn stop_animations(&self) {
        let stopped: Vec<Animation> = {
            let mut st = self.state();
            st.animations
                .drain()
                .map(|(animation, timer)| {
                    timer.cancel.cancel();
                    animation
                })
                .collect()
        };
        for animation in stopped {
            self.renderer.stop_animation(animation);
        }
    }

    fn arm_hide(
        self: &Arc<Self>,
        req: NotificationRequest,
        generation: u64,
        display: Duration,
        spoke: bool,
    ) {
        let cancel = CancellationToken::new();
        let id = {
            let mut st = self.state();
            if st.display_generation != generation {
                debug!(event_type = %req.event_type, "notification superseded before hide was armed");
                return;
            }
            let id = st.next_id();
            let entry = TimerEntry {
                id,
                cancel: cancel.clone(),
            };
            if let Some(prev) = st.hide_timers.insert(req.event_type.clone(), entry) {
                prev.cancel.cancel();
            }
            id
        };

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(display) => {}
            }
            inner.renderer.hide();
            inner.stop_animations();

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(inner.config.settle_delay) => {}
            }
            inner.finish(req, id, spoke);
        });
    }

    /// Final step of a hide: releases the timer slot and resets the character.
    fn finish(&self, req: NotificationRequest, id: u64, spoke: bool) {
        {
            let mut st = self.state();
            let current = st
                .hide_timers
                .get(&req.event_type)
                .is_some_and(|t| t.id == id);
            if !current {
                return;
            }
            st.hide_timers.remove(&req.event_type);
            if st.is_duplicate(&req) {
                st.last_accepted = None;
            }
        }

        self.renderer.set_expression(NEUTRAL_EMOTION);
        self.renderer.stop_talking();
        self.renderer.on_speech_end(&SpeechEnd {
            message: req.message,
            emotion: req.emotion,
            event_type: req.event_type,
            spoke,
        });
    }
}
