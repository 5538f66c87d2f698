use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use hisho_protocol::constants::{STATUS_ERROR, VOICEVOX_AVAILABLE};
use hisho_protocol::{
    AlertData, DetectionData, Frame, InboundMessage, NotificationData, NotificationKind,
    SpeakPayload, decode,
};
use hisho_speech::{Animation, ErrorSurface, NotificationRequest, NotificationScheduler, SpeakFuture};

use crate::RouteError;
use crate::alerts::{ALERT_DISPLAY_TIME, AlertKind};
use crate::detection::DetectionOverlay;

const DEFAULT_EMOTION: &str = "normal";
const DEFAULT_DISPLAY_TIME: Duration = Duration::from_millis(5000);
const SPEAK_EVENT: &str = "speak";
const NOTIFICATION_EVENT: &str = "notification";

const MSG_PROCESSING_ERROR: &str = "An error occurred while processing a message.";
const MSG_VOICEVOX_UNAVAILABLE: &str = "Cannot reach VOICEVOX. Check that it is running.";

/// Which handler a frame was dispatched to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handled {
    VoicevoxStatus { available: bool },
    Speak,
    StatusUpdate { error: bool },
    /// `count` is `None` when the payload reports "many".
    Alert { kind: AlertKind, count: Option<u64> },
    /// New-format notification carrying its own text or preset.
    Notification,
    Detection { boxes: usize, resnet_alive: bool },
}

pub struct MessageRouter {
    scheduler: NotificationScheduler,
    errors: Arc<ErrorSurface>,
    overlay: Arc<dyn DetectionOverlay>,
}

impl MessageRouter {
    pub fn new(
        scheduler: NotificationScheduler,
        errors: Arc<ErrorSurface>,
        overlay: Arc<dyn DetectionOverlay>,
    ) -> Self {
        Self {
            scheduler,
            errors,
            overlay,
        }
    }

    /// Routes one raw frame.
    ///
    /// Returns the handler that ran, or `None` when the frame was dropped.
    /// Failures are logged and confined to this frame.
    pub fn route(&self, raw: &str) -> Option<Handled> {
        trace!(raw, "inbound frame");
        match self.dispatch(raw) {
            Ok(handled) => handled,
            Err(RouteError::Protocol(e)) => {
                warn!("failed to parse inbound frame: {e}");
                self.errors.report(MSG_PROCESSING_ERROR);
                None
            }
            Err(e) => {
                warn!("handler failed: {e}");
                None
            }
        }
    }

    fn dispatch(&self, raw: &str) -> Result<Option<Handled>, RouteError> {
        let msg = match decode(raw)? {
            Frame::Known(msg) => msg,
            Frame::Unknown(kind) => {
                debug!(
                    kind = kind.as_deref().unwrap_or("<missing>"),
                    "unhandled message type"
                );
                return Ok(None);
            }
        };
        debug!(kind = msg.type_name(), "routing message");

        let handled = match msg {
            InboundMessage::VoicevoxStatus { status } => self.voicevox_status(&status),
            InboundMessage::Speak(payload) => self.speak(payload)?,
            InboundMessage::StatusUpdate { status, message } => {
                self.status_update(&status, &message)
            }
            InboundMessage::ZombieOverload { data } => {
                self.alert(AlertKind::Overload, AlertData::rescue(data))
            }
            InboundMessage::ZombieFew { data } => {
                self.alert(AlertKind::Few, AlertData::rescue(data))
            }
            InboundMessage::ZombieWarning { data } => {
                self.alert(AlertKind::Warning, AlertData::rescue(data))
            }
            InboundMessage::Notification { data } => {
                return self.notification(data.ok_or(RouteError::MissingData("notification data"))?);
            }
            InboundMessage::Detection { data } => {
                self.detection(data.ok_or(RouteError::MissingData("detection data"))?)
            }
            InboundMessage::TestDetection { data } => {
                self.detection(data.unwrap_or_else(DetectionData::sample))
            }
        };
        Ok(Some(handled))
    }

    fn voicevox_status(&self, status: &str) -> Handled {
        let available = status == VOICEVOX_AVAILABLE;
        if available {
            debug!("VOICEVOX available");
        } else {
            warn!(status, "VOICEVOX unavailable");
            self.errors.report(MSG_VOICEVOX_UNAVAILABLE);
        }
        Handled::VoicevoxStatus { available }
    }

    fn status_update(&self, status: &str, message: &str) -> Handled {
        let error = status == STATUS_ERROR;
        if error {
            warn!(message, "backend reported an error");
            self.errors.report(message);
        } else {
            debug!(status, message, "backend status");
        }
        Handled::StatusUpdate { error }
    }

    fn speak(&self, payload: SpeakPayload) -> Result<Handled, RouteError> {
        let emotion = payload
            .emotion
            .unwrap_or_else(|| DEFAULT_EMOTION.to_string());
        let display_time = payload.display_time.map(Duration::from_millis);
        let text = payload.text.filter(|t| !t.is_empty());

        match (text, payload.preset_sound) {
            (Some(text), Some(preset)) => {
                let fut = self.scheduler.speak_with_preset(
                    &preset,
                    &text,
                    &emotion,
                    Some(display_time.unwrap_or(DEFAULT_DISPLAY_TIME)),
                    SPEAK_EVENT,
                );
                spawn_speech(fut, SPEAK_EVENT);
            }
            (None, Some(preset)) => {
                spawn_speech(self.scheduler.play_preset(&preset, &emotion), "preset");
            }
            (Some(text), None) => {
                let mut req = NotificationRequest::new(text, emotion);
                req.display_time = display_time;
                req.animation = payload.animation;
                spawn_speech(self.scheduler.speak(req), SPEAK_EVENT);
            }
            (None, None) => return Err(RouteError::MissingData("speak text")),
        }
        Ok(Handled::Speak)
    }

    fn notification(&self, data: NotificationData) -> Result<Option<Handled>, RouteError> {
        let emotion = data.emotion.as_deref().unwrap_or(DEFAULT_EMOTION);

        match (data.speak_text.as_deref(), data.preset_sound.as_deref()) {
            (Some(text), Some(preset)) => {
                let fut = self.scheduler.speak_with_preset(
                    preset,
                    text,
                    emotion,
                    Some(DEFAULT_DISPLAY_TIME),
                    NOTIFICATION_EVENT,
                );
                spawn_speech(fut, NOTIFICATION_EVENT);
                return Ok(Some(Handled::Notification));
            }
            (None, Some(preset)) => {
                spawn_speech(self.scheduler.play_preset(preset, emotion), "preset");
                return Ok(Some(Handled::Notification));
            }
            (Some(text), None) => {
                let mut req = NotificationRequest::new(text, emotion)
                    .display_time(DEFAULT_DISPLAY_TIME)
                    .event_type(NOTIFICATION_EVENT);
                req.animation = Animation::for_emotion(emotion).map(|a| a.as_str().to_string());
                spawn_speech(self.scheduler.speak(req), NOTIFICATION_EVENT);
                return Ok(Some(Handled::Notification));
            }
            (None, None) => {}
        }

        let kind = match data.kind() {
            Some(NotificationKind::FewZombiesAlert) => AlertKind::Warning,
            Some(NotificationKind::ZombieOverload) => AlertKind::Overload,
            Some(NotificationKind::ZombieFew) => AlertKind::Few,
            Some(NotificationKind::Other(other)) => {
                debug!(message_type = %other, "unknown notification kind");
                return Ok(None);
            }
            None => return Err(RouteError::MissingData("notification messageType")),
        };
        Ok(Some(self.alert(kind, data.alert_data())))
    }

    fn alert(&self, kind: AlertKind, data: AlertData) -> Handled {
        if let Some(source) = &data.source {
            debug!(event_type = kind.event_type(), source = %source, "alert payload rescued");
        }
        let count = data.count.or(kind.default_count());
        match count {
            Some(n) => info!(event_type = kind.event_type(), count = n, "zombie alert"),
            None => info!(event_type = kind.event_type(), count = "many", "zombie alert"),
        }

        let req = NotificationRequest::new(kind.pick_line(), kind.emotion())
            .display_time(ALERT_DISPLAY_TIME)
            .animation(kind.animation().as_str())
            .event_type(kind.event_type());
        spawn_speech(self.scheduler.speak(req), kind.event_type());
        Handled::Alert { kind, count }
    }

    fn detection(&self, data: DetectionData) -> Handled {
        self.overlay.show_detection(&data.yolo, data.resnet_alive);
        debug!(
            boxes = data.yolo.len(),
            resnet_alive = data.resnet_alive,
            "detection shown"
        );
        Handled::Detection {
            boxes: data.yolo.len(),
            resnet_alive: data.resnet_alive,
        }
    }
}

fn spawn_speech(fut: SpeakFuture, what: &'static str) {
    tokio::spawn(async move {
        let spoke = fut.await;
        debug!(what, spoke, "speech finished");
    });
}
