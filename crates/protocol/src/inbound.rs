use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ProtocolError;
use crate::constants::{KNOWN_TYPES, MAX_FRAME_SIZE, RESCUE_DEFAULT_COUNT};

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A frame whose `type` the agent understands.
    Known(InboundMessage),
    /// A well-formed frame with an unrecognized (or missing) `type`.
    Unknown(Option<String>),
}

/// Backend → agent messages, one variant per `type`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    VoicevoxStatus {
        #[serde(default)]
        status: String,
    },
    Speak(SpeakPayload),
    StatusUpdate {
        #[serde(default)]
        status: String,
        #[serde(default)]
        message: String,
    },
    /// `data` is kept raw; see [`AlertData::rescue`].
    ZombieOverload {
        #[serde(default)]
        data: Value,
    },
    ZombieFew {
        #[serde(default)]
        data: Value,
    },
    ZombieWarning {
        #[serde(default)]
        data: Value,
    },
    Notification {
        #[serde(default)]
        data: Option<NotificationData>,
    },
    Detection {
        #[serde(default)]
        data: Option<DetectionData>,
    },
    TestDetection {
        #[serde(default)]
        data: Option<DetectionData>,
    },
}

impl InboundMessage {
    /// Returns the wire `type` of this message.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::VoicevoxStatus { .. } => "voicevox_status",
            Self::Speak(_) => "speak",
            Self::StatusUpdate { .. } => "status_update",
            Self::ZombieOverload { .. } => "zombie_overload",
            Self::ZombieFew { .. } => "zombie_few",
            Self::ZombieWarning { .. } => "zombie_warning",
            Self::Notification { .. } => "notification",
            Self::Detection { .. } => "detection",
            Self::TestDetection { .. } => "test_detection",
        }
    }
}

/// Decodes a raw text frame.
///
/// Unknown types are not an error: the frame is returned as
/// [`Frame::Unknown`] so the caller can log and drop it.
pub fn decode(raw: &str) -> Result<Frame, ProtocolError> {
    if raw.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::Oversized(raw.len()));
    }

    let value: Value = serde_json::from_str(raw)?;
    let kind = value.get("type").and_then(Value::as_str).map(str::to_owned);

    match kind {
        Some(k) if KNOWN_TYPES.contains(&k.as_str()) => {
            Ok(Frame::Known(serde_json::from_value(value)?))
        }
        other => Ok(Frame::Unknown(other)),
    }
}

/// Payload of a `speak` frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeakPayload {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub emotion: Option<String>,
    #[serde(default)]
    pub display_time: Option<u64>,
    #[serde(default)]
    pub animation: Option<String>,
    #[serde(default, rename = "presetSound")]
    pub preset_sound: Option<String>,
}

/// Payload of a `notification` frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    #[serde(default)]
    pub message_type: Option<String>,
    #[serde(default)]
    pub preset_sound: Option<String>,
    #[serde(default)]
    pub speak_text: Option<String>,
    #[serde(default)]
    pub emotion: Option<String>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub count: Option<u64>,
}

/// Alert sub-kinds carried in `notification.data.messageType`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationKind {
    FewZombiesAlert,
    ZombieOverload,
    ZombieFew,
    Other(String),
}

impl NotificationData {
    /// Returns the alert sub-kind, if `messageType` is present.
    pub fn kind(&self) -> Option<NotificationKind> {
        self.message_type.as_deref().map(|t| match t {
            "fewZombiesAlert" => NotificationKind::FewZombiesAlert,
            "zombieOverload" => NotificationKind::ZombieOverload,
            "zombieFew" => NotificationKind::ZombieFew,
            other => NotificationKind::Other(other.to_string()),
        })
    }

    /// Alert data for the sub-kind handlers.
    pub fn alert_data(&self) -> AlertData {
        AlertData {
            count: self.count,
            ..AlertData::default()
        }
    }
}

/// Reads a count from an integer, an integral float or a numeric string.
/// Zero and anything else count as absent, so the caller's default applies.
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let count = match &value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 1.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    Ok(count.filter(|&c| c > 0))
}

/// Normalized alert payload (`zombie_*` frames).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertData {
    #[serde(
        default,
        deserialize_with = "lenient_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub count: Option<u64>,
    /// Raw payload kept when it could not be decoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl AlertData {
    /// Normalizes a raw `data` field.
    ///
    /// Some backend paths JSON-encode `data` twice, so a string is parsed
    /// again. Anything that still does not decode is wrapped under `source`
    /// with [`RESCUE_DEFAULT_COUNT`], so handlers always see an object.
    pub fn rescue(data: Value) -> Self {
        match data {
            Value::Null => Self::default(),
            Value::String(raw) => {
                serde_json::from_str::<Self>(&raw).unwrap_or_else(|_| Self::fallback(raw))
            }
            Value::Object(_) => {
                let raw = data.to_string();
                serde_json::from_value::<Self>(data).unwrap_or_else(|_| Self::fallback(raw))
            }
            other => Self::fallback(other.to_string()),
        }
    }

    fn fallback(source: String) -> Self {
        Self {
            count: Some(RESCUE_DEFAULT_COUNT),
            source: Some(source),
            extra: serde_json::Map::new(),
        }
    }
}

/// Payload of `detection` / `test_detection` frames.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionData {
    #[serde(default)]
    pub yolo: Vec<BoundingBox>,
    #[serde(default)]
    pub resnet_alive: bool,
}

impl DetectionData {
    /// Built-in sample shown when `test_detection` carries no data.
    pub fn sample() -> Self {
        Self {
            yolo: vec![
                BoundingBox {
                    x1: 100.0,
                    y1: 200.0,
                    x2: 200.0,
                    y2: 300.0,
                    confidence: 0.92,
                },
                BoundingBox {
                    x1: 400.0,
                    y1: 100.0,
                    x2: 480.0,
                    y2: 220.0,
                    confidence: 0.55,
                },
            ],
            resnet_alive: true,
        }
    }
}

/// A single detector hit in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub confidence: f64,
}
