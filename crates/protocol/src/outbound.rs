use serde::Serialize;

use crate::constants::{CLIENT_VERSION, CMD_CHECK_STATUS, CMD_START_MONITORING, TARGET_VOICEVOX};

/// Agent → backend messages.
///
/// The status check has no `type` field on the wire, so the two shapes are
/// serialized untagged.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutboundMessage {
    Typed(TypedMessage),
    Request(CommandRequest),
}

/// Outbound messages carrying a `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TypedMessage {
    ClientHello { client_info: ClientInfo },
    Command { command: String },
}

/// Untyped command with explicit targets (`{command, targets}`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandRequest {
    pub command: String,
    pub targets: Vec<String>,
}

/// Identification sent in `client_hello`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientInfo {
    pub version: String,
    /// RFC 3339 timestamp with millisecond precision.
    pub timestamp: String,
}

impl OutboundMessage {
    /// `{type:"client_hello", client_info:{version, timestamp}}`
    pub fn client_hello() -> Self {
        Self::Typed(TypedMessage::ClientHello {
            client_info: ClientInfo {
                version: CLIENT_VERSION.to_string(),
                timestamp: chrono::Utc::now()
                    .to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            },
        })
    }

    /// `{command:"check_status", targets:["voicevox"]}`
    pub fn check_status() -> Self {
        Self::Request(CommandRequest {
            command: CMD_CHECK_STATUS.to_string(),
            targets: vec![TARGET_VOICEVOX.to_string()],
        })
    }

    /// `{type:"command", command:"start_monitoring"}`
    pub fn start_monitoring() -> Self {
        Self::Typed(TypedMessage::Command {
            command: CMD_START_MONITORING.to_string(),
        })
    }

    /// Short label for logs.
    pub fn label(&self) -> &str {
        match self {
            Self::Typed(TypedMessage::ClientHello { .. }) => "client_hello",
            Self::Typed(TypedMessage::Command { command }) => command,
            Self::Request(req) => &req.command,
        }
    }
}
