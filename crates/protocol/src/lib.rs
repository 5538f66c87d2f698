//! Wire protocol between the Hisho desktop agent and its backend.
//!
//! All traffic is JSON text frames over a single WebSocket. Inbound frames
//! are keyed by a top-level `type` field (see [`InboundMessage`]); outbound
//! traffic is limited to the handshake sequence in [`OutboundMessage`].

pub mod constants;
pub mod inbound;
pub mod outbound;

// Re-export primary types for convenience.
pub use inbound::{
    AlertData, BoundingBox, DetectionData, Frame, InboundMessage, NotificationData,
    NotificationKind, SpeakPayload, decode,
};
pub use outbound::{ClientInfo, OutboundMessage};

/// Errors produced while decoding inbound frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame too large ({0} bytes)")]
    Oversized(usize),
}
