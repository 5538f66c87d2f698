//! Message routing for inbound backend frames.
//!
//! [`MessageRouter::route`] decodes one raw frame and dispatches it by
//! `type` (and `data.messageType` for notifications) to a handler. Handlers
//! never block: speech is admitted synchronously and its audio phase runs
//! on a spawned task.

pub mod alerts;
pub mod detection;
pub mod router;

pub use alerts::AlertKind;
pub use detection::DetectionOverlay;
pub use router::{Handled, MessageRouter};

/// Errors raised while handling a single frame.
///
/// Logged by [`MessageRouter::route`]; never propagated further.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("protocol error: {0}")]
    Protocol(#[from] hisho_protocol::ProtocolError),

    #[error("missing {0}")]
    MissingData(&'static str),
}
