//! Inbound frame classification.

use tokio_tungstenite::tungstenite;
use tracing::{debug, trace, warn};

use hisho_protocol::constants::MAX_FRAME_SIZE;

/// What the driver should do with one item read from the socket.
#[derive(Debug, PartialEq)]
pub(crate) enum ReadOutcome {
    /// Text frame to forward to subscribers.
    Text(String),
    /// Ping that must be answered with a pong carrying the same payload.
    Ping(tungstenite::Bytes),
    /// The peer closed the connection or the stream ended.
    Closed(String),
    /// Transport failure.
    Failed(String),
    /// Nothing to do.
    Ignore,
}

pub(crate) fn classify(
    item: Option<Result<tungstenite::Message, tungstenite::Error>>,
) -> ReadOutcome {
    match item {
        Some(Ok(tungstenite::Message::Text(text))) => {
            if text.len() > MAX_FRAME_SIZE {
                warn!(size = text.len(), "dropping oversized frame");
                return ReadOutcome::Ignore;
            }
            ReadOutcome::Text(text.to_string())
        }
        Some(Ok(tungstenite::Message::Ping(data))) => {
            trace!("received ping");
            ReadOutcome::Ping(data)
        }
        Some(Ok(tungstenite::Message::Close(frame))) => {
            let reason = match frame {
                Some(f) => format!("closed by backend ({}: {})", u16::from(f.code), f.reason.as_str()),
                None => "closed by backend".to_string(),
            };
            debug!("{reason}");
            ReadOutcome::Closed(reason)
        }
        Some(Ok(_)) => ReadOutcome::Ignore,
        Some(Err(e)) => {
            warn!("backend read error: {e}");
            ReadOutcome::Failed(e.to_string())
        }
        None => {
            debug!("backend stream ended");
            ReadOutcome::Closed("stream ended".to_string())
        }
    }
}
