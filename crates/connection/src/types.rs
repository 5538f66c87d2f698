//! Public types for the backend connection manager.

use std::fmt;
use std::time::Duration;

/// Lifecycle state of the backend connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Created, no attempt made yet.
    Idle,
    /// Dial in progress, connect timeout armed.
    Connecting,
    /// Socket open, handshake sent.
    Open,
    /// Shutdown requested, socket being closed.
    Closing,
    /// Closed by the agent. No reconnect is scheduled.
    Closed,
    /// Waiting for the next attempt after a disconnect.
    Reconnecting,
    /// Attempt budget spent, recovery cooldown armed.
    Failed,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events emitted by the connection manager.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// The lifecycle state changed.
    StatusChanged {
        state: ConnectionState,
        /// Reconnection attempts since the last successful open.
        attempt: u32,
        max_attempts: u32,
    },
    /// A text frame arrived from the backend.
    Message(String),
    /// A connection problem that should be shown to the user.
    Error(String),
}

/// Timing and retry policy of the connection manager.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// How long a dial may take before it is treated as failed.
    pub connect_timeout: Duration,
    /// Fixed delay between reconnection attempts.
    pub reconnect_interval: Duration,
    /// Attempts allowed before entering the recovery cooldown.
    pub max_attempts: u32,
    /// Cooldown after the budget is spent; the counter resets afterwards.
    pub recovery_delay: Duration,
    /// Delay between open and the `start_monitoring` command.
    pub start_monitoring_delay: Duration,
    /// Delay between `start()` and the first attempt.
    pub startup_delay: Duration,
    /// Connection errors are not surfaced during this window after creation.
    pub error_grace: Duration,
    /// Outbound frame queue depth.
    pub send_buffer: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            reconnect_interval: Duration::from_secs(5),
            max_attempts: 10,
            recovery_delay: Duration::from_secs(20),
            start_monitoring_delay: Duration::from_secs(2),
            startup_delay: Duration::from_secs(5),
            error_grace: Duration::from_secs(5),
            send_buffer: 64,
        }
    }
}

/// User-facing message for a transport error.
pub(crate) const ERR_CONNECTION: &str = "An error occurred while connecting to the backend.";

/// User-facing message once the attempt budget is spent.
pub(crate) const ERR_UNREACHABLE: &str =
    "Cannot reach the backend server. Check that it is running.";
