/// Client version advertised in `client_hello`.
pub const CLIENT_VERSION: &str = "1.0.0";

/// Largest inbound text frame the agent will decode (1 MiB).
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Command asking the backend to report the status of its subsystems.
pub const CMD_CHECK_STATUS: &str = "check_status";

/// Command asking the backend to start the detection monitor.
pub const CMD_START_MONITORING: &str = "start_monitoring";

/// Subsystem probed by the status check.
pub const TARGET_VOICEVOX: &str = "voicevox";

/// `voicevox_status.status` value meaning the voice engine is reachable.
pub const VOICEVOX_AVAILABLE: &str = "available";

/// `status_update.status` value that must be surfaced to the user.
pub const STATUS_ERROR: &str = "error";

/// Count reported when a double-encoded alert payload cannot be rescued.
pub const RESCUE_DEFAULT_COUNT: u64 = 3;

/// Inbound `type` values the agent understands.
pub const KNOWN_TYPES: &[&str] = &[
    "voicevox_status",
    "speak",
    "status_update",
    "zombie_overload",
    "zombie_few",
    "zombie_warning",
    "notification",
    "detection",
    "test_detection",
];
