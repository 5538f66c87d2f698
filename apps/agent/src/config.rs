//! Agent configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/hisho/agent.toml`
//! - Windows: `%APPDATA%/hisho/agent.toml`

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use hisho_connection::endpoint::{DEFAULT_WS_URL, DEFAULT_WS_URL_ALT};
use hisho_connection::{ConnectionConfig, Endpoint};
use hisho_speech::SchedulerConfig;

/// Agent configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub connection: ConnectionSettings,

    #[serde(default)]
    pub voice: VoiceConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub alerts: AlertConfig,
}

/// Backend event source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    #[serde(default = "default_ws_url_alt")]
    pub ws_url_alt: String,

    /// Try `ws_url_alt` first.
    #[serde(default = "default_true")]
    pub prefer_alternate: bool,
}

/// Reconnection timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_reconnect_interval_secs")]
    pub reconnect_interval_secs: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Cooldown after `max_attempts` failed retries.
    #[serde(default = "default_recovery_delay_secs")]
    pub recovery_delay_secs: u64,
}

/// Speech synthesis endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_speaker_id")]
    pub speaker_id: u32,

    /// Upper bound on one synthesis request or preset clip.
    #[serde(default = "default_voice_timeout_secs")]
    pub timeout_secs: u64,
}

/// Preset clip playback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Directory holding `<preset>.wav` clips.
    #[serde(default = "default_preset_dir")]
    pub preset_dir: String,

    /// External command that plays a clip given its path.
    #[serde(default = "default_player")]
    pub player: String,

    #[serde(default = "default_player_args")]
    pub player_args: Vec<String>,
}

/// Alert-class throttling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Event types subject to cooldown and audio exclusion.
    #[serde(default = "default_alert_events")]
    pub events: Vec<String>,

    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

fn default_ws_url() -> String {
    DEFAULT_WS_URL.into()
}

fn default_ws_url_alt() -> String {
    DEFAULT_WS_URL_ALT.into()
}

fn default_true() -> bool {
    true
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_reconnect_interval_secs() -> u64 {
    5
}

fn default_max_attempts() -> u32 {
    10
}

fn default_recovery_delay_secs() -> u64 {
    20
}

fn default_api_url() -> String {
    "http://127.0.0.1:8000".into()
}

fn default_speaker_id() -> u32 {
    8
}

fn default_voice_timeout_secs() -> u64 {
    30
}

fn default_preset_dir() -> String {
    config_dir().join("presets").to_string_lossy().into_owned()
}

fn default_player() -> String {
    if cfg!(target_os = "macos") {
        "afplay".into()
    } else if cfg!(target_os = "linux") {
        "paplay".into()
    } else {
        "ffplay".into()
    }
}

fn default_player_args() -> Vec<String> {
    if cfg!(any(target_os = "macos", target_os = "linux")) {
        Vec::new()
    } else {
        vec!["-nodisp".into(), "-autoexit".into()]
    }
}

fn default_alert_events() -> Vec<String> {
    vec!["zombie_warning".into(), "zombie_few".into()]
}

fn default_cooldown_secs() -> u64 {
    10
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            ws_url_alt: default_ws_url_alt(),
            prefer_alternate: default_true(),
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            reconnect_interval_secs: default_reconnect_interval_secs(),
            max_attempts: default_max_attempts(),
            recovery_delay_secs: default_recovery_delay_secs(),
        }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            speaker_id: default_speaker_id(),
            timeout_secs: default_voice_timeout_secs(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            preset_dir: default_preset_dir(),
            player: default_player(),
            player_args: default_player_args(),
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            events: default_alert_events(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

impl Config {
    /// Loads configuration from disk, or creates a default if not found.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(&self.backend.ws_url, &self.backend.ws_url_alt)
            .with_preference(self.backend.prefer_alternate)
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        let c = &self.connection;
        ConnectionConfig {
            connect_timeout: Duration::from_secs(c.connect_timeout_secs),
            reconnect_interval: Duration::from_secs(c.reconnect_interval_secs),
            max_attempts: c.max_attempts,
            recovery_delay: Duration::from_secs(c.recovery_delay_secs),
            ..ConnectionConfig::default()
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            alert_events: self.alerts.events.iter().cloned().collect::<HashSet<_>>(),
            alert_cooldown: Duration::from_secs(self.alerts.cooldown_secs),
            audio_timeout: self.voice.timeout(),
            ..SchedulerConfig::default()
        }
    }
}

impl VoiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn config_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home).join(".config").join("hisho")
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("hisho")
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        PathBuf::from("/tmp/hisho")
    }
}

/// Returns the platform-specific configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("agent.toml")
}
