//! Speech synthesis over HTTP and preset clip playback.
//!
//! Synthesis is delegated to the backend's voice endpoint, which plays the
//! audio itself. Presets are local `.wav` clips played by an external command.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::process::Command;

use hisho_speech::{AudioBackend, AudioFuture, CollaboratorError};

use crate::config::{AudioConfig, VoiceConfig};

const SPEAK_PATH: &str = "/api/voice/speak";

#[derive(Debug, Serialize)]
struct SpeakBody<'a> {
    text: &'a str,
    emotion: &'a str,
    speaker_id: u32,
}

/// Errors from the voice backend.
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("voice API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid preset name: {0}")]
    InvalidPreset(String),

    #[error("preset not found: {}", .0.display())]
    MissingPreset(PathBuf),

    #[error("player failed: {0}")]
    Player(String),
}

pub struct VoiceBackend {
    http: reqwest::Client,
    speak_url: String,
    speaker_id: u32,
    preset_dir: PathBuf,
    player: String,
    player_args: Vec<String>,
}

impl VoiceBackend {
    pub fn new(voice: &VoiceConfig, audio: &AudioConfig) -> Result<Self, VoiceError> {
        // Local sidecar: ignore proxy environment variables.
        let http = reqwest::Client::builder()
            .no_proxy()
            .timeout(voice.timeout())
            .build()?;
        Ok(Self {
            http,
            speak_url: format!("{}{SPEAK_PATH}", voice.api_url.trim_end_matches('/')),
            speaker_id: voice.speaker_id,
            preset_dir: PathBuf::from(&audio.preset_dir),
            player: audio.player.clone(),
            player_args: audio.player_args.clone(),
        })
    }

    async fn post_speak(&self, text: &str, emotion: &str) -> Result<(), VoiceError> {
        let body = SpeakBody {
            text,
            emotion,
            speaker_id: self.speaker_id,
        };
        let resp = self.http.post(&self.speak_url).json(&body).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(VoiceError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    async fn run_player(&self, preset: &str) -> Result<(), VoiceError> {
        let path = preset_path(&self.preset_dir, preset)?;
        if !path.is_file() {
            return Err(VoiceError::MissingPreset(path));
        }

        tracing::debug!(preset, player = %self.player, "playing preset");
        let status = Command::new(&self.player)
            .args(&self.player_args)
            .arg(&path)
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| VoiceError::Player(format!("{}: {e}", self.player)))?;

        if !status.success() {
            return Err(VoiceError::Player(format!("{} exited with {status}", self.player)));
        }
        Ok(())
    }
}

/// Resolves `<dir>/<preset>.wav`, rejecting names that escape `dir`.
fn preset_path(dir: &Path, preset: &str) -> Result<PathBuf, VoiceError> {
    if preset.is_empty() || preset.contains(['/', '\\']) || preset.contains("..") {
        return Err(VoiceError::InvalidPreset(preset.to_string()));
    }
    Ok(dir.join(format!("{preset}.wav")))
}

impl AudioBackend for VoiceBackend {
    fn synthesize<'a>(&'a self, text: &'a str, emotion: &'a str) -> AudioFuture<'a> {
        Box::pin(async move {
            self.post_speak(text, emotion)
                .await
                .map_err(|e| CollaboratorError::Synthesis(e.to_string()))
        })
    }

    fn play_preset<'a>(&'a self, preset: &'a str) -> AudioFuture<'a> {
        Box::pin(async move {
            self.run_player(preset)
                .await
                .map_err(|e| CollaboratorError::Playback(e.to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Accepts one HTTP request, answers with `status`, and returns the body.
    async fn one_shot_server(status: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];

            let (header_end, content_length) = loop {
                let n = stream.read(&mut chunk).await.unwrap();
                assert!(n > 0, "client closed before sending headers");
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&buf[..pos]).to_lowercase();
                    let len = head
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .map(|v| v.trim().parse::<usize>().unwrap())
                        .unwrap_or(0);
                    break (pos + 4, len);
                }
            };
            while buf.len() < header_end + content_length {
                let n = stream.read(&mut chunk).await.unwrap();
                assert!(n > 0, "client closed before sending body");
                buf.extend_from_slice(&chunk[..n]);
            }

            let response = format!("HTTP/1.1 {status}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();

            let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
            assert!(head.starts_with("POST /api/voice/speak "), "{head}");
            String::from_utf8(buf[header_end..header_end + content_length].to_vec()).unwrap()
        });

        (url, handle)
    }

    fn backend(api_url: &str, preset_dir: &Path, player: &str) -> VoiceBackend {
        backend_with_timeout(api_url, preset_dir, player, 30)
    }

    fn backend_with_timeout(
        api_url: &str,
        preset_dir: &Path,
        player: &str,
        timeout_secs: u64,
    ) -> VoiceBackend {
        let voice = VoiceConfig {
            api_url: api_url.to_string(),
            speaker_id: 8,
            timeout_secs,
        };
        let audio = AudioConfig {
            preset_dir: preset_dir.to_string_lossy().into_owned(),
            player: player.to_string(),
            player_args: Vec::new(),
        };
        VoiceBackend::new(&voice, &audio).unwrap()
    }

    #[tokio::test]
    async fn synthesize_posts_text_emotion_and_speaker() {
        let (url, server) = one_shot_server("200 OK").await;
        let tmp = tempfile::tempdir().unwrap();
        let voice = backend(&url, tmp.path(), "true");

        voice.synthesize("こんにちは", "normal").await.unwrap();

        let body: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(body["text"], "こんにちは");
        assert_eq!(body["emotion"], "normal");
        assert_eq!(body["speaker_id"], 8);
    }

    #[tokio::test]
    async fn synthesize_fails_on_error_status() {
        let (url, server) = one_shot_server("503 Service Unavailable").await;
        let tmp = tempfile::tempdir().unwrap();
        let voice = backend(&url, tmp.path(), "true");

        let err = voice.synthesize("hi", "normal").await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Synthesis(_)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn synthesize_fails_when_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let tmp = tempfile::tempdir().unwrap();
        let voice = backend(&url, tmp.path(), "true");
        assert!(voice.synthesize("hi", "normal").await.is_err());
    }

    #[tokio::test]
    async fn synthesize_times_out_on_silent_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        // Accepts the connection and never answers.
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            drop(stream);
        });

        let tmp = tempfile::tempdir().unwrap();
        let voice = backend_with_timeout(&url, tmp.path(), "true", 1);
        let started = std::time::Instant::now();
        let err = voice.synthesize("hi", "normal").await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Synthesis(_)));
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
        server.abort();
    }

    #[test]
    fn preset_names_cannot_escape_dir() {
        let dir = Path::new("/presets");
        assert_eq!(
            preset_path(dir, "alert").unwrap(),
            PathBuf::from("/presets/alert.wav")
        );
        for bad in ["", "../secret", "a/b", "a\\b", ".."] {
            assert!(
                matches!(preset_path(dir, bad), Err(VoiceError::InvalidPreset(_))),
                "{bad:?} accepted"
            );
        }
    }

    #[tokio::test]
    async fn missing_preset_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let voice = backend("http://127.0.0.1:9", tmp.path(), "true");
        let err = voice.play_preset("nope").await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Playback(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn preset_runs_player() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("chime.wav"), b"RIFF").unwrap();

        let ok = backend("http://127.0.0.1:9", tmp.path(), "true");
        ok.play_preset("chime").await.unwrap();

        let failing = backend("http://127.0.0.1:9", tmp.path(), "false");
        assert!(failing.play_preset("chime").await.is_err());
    }
}
