//! Application orchestrator: wires the connection, router and scheduler.

use std::sync::Arc;

use hisho_connection::{ConnectionEvent, ConnectionManager, ConnectionState};
use hisho_router::{Handled, MessageRouter};
use hisho_speech::{AudioBackend, ErrorSurface, ErrorSurfaceConfig, NotificationScheduler, Renderer};

use crate::config::Config;
use crate::display::LogRenderer;
use crate::voice::VoiceBackend;

/// Consumer side of the connection: routes frames and surfaces errors.
pub struct Agent {
    router: MessageRouter,
    errors: Arc<ErrorSurface>,
}

impl Agent {
    pub fn new(config: &Config, renderer: Arc<LogRenderer>, audio: Arc<dyn AudioBackend>) -> Self {
        let errors = Arc::new(ErrorSurface::new(
            Arc::clone(&renderer) as Arc<dyn Renderer>,
            ErrorSurfaceConfig::default(),
        ));
        Self::with_parts(config, renderer, audio, errors)
    }

    fn with_parts(
        config: &Config,
        renderer: Arc<LogRenderer>,
        audio: Arc<dyn AudioBackend>,
        errors: Arc<ErrorSurface>,
    ) -> Self {
        let scheduler = NotificationScheduler::new(
            Arc::clone(&renderer) as Arc<dyn Renderer>,
            audio,
            config.scheduler_config(),
        );
        let router = MessageRouter::new(scheduler, Arc::clone(&errors), renderer);
        Self { router, errors }
    }

    /// Handles one connection event. Returns the handler for message frames.
    pub fn handle(&self, event: ConnectionEvent) -> Option<Handled> {
        match event {
            ConnectionEvent::Message(raw) => self.router.route(&raw),
            // The connection machine already applies its own startup grace.
            ConnectionEvent::Error(message) => {
                self.errors.report_forced(&message);
                None
            }
            ConnectionEvent::StatusChanged {
                state,
                attempt,
                max_attempts,
            } => {
                match state {
                    ConnectionState::Reconnecting | ConnectionState::Failed => {
                        tracing::info!(%state, attempt, max_attempts, "connection status");
                    }
                    _ => tracing::info!(%state, "connection status"),
                }
                None
            }
        }
    }
}

/// Runs the agent until shutdown is requested.
pub async fn run(config: Config) -> anyhow::Result<()> {
    // -- Collaborators --
    let renderer = Arc::new(LogRenderer::new());
    let audio: Arc<dyn AudioBackend> = Arc::new(VoiceBackend::new(&config.voice, &config.audio)?);
    let agent = Agent::new(&config, renderer, audio);

    // -- Connection --
    let manager = ConnectionManager::new(config.endpoint(), config.connection_config());
    let mut events = manager
        .take_events()
        .await
        .ok_or_else(|| anyhow::anyhow!("connection events already taken"))?;
    manager.start();

    tracing::info!(endpoint = %config.endpoint().current(), "agent ready");

    // -- Main loop --
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("SIGINT received, shutting down");
                break;
            }
            event = events.recv() => match event {
                Some(event) => {
                    agent.handle(event);
                }
                None => {
                    tracing::warn!("connection driver stopped");
                    break;
                }
            },
        }
    }

    // -- Graceful shutdown --
    tracing::info!("stopping services...");
    manager.shutdown().await;

    Ok(())
}
