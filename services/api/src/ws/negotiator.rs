//! One-time handshake that turns an accepted caller socket into a ready
//! upstream live session.

use super::protocol::parse_voice;
use crate::prompts::Prompts;
use axum::extract::ws::{Message, close_code};
use futures_util::{Stream, StreamExt};
use std::{fmt::Display, sync::Arc, time::Duration};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use vidya_core::{DEFAULT_VOICE, LiveConnector, LiveSession, LiveSessionConfig, UpstreamFrame};

#[derive(Debug, thiserror::Error)]
pub enum NegotiationError {
    #[error("API Key not found on server")]
    MissingCredential,
    #[error("Failed to open upstream session: {0:#}")]
    Upstream(anyhow::Error),
    #[error("Failed to send greeting: {0:#}")]
    Greeting(anyhow::Error),
}

impl NegotiationError {
    /// The WebSocket close code the caller should receive.
    pub fn close_code(&self) -> u16 {
        match self {
            NegotiationError::MissingCredential => close_code::POLICY,
            NegotiationError::Upstream(_) | NegotiationError::Greeting(_) => close_code::ERROR,
        }
    }
}

/// Per-session settings shared by every connection.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub model: String,
    pub system_instruction: String,
    pub greeting: String,
    pub transcription: bool,
    pub handshake_timeout: Duration,
}

impl SessionSettings {
    pub fn new(model: impl Into<String>, prompts: Prompts) -> Self {
        Self {
            model: model.into(),
            system_instruction: prompts.system_instruction,
            greeting: prompts.greeting,
            transcription: true,
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

/// A caller paired with a configured upstream session.
pub struct Negotiated {
    pub session: LiveSession,
    pub voice: String,
    pub greeting_sent: bool,
}

pub struct Negotiator {
    api_key: Option<String>,
    connector: Arc<dyn LiveConnector>,
    settings: SessionSettings,
}

impl Negotiator {
    pub fn new(
        api_key: Option<String>,
        connector: Arc<dyn LiveConnector>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.is_empty()),
            connector,
            settings,
        }
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    /// Builds the upstream configuration for a negotiated voice.
    pub fn session_config(&self, voice: &str) -> LiveSessionConfig {
        LiveSessionConfig::audio(
            self.settings.model.clone(),
            voice,
            self.settings.system_instruction.clone(),
        )
        .with_transcription(self.settings.transcription)
    }

    /// Runs the handshake over the caller's receive half.
    ///
    /// Returns `Ok(None)` when the caller leaves before the handshake
    /// completes; that is a normal termination, not a fault.
    pub async fn negotiate<R, E>(
        &self,
        caller_rx: &mut R,
    ) -> Result<Option<Negotiated>, NegotiationError>
    where
        R: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
    {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(NegotiationError::MissingCredential);
        };

        let Some(voice) = self.read_voice(caller_rx).await else {
            info!("Client disconnected before sending its configuration.");
            return Ok(None);
        };
        tracing::Span::current().record("voice", voice.as_str());

        let config = self.session_config(&voice);
        info!(model = %config.model, %voice, "Opening upstream live session.");
        let mut session = self
            .connector
            .connect(api_key, &config)
            .await
            .map_err(NegotiationError::Upstream)?;

        if let Err(e) = session
            .sink
            .send(UpstreamFrame::turn(self.settings.greeting.clone()))
            .await
        {
            let _ = session.sink.close().await;
            return Err(NegotiationError::Greeting(e));
        }
        debug!("Greeting trigger sent upstream.");

        Ok(Some(Negotiated {
            session,
            voice,
            greeting_sent: true,
        }))
    }

    /// Reads the voice selection. `None` means the caller went away.
    async fn read_voice<R, E>(&self, caller_rx: &mut R) -> Option<String>
    where
        R: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
    {
        let deadline = Instant::now() + self.settings.handshake_timeout;
        loop {
            let next = match tokio::time::timeout_at(deadline, caller_rx.next()).await {
                Ok(next) => next,
                Err(_) => {
                    warn!("Timed out waiting for client configuration; using default voice.");
                    return Some(DEFAULT_VOICE.to_string());
                }
            };
            match next {
                Some(Ok(Message::Text(text))) => return Some(parse_voice(&text)),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(Message::Binary(_))) => {
                    debug!("First client message was binary; using default voice.");
                    return Some(DEFAULT_VOICE.to_string());
                }
                Some(Ok(Message::Close(_))) | None => return None,
                Some(Err(e)) => {
                    debug!("Error reading client configuration: {}", e);
                    return None;
                }
            }
        }
    }
}
