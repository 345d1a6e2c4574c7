//! Opens and drives a Gemini Live WebSocket session.

use crate::types::{ClientMessage, parse_notification};
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use futures_util::{
    SinkExt, StreamExt,
    stream::{self, SplitSink, SplitStream},
};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message as WsMessage,
};
use tracing::{debug, info, warn};
use vidya_core::{
    LiveConnector, LiveSession, LiveSessionConfig, LiveSink, Notification, NotificationStream,
    UpstreamFrame,
};

pub const DEFAULT_BASE_URL: &str = "wss://generativelanguage.googleapis.com/ws";
pub const DEFAULT_API_VERSION: &str = "v1alpha";
pub const DEFAULT_SETUP_TIMEOUT: Duration = Duration::from_secs(15);

type GeminiSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects to the Gemini Live API.
#[derive(Debug, Clone)]
pub struct GeminiLiveConnector {
    base_url: String,
    api_version: String,
    setup_timeout: Duration,
}

impl Default for GeminiLiveConnector {
    fn default() -> Self {
        Self::new(DEFAULT_API_VERSION, DEFAULT_SETUP_TIMEOUT)
    }
}

impl GeminiLiveConnector {
    pub fn new(api_version: impl Into<String>, setup_timeout: Duration) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_version: api_version.into(),
            setup_timeout,
        }
    }

    /// Points the connector at a different host, e.g. a regional proxy.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// The WebSocket URL for the configured API version, without the key.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/google.ai.generativelanguage.{}.GenerativeService.BidiGenerateContent",
            self.base_url, self.api_version
        )
    }
}

#[async_trait]
impl LiveConnector for GeminiLiveConnector {
    async fn connect(&self, api_key: &str, config: &LiveSessionConfig) -> Result<LiveSession> {
        let url = format!("{}?key={}", self.endpoint(), api_key);
        let (ws_stream, _) = connect_async(url)
            .await
            .context("Failed to connect to Gemini Live WebSocket")?;
        info!(model = %config.model, voice = %config.voice, "Connected to Gemini Live WebSocket.");
        let (mut gemini_tx, mut gemini_rx) = ws_stream.split();

        let setup_msg = ClientMessage::setup(config);
        gemini_tx
            .send(WsMessage::Text(serde_json::to_string(&setup_msg)?.into()))
            .await
            .context("Failed to send setup message")?;

        tokio::time::timeout(self.setup_timeout, wait_for_setup_complete(&mut gemini_rx))
            .await
            .map_err(|_| anyhow!("Timed out waiting for Gemini setup to complete"))??;
        info!("Gemini session setup is complete.");

        Ok(LiveSession::new(
            Box::new(GeminiLiveSink {
                tx: gemini_tx,
                closed: false,
            }),
            notification_stream(gemini_rx),
        ))
    }
}

async fn wait_for_setup_complete(rx: &mut SplitStream<GeminiSocket>) -> Result<()> {
    while let Some(msg) = rx.next().await {
        match msg.context("Error reading from Gemini WebSocket during setup")? {
            WsMessage::Text(text) => {
                if parse_notification(text.as_bytes())?.setup_complete {
                    return Ok(());
                }
                debug!("Ignoring message received before setup completed.");
            }
            WsMessage::Binary(data) => {
                if parse_notification(&data)?.setup_complete {
                    return Ok(());
                }
                debug!("Ignoring message received before setup completed.");
            }
            WsMessage::Close(frame) => {
                let reason = frame
                    .map(|f| format!("{} {}", u16::from(f.code), f.reason.as_str()))
                    .unwrap_or_else(|| "no close frame".to_string());
                bail!("Gemini closed the connection during setup: {}", reason);
            }
            _ => {}
        }
    }
    bail!("Gemini connection ended before setup completed")
}

/// Turns the raw socket into a stream of decoded notifications. The stream
/// ends when the server closes the connection.
fn notification_stream(rx: SplitStream<GeminiSocket>) -> NotificationStream {
    Box::pin(stream::unfold(Some(rx), |state| async move {
        let mut rx = state?;
        loop {
            let item: Result<Notification> = match rx.next().await? {
                Ok(WsMessage::Text(text)) => parse_notification(text.as_bytes()),
                Ok(WsMessage::Binary(data)) => parse_notification(&data),
                Ok(WsMessage::Close(frame)) => {
                    info!(?frame, "Gemini WebSocket connection closed by server.");
                    return None;
                }
                Ok(_) => continue,
                Err(e) => {
                    warn!("Error reading from Gemini WebSocket: {}", e);
                    return Some((Err(e.into()), None));
                }
            };
            return Some((item, Some(rx)));
        }
    }))
}

/// The send half of a Gemini Live session.
pub struct GeminiLiveSink {
    tx: SplitSink<GeminiSocket, WsMessage>,
    closed: bool,
}

#[async_trait]
impl LiveSink for GeminiLiveSink {
    async fn send(&mut self, frame: UpstreamFrame) -> Result<()> {
        if self.closed {
            bail!("Gemini session is already closed");
        }
        let payload = serde_json::to_string(&ClientMessage::from(frame))?;
        self.tx
            .send(WsMessage::Text(payload.into()))
            .await
            .context("Failed to send frame to Gemini")
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.tx
            .close()
            .await
            .context("Failed to close Gemini WebSocket")
    }
}
