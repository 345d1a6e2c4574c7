//! Defines the WebSocket message protocol between the browser client and the API server.

use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use vidya_core::{CallerEvent, DEFAULT_VOICE, Role};

/// Errors raised while decoding a single client frame. These never end the
/// connection; the frame is skipped.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("Malformed client JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Audio payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// The first message a client sends, selecting the voice.
#[derive(Deserialize, Debug)]
struct HandshakeMessage {
    voice: Option<String>,
}

/// An inbound envelope. Only `realtime_input.media.data` is meaningful.
#[derive(Deserialize, Debug)]
struct InboundEnvelope {
    realtime_input: Option<RealtimeInput>,
}

#[derive(Deserialize, Debug)]
struct RealtimeInput {
    media: Option<MediaChunk>,
}

#[derive(Deserialize, Debug)]
struct MediaChunk {
    data: Option<String>,
}

/// A decoded message from the client (browser).
#[derive(Debug, PartialEq)]
pub enum ClientFrame {
    /// Raw PCM bytes to forward upstream.
    Audio(Bytes),
    /// Valid JSON of a shape the relay does not act on.
    Ignored,
}

/// Extracts the voice from the handshake message, falling back to the
/// default voice when the field is missing, blank, or the JSON is invalid.
/// A non-blank voice is passed through exactly as sent.
pub fn parse_voice(text: &str) -> String {
    serde_json::from_str::<HandshakeMessage>(text)
        .ok()
        .and_then(|msg| msg.voice)
        .filter(|voice| !voice.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_VOICE.to_string())
}

/// Decodes one text frame received after the handshake.
pub fn decode_client_frame(text: &str) -> Result<ClientFrame, FrameError> {
    let envelope: InboundEnvelope = serde_json::from_str(text)?;
    let Some(data) = envelope
        .realtime_input
        .and_then(|input| input.media)
        .and_then(|media| media.data)
    else {
        return Ok(ClientFrame::Ignored);
    };
    let pcm = base64::engine::general_purpose::STANDARD.decode(data)?;
    Ok(ClientFrame::Audio(Bytes::from(pcm)))
}

/// Messages sent from the server to the client (browser).
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ServerMessage {
    /// A chunk of the model's voice (base64 encoded PCM16).
    Audio { audio: String },
    /// Transcribed or raw text for either side of the conversation.
    Text {
        text: String,
        role: Role,
        #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
        kind: Option<&'static str>,
    },
    TurnComplete {
        #[serde(rename = "turnComplete")]
        turn_complete: bool,
    },
    Interrupted { interrupted: bool },
}

impl From<CallerEvent> for ServerMessage {
    fn from(event: CallerEvent) -> Self {
        match event {
            CallerEvent::Audio(data) => ServerMessage::Audio {
                audio: base64::engine::general_purpose::STANDARD.encode(&data),
            },
            CallerEvent::Transcription { role, text } => ServerMessage::Text {
                text,
                role,
                kind: Some("transcription"),
            },
            CallerEvent::Text { role, text } => ServerMessage::Text {
                text,
                role,
                kind: None,
            },
            CallerEvent::TurnComplete => ServerMessage::TurnComplete {
                turn_complete: true,
            },
            CallerEvent::Interrupted => ServerMessage::Interrupted { interrupted: true },
        }
    }
}
