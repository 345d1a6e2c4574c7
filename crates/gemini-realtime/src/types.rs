//! Wire types for the Gemini Live `BidiGenerateContent` protocol.

use anyhow::{Context, Result};
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use vidya_core::{
    ContentPart, GoAway, LiveSessionConfig, Notification, ServerContent, Transcription,
    UpstreamFrame,
};

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Setup(BidiGenerateContentSetup),
    RealtimeInput(BidiGenerateContentRealtimeInput),
    ClientContent(BidiGenerateContentClientContent),
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BidiGenerateContentSetup {
    pub model: String,
    pub generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<AudioTranscriptionConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_transcription: Option<AudioTranscriptionConfig>,
}

/// Presence of this (empty) object turns transcription on.
#[derive(Serialize, Debug, Default)]
pub struct AudioTranscriptionConfig {}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<ResponseModality>,
    pub speech_config: SpeechConfig,
}

/// Sessions only ever ask for spoken output.
#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseModality {
    Audio,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Serialize, Debug)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<Part>,
}

#[derive(Serialize, Debug)]
pub struct Part {
    pub text: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BidiGenerateContentClientContent {
    pub turns: Vec<Content>,
    pub turn_complete: bool,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BidiGenerateContentRealtimeInput {
    pub audio: Blob,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

impl ClientMessage {
    /// Builds the `setup` message that must open every session.
    pub fn setup(config: &LiveSessionConfig) -> Self {
        let model = if config.model.starts_with("models/") {
            config.model.clone()
        } else {
            format!("models/{}", config.model)
        };
        let speech_config = SpeechConfig {
            voice_config: VoiceConfig {
                prebuilt_voice_config: PrebuiltVoiceConfig {
                    voice_name: config.voice.clone(),
                },
            },
        };
        let system_instruction = (!config.system_instruction.is_empty()).then(|| Content {
            role: None,
            parts: vec![Part {
                text: config.system_instruction.clone(),
            }],
        });

        ClientMessage::Setup(BidiGenerateContentSetup {
            model,
            generation_config: GenerationConfig {
                response_modalities: vec![ResponseModality::Audio],
                speech_config,
            },
            system_instruction,
            input_audio_transcription: config
                .input_transcription
                .then(AudioTranscriptionConfig::default),
            output_audio_transcription: config
                .output_transcription
                .then(AudioTranscriptionConfig::default),
        })
    }
}

impl From<UpstreamFrame> for ClientMessage {
    fn from(frame: UpstreamFrame) -> Self {
        match frame {
            UpstreamFrame::Audio { data, mime_type } => {
                ClientMessage::RealtimeInput(BidiGenerateContentRealtimeInput {
                    audio: Blob {
                        mime_type,
                        data: base64::engine::general_purpose::STANDARD.encode(&data),
                    },
                })
            }
            UpstreamFrame::Text { text, end_of_turn } => {
                ClientMessage::ClientContent(BidiGenerateContentClientContent {
                    turns: vec![Content {
                        role: Some("user".to_string()),
                        parts: vec![Part { text }],
                    }],
                    turn_complete: end_of_turn,
                })
            }
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    pub setup_complete: Option<serde_json::Value>,
    pub server_content: Option<LiveServerContent>,
    pub go_away: Option<ServerGoAway>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct LiveServerContent {
    pub model_turn: Option<ServerContentTurn>,
    pub input_transcription: Option<ServerTranscription>,
    pub output_transcription: Option<ServerTranscription>,
    pub turn_complete: Option<bool>,
    pub interrupted: Option<bool>,
}

#[derive(Deserialize, Debug)]
pub struct ServerContentTurn {
    #[serde(default)]
    pub parts: Vec<ServerPart>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ServerPart {
    pub text: Option<String>,
    pub thought: Option<bool>,
    pub inline_data: Option<ServerBlob>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ServerBlob {
    pub data: String,
}

#[derive(Deserialize, Debug)]
pub struct ServerTranscription {
    pub text: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ServerGoAway {
    pub time_left: Option<String>,
}

impl TryFrom<ServerMessage> for Notification {
    type Error = anyhow::Error;

    fn try_from(msg: ServerMessage) -> Result<Self> {
        let server_content = msg.server_content.map(ServerContent::try_from).transpose()?;
        Ok(Notification {
            setup_complete: msg.setup_complete.is_some(),
            server_content,
            go_away: msg.go_away.map(|g| GoAway {
                time_left: g.time_left,
            }),
        })
    }
}

impl TryFrom<LiveServerContent> for ServerContent {
    type Error = anyhow::Error;

    fn try_from(content: LiveServerContent) -> Result<Self> {
        let mut model_turn = Vec::new();
        for part in content.model_turn.map(|t| t.parts).unwrap_or_default() {
            if let Some(blob) = part.inline_data {
                let data = base64::engine::general_purpose::STANDARD
                    .decode(&blob.data)
                    .context("Inline audio is not valid base64")?;
                model_turn.push(ContentPart::Audio(Bytes::from(data)));
            }
            if let Some(text) = part.text {
                model_turn.push(ContentPart::Text {
                    text,
                    thought: part.thought.unwrap_or(false),
                });
            }
        }

        Ok(ServerContent {
            model_turn,
            input_transcription: transcription(content.input_transcription),
            output_transcription: transcription(content.output_transcription),
            turn_complete: content.turn_complete.unwrap_or(false),
            interrupted: content.interrupted.unwrap_or(false),
        })
    }
}

fn transcription(raw: Option<ServerTranscription>) -> Option<Transcription> {
    raw.and_then(|t| t.text).map(Transcription::new)
}

/// Decodes one server message from raw JSON bytes.
pub fn parse_notification(raw: &[u8]) -> Result<Notification> {
    let msg: ServerMessage =
        serde_json::from_slice(raw).context("Failed to parse Gemini server message")?;
    Notification::try_from(msg)
}
