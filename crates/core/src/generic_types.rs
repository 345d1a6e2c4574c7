use bytes::Bytes;

/// Voice used when the caller does not pick one.
pub const DEFAULT_VOICE: &str = "Zephyr";

/// MIME type attached to every PCM chunk forwarded upstream.
pub const INPUT_AUDIO_MIME_TYPE: &str = "audio/pcm;rate=16000";

/// Provider-neutral configuration for opening one live session.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveSessionConfig {
    pub model: String,
    pub voice: String,
    pub system_instruction: String,
    pub input_transcription: bool,
    pub output_transcription: bool,
}

impl LiveSessionConfig {
    /// An audio-only session with both transcription directions enabled.
    pub fn audio(
        model: impl Into<String>,
        voice: impl Into<String>,
        system_instruction: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            voice: voice.into(),
            system_instruction: system_instruction.into(),
            input_transcription: true,
            output_transcription: true,
        }
    }

    /// Toggles input and output transcription together.
    pub fn with_transcription(mut self, enabled: bool) -> Self {
        self.input_transcription = enabled;
        self.output_transcription = enabled;
        self
    }
}

/// A single frame sent to the upstream session.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamFrame {
    /// Raw PCM bytes streamed as realtime input. Never ends a turn.
    Audio { data: Bytes, mime_type: String },
    /// A text turn from the user side of the conversation.
    Text { text: String, end_of_turn: bool },
}

impl UpstreamFrame {
    /// A non-terminal 16 kHz PCM chunk.
    pub fn pcm_chunk(data: Bytes) -> Self {
        Self::Audio {
            data,
            mime_type: INPUT_AUDIO_MIME_TYPE.to_string(),
        }
    }

    /// A complete user turn that prompts the model to start speaking.
    pub fn turn(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            end_of_turn: true,
        }
    }
}

/// One event received from the upstream session's event stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Notification {
    pub setup_complete: bool,
    pub server_content: Option<ServerContent>,
    /// Set when the upstream announces it will drop the connection soon.
    pub go_away: Option<GoAway>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoAway {
    pub time_left: Option<String>,
}

/// The content-bearing part of a notification. Every field is an
/// independent signal; several may be set at once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerContent {
    pub model_turn: Vec<ContentPart>,
    pub input_transcription: Option<Transcription>,
    pub output_transcription: Option<Transcription>,
    pub turn_complete: bool,
    pub interrupted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    /// Inline PCM audio, already decoded from the wire encoding.
    Audio(Bytes),
    /// A text part. `thought` marks internal reasoning that is never spoken.
    Text { text: String, thought: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transcription {
    pub text: String,
}

impl Transcription {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}
