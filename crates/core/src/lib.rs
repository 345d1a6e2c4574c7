//! Provider-neutral building blocks for relaying a caller to a live
//! multimodal session.

pub mod events;
pub mod generic_types;
pub mod realtime_api;

pub use events::{CallerEvent, ClassifyOptions, Role};
pub use generic_types::{
    ContentPart, DEFAULT_VOICE, GoAway, INPUT_AUDIO_MIME_TYPE, LiveSessionConfig, Notification,
    ServerContent, Transcription, UpstreamFrame,
};
pub use realtime_api::{LiveConnector, LiveSession, LiveSink, NotificationStream};
