//! Gemini Live API client implementing the `vidya-core` live session seam.

pub mod client;
pub mod types;

pub use client::{
    DEFAULT_API_VERSION, DEFAULT_BASE_URL, DEFAULT_SETUP_TIMEOUT,
    GeminiLiveConnector, GeminiLiveSink,
};
