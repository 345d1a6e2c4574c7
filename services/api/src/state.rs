//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the shared,
//! clonable resources every WebSocket connection needs.

use crate::{
    config::Config,
    prompts::Prompts,
    ws::negotiator::{Negotiator, SessionSettings},
};
use std::sync::Arc;
use vidya_core::{ClassifyOptions, LiveConnector};

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub negotiator: Arc<Negotiator>,
    pub relay_options: ClassifyOptions,
}

impl AppState {
    pub fn new(config: Config, connector: Arc<dyn LiveConnector>, prompts: Prompts) -> Self {
        let settings = SessionSettings {
            transcription: config.transcription,
            handshake_timeout: config.handshake_timeout,
            ..SessionSettings::new(config.model.clone(), prompts)
        };
        let negotiator = Negotiator::new(config.gemini_api_key.clone(), connector, settings);
        let relay_options = ClassifyOptions {
            forward_model_text: config.forward_model_text,
        };
        Self {
            config: Arc::new(config),
            negotiator: Arc::new(negotiator),
            relay_options,
        }
    }
}
