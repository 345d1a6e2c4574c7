//! Vidya API Library Crate
//!
//! This library contains all the logic for the Vidya voice relay service,
//! including configuration, prompt loading, the WebSocket relay, and routing.
//! The `api` binary is a thin wrapper around this library.

pub mod config;
pub mod prompts;
pub mod router;
pub mod state;
pub mod ws;
