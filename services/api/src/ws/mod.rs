//! WebSocket Relay
//!
//! This module contains the logic for bridging a browser WebSocket to a live
//! upstream session. It is structured into submodules:
//!
//! - `protocol`: The JSON message format between the browser and the server.
//! - `negotiator`: The one-time handshake that opens the upstream session.
//! - `relay`: The two forwarding loops and their shared cancellation.
//! - `session`: The axum upgrade handler tying the pieces together.

pub mod negotiator;
pub mod protocol;
pub mod relay;
pub mod session;

pub use session::ws_handler;
