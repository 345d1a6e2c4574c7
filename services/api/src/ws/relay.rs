//! The bidirectional relay between one caller socket and one live session.
//!
//! Two loops run concurrently over a negotiated session:
//!
//! - uplink: caller frames -> upstream audio chunks
//! - downlink: upstream notifications -> caller messages
//!
//! Whichever finishes first cancels the other. Both endpoints are closed once
//! both loops have stopped.

use super::protocol::{ClientFrame, ServerMessage, decode_client_frame};
use axum::extract::ws::{CloseFrame, Message, close_code};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::{fmt::Display, future::Future, sync::Arc, time::Duration};
use tokio::{sync::Mutex, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use vidya_core::{ClassifyOptions, LiveSink, NotificationStream, UpstreamFrame};

/// How long the surviving loop may take to stop after cancellation.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// WebSocket close reasons must fit in 123 bytes.
const MAX_CLOSE_REASON_BYTES: usize = 123;

pub type SharedLiveSink = Arc<Mutex<Box<dyn LiveSink>>>;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Failed to forward audio upstream: {0:#}")]
    UpstreamSend(anyhow::Error),
    #[error("Upstream session error: {0:#}")]
    UpstreamReceive(anyhow::Error),
    #[error("Failed to send to client: {0}")]
    CallerSend(String),
    #[error("Failed to encode client message: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Uplink,
    Downlink,
}

/// Why a loop stopped.
#[derive(Debug)]
pub enum LoopExit {
    /// The caller closed or dropped its socket.
    CallerClosed,
    /// The upstream event stream ended.
    UpstreamClosed,
    /// The sibling loop finished first.
    Cancelled,
    Failed(RelayError),
}

impl LoopExit {
    pub fn is_failure(&self) -> bool {
        matches!(self, LoopExit::Failed(_))
    }
}

/// The result of a finished relay: the loop that ended first and why.
#[derive(Debug)]
pub struct RelayOutcome {
    pub direction: Direction,
    pub exit: LoopExit,
}

impl RelayOutcome {
    /// The close frame the caller receives for this outcome.
    pub fn close_frame(&self) -> CloseFrame {
        match &self.exit {
            LoopExit::Failed(e) => close_frame(close_code::ERROR, &e.to_string()),
            LoopExit::UpstreamClosed => close_frame(close_code::NORMAL, "Upstream session ended"),
            LoopExit::CallerClosed | LoopExit::Cancelled => close_frame(close_code::NORMAL, ""),
        }
    }
}

/// Builds a close frame, truncating the reason on a character boundary.
pub fn close_frame(code: u16, reason: &str) -> CloseFrame {
    let mut end = reason.len().min(MAX_CLOSE_REASON_BYTES);
    while !reason.is_char_boundary(end) {
        end -= 1;
    }
    CloseFrame {
        code,
        reason: reason[..end].to_string().into(),
    }
}

/// Owns both endpoints of one relay instance.
pub struct Relay<S> {
    caller_tx: Arc<Mutex<S>>,
    upstream_tx: SharedLiveSink,
    options: ClassifyOptions,
    cancel: CancellationToken,
}

impl<S> Relay<S>
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: Display,
{
    pub fn new(
        caller_tx: Arc<Mutex<S>>,
        upstream_tx: Box<dyn LiveSink>,
        options: ClassifyOptions,
    ) -> Self {
        Self {
            caller_tx,
            upstream_tx: Arc::new(Mutex::new(upstream_tx)),
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Runs both loops until the first one ends, cancels the other, then
    /// closes the upstream session and the caller socket.
    pub async fn run<R, E>(self, caller_rx: R, notifications: NotificationStream) -> RelayOutcome
    where
        R: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
        E: Display + Send + 'static,
    {
        let mut loops = JoinSet::new();
        loops.spawn(until_cancelled(
            self.cancel.clone(),
            Direction::Uplink,
            uplink(caller_rx, self.upstream_tx.clone()),
        ));
        loops.spawn(until_cancelled(
            self.cancel.clone(),
            Direction::Downlink,
            downlink(notifications, self.caller_tx.clone(), self.options),
        ));

        let outcome = match loops.join_next().await {
            Some(Ok((direction, exit))) => RelayOutcome { direction, exit },
            joined => {
                if let Some(Err(e)) = joined {
                    error!("Relay loop failed to complete: {}", e);
                }
                RelayOutcome {
                    direction: Direction::Uplink,
                    exit: LoopExit::Cancelled,
                }
            }
        };
        self.cancel.cancel();
        drain_sibling(&mut loops, DRAIN_TIMEOUT).await;

        log_outcome(&outcome);

        if let Err(e) = self.upstream_tx.lock().await.close().await {
            debug!("Error closing upstream session: {:#}", e);
        }
        let mut caller_tx = self.caller_tx.lock().await;
        let _ = caller_tx
            .send(Message::Close(Some(outcome.close_frame())))
            .await;
        let _ = caller_tx.close().await;

        outcome
    }
}

async fn until_cancelled<F>(
    cancel: CancellationToken,
    direction: Direction,
    fut: F,
) -> (Direction, LoopExit)
where
    F: Future<Output = LoopExit>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => (direction, LoopExit::Cancelled),
        exit = fut => (direction, exit),
    }
}

/// Waits for the remaining loop after cancellation and aborts it if it
/// overruns `limit`. Both loops run under `until_cancelled`, so this only
/// fires when a loop blocks without yielding. Returns whether it aborted.
async fn drain_sibling(loops: &mut JoinSet<(Direction, LoopExit)>, limit: Duration) -> bool {
    match tokio::time::timeout(limit, loops.join_next()).await {
        Ok(Some(Ok((direction, exit)))) => {
            trace!(?direction, ?exit, "Sibling loop stopped.");
            false
        }
        Ok(_) => false,
        Err(_) => {
            warn!("Sibling loop did not stop in time; aborting.");
            loops.abort_all();
            true
        }
    }
}

fn log_outcome(outcome: &RelayOutcome) {
    match &outcome.exit {
        LoopExit::Failed(e) => {
            error!(direction = ?outcome.direction, error = %e, "Relay terminated with error.")
        }
        LoopExit::CallerClosed => info!("Client disconnected."),
        LoopExit::UpstreamClosed => info!("Upstream session ended."),
        LoopExit::Cancelled => debug!(direction = ?outcome.direction, "Relay loop cancelled."),
    }
}

/// Forwards caller audio to the upstream session until the caller leaves or
/// a send fails. Frames that do not carry audio are skipped.
pub async fn uplink<R, E>(mut caller_rx: R, upstream_tx: SharedLiveSink) -> LoopExit
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    while let Some(msg_result) = caller_rx.next().await {
        let text = match msg_result {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(frame)) => {
                debug!(?frame, "Client sent close frame.");
                return LoopExit::CallerClosed;
            }
            Ok(Message::Binary(_)) => {
                debug!("Ignoring binary frame from client.");
                continue;
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => continue,
            Err(e) => {
                warn!("Error receiving from client WebSocket: {}", e);
                return LoopExit::CallerClosed;
            }
        };

        match decode_client_frame(&text) {
            Ok(ClientFrame::Audio(data)) => {
                let frame = UpstreamFrame::pcm_chunk(data);
                if let Err(e) = upstream_tx.lock().await.send(frame).await {
                    return LoopExit::Failed(RelayError::UpstreamSend(e));
                }
            }
            Ok(ClientFrame::Ignored) => trace!("Ignoring client frame without realtime input."),
            Err(e) => debug!("Skipping client frame: {}", e),
        }
    }
    LoopExit::CallerClosed
}

/// Forwards upstream notifications to the caller until the upstream stream
/// ends or a send fails.
pub async fn downlink<S>(
    mut notifications: NotificationStream,
    caller_tx: Arc<Mutex<S>>,
    options: ClassifyOptions,
) -> LoopExit
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    while let Some(next) = notifications.next().await {
        let notification = match next {
            Ok(notification) => notification,
            Err(e) => return LoopExit::Failed(RelayError::UpstreamReceive(e)),
        };
        if let Some(go_away) = &notification.go_away {
            warn!(time_left = ?go_away.time_left, "Upstream announced it will disconnect.");
        }
        let Some(content) = notification.server_content else {
            continue;
        };

        let events = content.caller_events(options);
        if events.is_empty() {
            continue;
        }
        let mut sink = caller_tx.lock().await;
        for event in events {
            if let Err(e) = send_msg(&mut *sink, &ServerMessage::from(event)).await {
                return LoopExit::Failed(e);
            }
        }
    }
    LoopExit::UpstreamClosed
}

/// A helper function to serialize and send a `ServerMessage` to the client.
pub(crate) async fn send_msg<S>(sink: &mut S, msg: &ServerMessage) -> Result<(), RelayError>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let serialized = serde_json::to_string(msg)?;
    sink.send(Message::Text(serialized.into()))
        .await
        .map_err(|e| RelayError::CallerSend(e.to_string()))
}
