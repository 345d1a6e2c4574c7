use crate::generic_types::{LiveSessionConfig, Notification, UpstreamFrame};
use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// The receive half of a live session: yields notifications until the
/// upstream closes the connection.
pub type NotificationStream = Pin<Box<dyn Stream<Item = Result<Notification>> + Send>>;

/// The send half of a live session.
#[async_trait]
pub trait LiveSink: Send {
    /// Sends one frame upstream.
    async fn send(&mut self, frame: UpstreamFrame) -> Result<()>;

    /// Closes the connection. Calling it more than once is harmless.
    async fn close(&mut self) -> Result<()>;
}

/// An open connection to a real-time multimodal service.
///
/// The two halves are independent so that sending and receiving can make
/// progress concurrently without a shared lock.
pub struct LiveSession {
    pub sink: Box<dyn LiveSink>,
    pub notifications: NotificationStream,
}

impl LiveSession {
    pub fn new(sink: Box<dyn LiveSink>, notifications: NotificationStream) -> Self {
        Self {
            sink,
            notifications,
        }
    }
}

/// Opens live sessions against a specific provider.
#[async_trait]
pub trait LiveConnector: Send + Sync {
    /// Connects, configures the session and returns once the provider has
    /// acknowledged the configuration.
    async fn connect(&self, api_key: &str, config: &LiveSessionConfig) -> Result<LiveSession>;
}
