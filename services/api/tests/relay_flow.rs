//! End-to-end tests driving the real router over a loopback socket with a
//! scripted upstream.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use bytes::Bytes;
use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::Level;
use vidya_api::{
    config::{Config, DEFAULT_MODEL},
    prompts::{DEFAULT_GREETING, Prompts},
    router::create_router,
    state::AppState,
};
use vidya_core::{
    ContentPart, LiveConnector, LiveSession, LiveSessionConfig, LiveSink, Notification,
    ServerContent, Transcription, UpstreamFrame,
};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct RecordingSink {
    frames: Arc<Mutex<Vec<UpstreamFrame>>>,
}

#[async_trait]
impl LiveSink for RecordingSink {
    async fn send(&mut self, frame: UpstreamFrame) -> Result<()> {
        self.frames.lock().unwrap().push(frame);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Hands out a single session whose notifications are driven by the test.
struct ScriptedConnector {
    configs: Mutex<Vec<LiveSessionConfig>>,
    frames: Arc<Mutex<Vec<UpstreamFrame>>>,
    notifications: Mutex<Option<UnboundedReceiver<Result<Notification>>>>,
}

impl ScriptedConnector {
    fn new() -> (Arc<Self>, UnboundedSender<Result<Notification>>) {
        let (tx, rx) = unbounded();
        let connector = Arc::new(Self {
            configs: Mutex::new(Vec::new()),
            frames: Arc::new(Mutex::new(Vec::new())),
            notifications: Mutex::new(Some(rx)),
        });
        (connector, tx)
    }

    fn connect_count(&self) -> usize {
        self.configs.lock().unwrap().len()
    }
}

#[async_trait]
impl LiveConnector for ScriptedConnector {
    async fn connect(&self, _api_key: &str, config: &LiveSessionConfig) -> Result<LiveSession> {
        self.configs.lock().unwrap().push(config.clone());
        let rx = self
            .notifications
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| anyhow!("session already handed out"))?;
        Ok(LiveSession::new(
            Box::new(RecordingSink {
                frames: self.frames.clone(),
            }),
            Box::pin(rx),
        ))
    }
}

fn test_config(api_key: Option<&str>) -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        gemini_api_key: api_key.map(str::to_string),
        model: DEFAULT_MODEL.to_string(),
        base_url: "ws://127.0.0.1:1/ws".to_string(),
        api_version: "v1alpha".to_string(),
        transcription: true,
        forward_model_text: false,
        handshake_timeout: Duration::from_secs(2),
        setup_timeout: Duration::from_secs(2),
        log_level: Level::INFO,
        static_dir: PathBuf::from("./static"),
        prompts_path: PathBuf::from("./prompts"),
    }
}

async fn spawn_server(config: Config, connector: Arc<ScriptedConnector>) -> SocketAddr {
    let state = Arc::new(AppState::new(config, connector, Prompts::default()));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, create_router(state)).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    ws
}

async fn next_message(ws: &mut Client) -> Message {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for a message")
            .expect("stream ended")
            .expect("receive failed");
        if !matches!(msg, Message::Ping(_) | Message::Pong(_)) {
            return msg;
        }
    }
}

async fn next_json(ws: &mut Client) -> Value {
    match next_message(ws).await {
        Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("expected a text message, got {other:?}"),
    }
}

async fn wait_for_frames(frames: &Arc<Mutex<Vec<UpstreamFrame>>>, count: usize) {
    for _ in 0..200 {
        if frames.lock().unwrap().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("upstream never received {count} frames");
}

fn content(content: ServerContent) -> Result<Notification> {
    Ok(Notification {
        server_content: Some(content),
        ..Default::default()
    })
}

#[tokio::test]
async fn test_voice_selection_greeting_and_audio_uplink() {
    let (connector, _notify) = ScriptedConnector::new();
    let addr = spawn_server(test_config(Some("test-key")), connector.clone()).await;
    let mut ws = connect(addr).await;

    ws.send(Message::text(r#"{"voice":"Puck"}"#)).await.unwrap();
    ws.send(Message::text(r#"{"realtime_input":{"media":{"data":"QUJD"}}}"#))
        .await
        .unwrap();

    wait_for_frames(&connector.frames, 2).await;
    let frames = connector.frames.lock().unwrap().clone();
    assert_eq!(frames[0], UpstreamFrame::turn(DEFAULT_GREETING));
    assert_eq!(frames[1], UpstreamFrame::pcm_chunk(Bytes::from_static(b"ABC")));

    let configs = connector.configs.lock().unwrap().clone();
    assert_eq!(configs.len(), 1);
    assert_eq!(configs[0].voice, "Puck");
    assert_eq!(configs[0].model, DEFAULT_MODEL);
    assert!(configs[0].input_transcription);
}

#[tokio::test]
async fn test_missing_api_key_closes_with_policy_violation() {
    let (connector, _notify) = ScriptedConnector::new();
    let addr = spawn_server(test_config(None), connector.clone()).await;
    let mut ws = connect(addr).await;

    match next_message(&mut ws).await {
        Message::Close(Some(frame)) => {
            assert_eq!(u16::from(frame.code), 1008);
            assert_eq!(frame.reason.as_str(), "API Key not found on server");
        }
        other => panic!("expected a close frame, got {other:?}"),
    }
    assert_eq!(connector.connect_count(), 0);
}

#[tokio::test]
async fn test_downlink_events_reach_the_browser_in_order() {
    let (connector, notify) = ScriptedConnector::new();
    let addr = spawn_server(test_config(Some("test-key")), connector.clone()).await;
    let mut ws = connect(addr).await;

    ws.send(Message::text(r#"{"voice":"Kore"}"#)).await.unwrap();
    wait_for_frames(&connector.frames, 1).await;

    notify
        .unbounded_send(content(ServerContent {
            model_turn: vec![ContentPart::Audio(Bytes::from_static(b"ABC"))],
            output_transcription: Some(Transcription::new("Namaste")),
            turn_complete: true,
            ..Default::default()
        }))
        .unwrap();

    assert_eq!(next_json(&mut ws).await, json!({"audio": "QUJD"}));
    assert_eq!(
        next_json(&mut ws).await,
        json!({"text": "Namaste", "role": "model", "type": "transcription"})
    );
    assert_eq!(next_json(&mut ws).await, json!({"turnComplete": true}));
}

#[tokio::test]
async fn test_interruption_is_forwarded_alone() {
    let (connector, notify) = ScriptedConnector::new();
    let addr = spawn_server(test_config(Some("test-key")), connector.clone()).await;
    let mut ws = connect(addr).await;

    ws.send(Message::text(r#"{"voice":"Puck"}"#)).await.unwrap();
    wait_for_frames(&connector.frames, 1).await;

    notify
        .unbounded_send(content(ServerContent {
            interrupted: true,
            ..Default::default()
        }))
        .unwrap();

    assert_eq!(next_json(&mut ws).await, json!({"interrupted": true}));
}

#[tokio::test]
async fn test_upstream_end_closes_the_browser_normally() {
    let (connector, notify) = ScriptedConnector::new();
    let addr = spawn_server(test_config(Some("test-key")), connector.clone()).await;
    let mut ws = connect(addr).await;

    ws.send(Message::text(r#"{"voice":"Puck"}"#)).await.unwrap();
    wait_for_frames(&connector.frames, 1).await;
    drop(notify);

    match next_message(&mut ws).await {
        Message::Close(Some(frame)) => assert_eq!(u16::from(frame.code), 1000),
        other => panic!("expected a close frame, got {other:?}"),
    }
}
