//! In-process WebSocket server for driving the client in tests.
#![allow(dead_code)]

use std::future::Future;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use hume_realtime::{ClientConfig, HumeClient};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

pub type ServerSocket = WebSocketStream<TcpStream>;

/// What the client sent in its handshake.
#[derive(Debug, Clone, Default)]
pub struct Handshake {
    pub path: String,
    pub query: Option<String>,
    pub api_key: Option<String>,
}

pub struct MockServer {
    pub addr: SocketAddr,
    pub handshake: Arc<Mutex<Option<Handshake>>>,
    pub task: JoinHandle<()>,
}

impl MockServer {
    /// Accepts one connection and hands it to `script`.
    pub async fn start<F, Fut>(script: F) -> Self
    where
        F: FnOnce(ServerSocket) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handshake = Arc::new(Mutex::new(None));
        let seen = handshake.clone();

        let task = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
                *seen.lock().unwrap() = Some(Handshake {
                    path: request.uri().path().to_string(),
                    query: request.uri().query().map(str::to_string),
                    api_key: request
                        .headers()
                        .get("X-Hume-Api-Key")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string),
                });
                Ok(response)
            };
            let ws = tokio_tungstenite::accept_hdr_async(stream, callback).await.unwrap();
            script(ws).await;
        });

        Self { addr, handshake, task }
    }

    /// Rejects the handshake with `status`.
    pub async fn rejecting(status: StatusCode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let callback = move |_: &Request, _: Response| -> Result<Response, ErrorResponse> {
                let mut response = ErrorResponse::new(Some("rejected".to_string()));
                *response.status_mut() = status;
                Err(response)
            };
            let _ = tokio_tungstenite::accept_hdr_async(stream, callback).await;
        });
        Self {
            addr,
            handshake: Arc::new(Mutex::new(None)),
            task,
        }
    }

    pub fn client(&self) -> HumeClient {
        HumeClient::new(self.config())
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::builder()
            .with_api_key("test-key")
            .with_websocket_url(&format!("ws://{}", self.addr))
            .with_base_url(&format!("http://{}", self.addr))
            .with_connect_timeout(Duration::from_secs(2))
            .build()
    }

    pub fn handshake(&self) -> Handshake {
        self.handshake.lock().unwrap().clone().unwrap_or_default()
    }
}

pub async fn send_json(ws: &mut ServerSocket, value: Value) {
    ws.send(Message::Text(value.to_string())).await.unwrap();
}

/// The next text frame as JSON, or `None` once the client is gone.
pub async fn next_json(ws: &mut ServerSocket) -> Option<Value> {
    while let Some(message) = ws.next().await {
        match message {
            Ok(Message::Text(text)) => return Some(serde_json::from_str(&text).unwrap()),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
    None
}

/// The next frame of the given `type`, skipping others.
pub async fn next_of_type(ws: &mut ServerSocket, kind: &str) -> Option<Value> {
    while let Some(frame) = next_json(ws).await {
        if frame["type"] == kind {
            return Some(frame);
        }
    }
    None
}

/// Reads until the client closes the connection.
pub async fn drain(ws: &mut ServerSocket) {
    while next_json(ws).await.is_some() {}
}

pub fn wav_bytes(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for sample in samples {
            writer.write_sample(*sample).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
