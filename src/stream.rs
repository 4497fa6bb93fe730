//! Streaming inference: one request frame in, one prediction frame out.

use std::ops::RangeInclusive;
use std::path::Path;
use std::sync::Arc;

use crate::client::config::ClientConfig;
use crate::client::consts::STREAM_PATH;
use crate::client::stats::Stats;
use crate::client::utils;
use crate::error::{Error, Result};
use crate::session::Session;
use crate::types::stream::{ModelsConfig, StreamRequest, StreamResponse};

pub const STREAM_WINDOW_MS: RangeInclusive<u32> = 500..=10000;

/// Defaults applied to every payload sent over a [`StreamSocket`].
#[derive(Debug, Clone, Default)]
pub struct StreamOptions {
    models: ModelsConfig,
    stream_window_ms: Option<u32>,
}

impl StreamOptions {
    pub fn new(models: ModelsConfig) -> Self {
        Self {
            models,
            stream_window_ms: None,
        }
    }

    pub fn with_stream_window_ms(mut self, window: u32) -> Self {
        self.stream_window_ms = Some(window);
        self
    }

    pub fn models(&self) -> &ModelsConfig {
        &self.models
    }

    fn validate(&self) -> Result<()> {
        validate_window(self.stream_window_ms)
    }
}

fn validate_window(window: Option<u32>) -> Result<()> {
    match window {
        Some(ms) if !STREAM_WINDOW_MS.contains(&ms) => Err(Error::InvalidArgument(format!(
            "stream_window_ms must be within {}..={}, got {}",
            STREAM_WINDOW_MS.start(),
            STREAM_WINDOW_MS.end(),
            ms
        ))),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone)]
pub struct StreamClient {
    config: Arc<ClientConfig>,
}

impl StreamClient {
    pub(crate) fn new(config: Arc<ClientConfig>) -> Self {
        Self { config }
    }

    pub async fn connect(&self, options: StreamOptions) -> Result<StreamSocket> {
        options.validate()?;
        let request = utils::build_request(&self.config, STREAM_PATH, &[])?;
        let session = Session::connect(
            request,
            self.config.connect_timeout(),
            self.config.channel_capacity(),
        )
        .await?;
        Ok(StreamSocket { session, options })
    }
}

/// A connected streaming inference socket.
///
/// Requests are answered in order, so a socket must not be used by two
/// tasks at once.
pub struct StreamSocket {
    session: Session<StreamRequest, StreamResponse>,
    options: StreamOptions,
}

impl StreamSocket {
    /// Sends `request`, filling in the socket's models and window for
    /// payload requests, and returns the matching response.
    pub async fn send_request(&self, request: StreamRequest) -> Result<StreamResponse> {
        let mut request = request;
        if request.data().is_some() {
            if request.models().is_none() {
                request = request.with_models(self.options.models.clone());
            }
            if let (None, Some(window)) = (request.stream_window_ms(), self.options.stream_window_ms) {
                request = request.with_stream_window_ms(window);
            }
        }
        validate_window(request.stream_window_ms())?;

        let response = self.session.request(&request).await?;
        if let Some(expected) = request.payload_id() {
            if response.payload_id() != Some(expected) {
                tracing::warn!(
                    "payload_id mismatch: sent {}, received {:?}",
                    expected,
                    response.payload_id()
                );
            }
        }
        if let Some(message) = response.error() {
            return Err(Error::Protocol {
                code: response.code().unwrap_or("unknown").to_string(),
                slug: "stream_error".to_string(),
                message: message.to_string(),
            });
        }
        if let Some(warning) = response.warning() {
            tracing::warn!("stream warning: {}", warning);
        }
        Ok(response)
    }

    pub async fn send_bytes(&self, bytes: &[u8]) -> Result<StreamResponse> {
        self.send_request(StreamRequest::bytes(bytes)).await
    }

    /// Reads a media file and sends its content.
    pub async fn send_file(&self, path: impl AsRef<Path>) -> Result<StreamResponse> {
        let bytes = tokio::fs::read(path.as_ref()).await?;
        tracing::debug!("sending {} ({} bytes)", path.as_ref().display(), bytes.len());
        self.send_bytes(&bytes).await
    }

    pub async fn send_text(&self, text: &str) -> Result<StreamResponse> {
        self.send_request(StreamRequest::text(text)).await
    }

    /// Sends facemesh landmarks; the socket's models must include `facemesh`.
    pub async fn send_facemesh(&self, landmarks: &serde_json::Value) -> Result<StreamResponse> {
        self.send_request(StreamRequest::facemesh(landmarks)).await
    }

    /// Clears the context the server keeps between payloads.
    pub async fn reset_stream(&self) -> Result<StreamResponse> {
        self.send_request(StreamRequest::reset()).await
    }

    pub async fn get_job_details(&self) -> Result<StreamResponse> {
        self.send_request(StreamRequest::job_details()).await
    }

    pub async fn close(&self) {
        self.session.close().await
    }

    pub fn stats(&self) -> Result<Stats> {
        self.session.stats()
    }
}
