use std::time::Duration;

use secrecy::SecretString;

use crate::client::consts::{
    BASE_URL, DEFAULT_CHANNEL_CAPACITY, DEFAULT_CONNECT_TIMEOUT_SECS, HUME_API_KEY, WEBSOCKET_URL,
};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    base_url: String,
    websocket_url: String,
    api_key: SecretString,
    connect_timeout: Duration,
    channel_capacity: usize,
}

pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::new(),
        }
    }

    /// Root of the REST API.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Root of the WebSocket endpoints.
    pub fn with_websocket_url(mut self, websocket_url: &str) -> Self {
        self.config.websocket_url = websocket_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.config.api_key = SecretString::from(api_key.to_string());
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Capacity of the outbound frame queue of every session.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity.max(1);
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            websocket_url: WEBSOCKET_URL.to_string(),
            // A missing key is sent as empty and rejected at handshake.
            api_key: std::env::var(HUME_API_KEY).unwrap_or_default().into(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn websocket_url(&self) -> &str {
        &self.websocket_url
    }

    pub fn api_key(&self) -> &SecretString {
        &self.api_key
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Query parameters of the EVI chat handshake.
#[derive(Debug, Clone, Default)]
pub struct ChatConnectOptions {
    config_id: Option<String>,
    config_version: Option<u32>,
    resumed_chat_group_id: Option<String>,
    verbose_transcription: Option<bool>,
}

impl ChatConnectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the chat with a stored EVI configuration.
    pub fn with_config_id(mut self, config_id: &str) -> Self {
        self.config_id = Some(config_id.to_string());
        self
    }

    pub fn with_config_version(mut self, version: u32) -> Self {
        self.config_version = Some(version);
        self
    }

    /// Continues the conversation of an earlier chat group.
    pub fn with_resumed_chat_group_id(mut self, chat_group_id: &str) -> Self {
        self.resumed_chat_group_id = Some(chat_group_id.to_string());
        self
    }

    /// Asks for interim `user_message` events while the user speaks.
    pub fn with_verbose_transcription(mut self, verbose: bool) -> Self {
        self.verbose_transcription = Some(verbose);
        self
    }

    pub(crate) fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(id) = &self.config_id {
            pairs.push(("config_id", id.clone()));
        }
        if let Some(version) = self.config_version {
            pairs.push(("config_version", version.to_string()));
        }
        if let Some(id) = &self.resumed_chat_group_id {
            pairs.push(("resumed_chat_group_id", id.clone()));
        }
        if let Some(verbose) = self.verbose_transcription {
            pairs.push(("verbose_transcription", verbose.to_string()));
        }
        pairs
    }
}
