use std::sync::Arc;

use crate::batch::BatchClient;
use crate::chat::{ChatClient, ChatSocket};
use crate::stream::StreamClient;

pub(crate) mod config;
pub(crate) mod consts;
pub(crate) mod stats;
pub(crate) mod utils;

pub use config::{ChatConnectOptions, ClientConfig, ClientConfigBuilder};
pub use stats::Stats;

/// Entry point to the API, one sub-client per resource group.
#[derive(Debug, Clone)]
pub struct HumeClient {
    config: Arc<ClientConfig>,
    chat: ChatClient,
    stream: StreamClient,
    batch: BatchClient,
}

impl HumeClient {
    pub fn new(config: ClientConfig) -> Self {
        let config = Arc::new(config);
        Self {
            chat: ChatClient::new(config.clone()),
            stream: StreamClient::new(config.clone()),
            batch: BatchClient::new(config.clone()),
            config,
        }
    }

    /// A client configured from the environment.
    pub fn from_env() -> Self {
        Self::new(ClientConfig::new())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn chat(&self) -> &ChatClient {
        &self.chat
    }

    pub fn stream(&self) -> &StreamClient {
        &self.stream
    }

    pub fn batch(&self) -> &BatchClient {
        &self.batch
    }
}

/// Opens an EVI chat with the given configuration.
pub async fn connect_with_config(config: ClientConfig, options: &ChatConnectOptions) -> crate::Result<ChatSocket> {
    HumeClient::new(config).chat().connect_with_options(options).await
}

/// Opens an EVI chat using `HUME_API_KEY` and the default endpoints.
pub async fn connect() -> crate::Result<ChatSocket> {
    connect_with_config(ClientConfig::new(), &ChatConnectOptions::new()).await
}
