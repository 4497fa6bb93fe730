//! The EVI voice chat: socket, audio sender, sink seam and the runner that
//! ties them together.

use std::sync::Arc;

use crate::client::config::{ChatConnectOptions, ClientConfig};
use crate::client::consts::CHAT_PATH;
use crate::client::utils;
use crate::error::Result;
use crate::session::Session;

mod playback;
mod runner;
mod sender;
mod socket;
mod tools;

pub use playback::{AudioSink, PlaybackHooks};
pub use runner::{ChatHandle, ChatRunner, ChatState, EventObserver, DEFAULT_UTTERANCE_GAP};
pub use sender::{AudioTransport, MicrophoneSender, Sender, SenderState};
pub use socket::ChatSocket;
pub use tools::ToolHandler;

/// Opens EVI chat sockets.
#[derive(Debug, Clone)]
pub struct ChatClient {
    config: Arc<ClientConfig>,
}

impl ChatClient {
    pub(crate) fn new(config: Arc<ClientConfig>) -> Self {
        Self { config }
    }

    pub async fn connect(&self) -> Result<ChatSocket> {
        self.connect_with_options(&ChatConnectOptions::new()).await
    }

    pub async fn connect_with_options(&self, options: &ChatConnectOptions) -> Result<ChatSocket> {
        let request = utils::build_request(&self.config, CHAT_PATH, &options.query_pairs())?;
        let session = Session::connect(
            request,
            self.config.connect_timeout(),
            self.config.channel_capacity(),
        )
        .await?;
        Ok(ChatSocket::new(session))
    }
}
