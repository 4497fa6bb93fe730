use std::sync::{Arc, Mutex};

use futures::stream::BoxStream;
use futures_util::StreamExt;

use crate::client::stats::Stats;
use crate::error::Result;
use crate::session::Session;
use crate::types::audio::encode_audio_chunk;
use crate::types::events::client::{
    AssistantInput, PauseAssistantMessage, ResumeAssistantMessage, SessionSettings, UserInput,
};
use crate::types::events::server::ChatMetadataEvent;
use crate::types::tools::{ToolErrorMessage, ToolResponseMessage};
use crate::types::{ClientEvent, ServerEvent};

/// A connected EVI chat.
#[derive(Clone)]
pub struct ChatSocket {
    session: Session<ClientEvent, ServerEvent>,
    metadata: Arc<Mutex<Option<ChatMetadataEvent>>>,
}

impl ChatSocket {
    pub(crate) fn new(session: Session<ClientEvent, ServerEvent>) -> Self {
        Self {
            session,
            metadata: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn send(&self, event: &ClientEvent) -> Result<()> {
        tracing::debug!("sending {}", event.kind());
        self.session.send(event).await
    }

    pub async fn send_session_settings(&self, settings: SessionSettings) -> Result<()> {
        self.send(&ClientEvent::SessionSettings(settings)).await
    }

    /// Sends raw PCM in the format announced by `session_settings`.
    pub async fn send_audio_input(&self, pcm: &[u8]) -> Result<()> {
        self.session.send(&encode_audio_chunk(pcm)).await?;
        self.session.record(|stats| stats.update_audio_sent(pcm.len()));
        Ok(())
    }

    pub async fn send_user_input(&self, text: &str) -> Result<()> {
        self.send(&ClientEvent::UserInput(UserInput::new(text))).await
    }

    /// Makes the assistant speak `text` verbatim.
    pub async fn send_assistant_input(&self, text: &str) -> Result<()> {
        self.send(&ClientEvent::AssistantInput(AssistantInput::new(text))).await
    }

    pub async fn pause_assistant(&self) -> Result<()> {
        self.send(&ClientEvent::PauseAssistantMessage(PauseAssistantMessage::default()))
            .await
    }

    pub async fn resume_assistant(&self) -> Result<()> {
        self.send(&ClientEvent::ResumeAssistantMessage(ResumeAssistantMessage::default()))
            .await
    }

    pub async fn send_tool_response(&self, response: ToolResponseMessage) -> Result<()> {
        self.send(&ClientEvent::ToolResponse(response)).await
    }

    pub async fn send_tool_error(&self, error: ToolErrorMessage) -> Result<()> {
        self.send(&ClientEvent::ToolError(error)).await
    }

    /// Every server event in arrival order; see [`Session::events`].
    pub fn events(&self) -> BoxStream<'static, Result<ServerEvent>> {
        let metadata = self.metadata.clone();
        self.session
            .events()
            .inspect(move |event| {
                if let Ok(ServerEvent::ChatMetadata(meta)) = event {
                    if let Ok(mut slot) = metadata.lock() {
                        slot.get_or_insert_with(|| meta.clone());
                    }
                }
            })
            .boxed()
    }

    /// Identifiers of this chat, known once the server sent `chat_metadata`.
    pub fn chat_metadata(&self) -> Option<ChatMetadataEvent> {
        self.metadata.lock().ok().and_then(|slot| slot.clone())
    }

    pub async fn close(&self) {
        self.session.close().await
    }

    pub fn is_closed(&self) -> bool {
        self.session.is_closed()
    }

    pub fn stats(&self) -> Result<Stats> {
        self.session.stats()
    }

    pub(crate) fn record_audio_received(&self, bytes: usize) {
        self.session.record(|stats| stats.update_audio_received(bytes));
    }
}
