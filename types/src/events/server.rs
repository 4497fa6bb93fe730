mod error;

use std::collections::BTreeMap;

use crate::audio::{decode_base64, Base64EncodedAudioBytes, CodecError};

pub use error::ErrorEvent;

/// `chat_metadata` event, the first message of every chat.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChatMetadataEvent {
    chat_id: String,

    /// Pass this back as `resumed_chat_group_id` to continue the conversation
    chat_group_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    custom_session_id: Option<String>,
}

impl ChatMetadataEvent {
    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    pub fn chat_group_id(&self) -> &str {
        &self.chat_group_id
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Assistant,
    System,
    User,
    All,
    Tool,
}

/// A transcript line attached to user and assistant messages.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChatMessage {
    role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

impl ChatMessage {
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }
}

/// Expression measures keyed by emotion name, each in `0.0..=1.0`.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct EmotionScores(BTreeMap<String, f64>);

impl EmotionScores {
    pub fn get(&self, emotion: &str) -> Option<f64> {
        self.0.get(emotion).copied()
    }

    /// The `n` strongest emotions, strongest first.
    pub fn top(&self, n: usize) -> Vec<(&str, f64)> {
        let mut scores: Vec<(&str, f64)> = self.0.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        scores.sort_by(|a, b| b.1.total_cmp(&a.1));
        scores.truncate(n);
        scores
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ProsodyInference {
    #[serde(default)]
    scores: EmotionScores,
}

impl ProsodyInference {
    pub fn scores(&self) -> &EmotionScores {
        &self.scores
    }
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Inference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    prosody: Option<ProsodyInference>,
}

impl Inference {
    pub fn prosody(&self) -> Option<&ProsodyInference> {
        self.prosody.as_ref()
    }
}

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct MillisecondInterval {
    begin: u64,
    end: u64,
}

impl MillisecondInterval {
    pub fn begin(&self) -> u64 {
        self.begin
    }

    pub fn end(&self) -> u64 {
        self.end
    }
}

/// `user_message` event: transcript of what the user said.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UserMessageEvent {
    message: ChatMessage,

    #[serde(default)]
    models: Inference,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    time: Option<MillisecondInterval>,

    /// Whether the message came from `user_input` rather than audio
    #[serde(default)]
    from_text: bool,

    /// Interim transcripts are superseded by a later final one
    #[serde(default)]
    interim: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    custom_session_id: Option<String>,
}

impl UserMessageEvent {
    pub fn message(&self) -> &ChatMessage {
        &self.message
    }

    pub fn models(&self) -> &Inference {
        &self.models
    }

    pub fn time(&self) -> Option<MillisecondInterval> {
        self.time
    }

    pub fn from_text(&self) -> bool {
        self.from_text
    }

    pub fn interim(&self) -> bool {
        self.interim
    }
}

/// `assistant_message` event: transcript of what the assistant is saying.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AssistantMessageEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,

    message: ChatMessage,

    #[serde(default)]
    models: Inference,

    #[serde(default)]
    from_text: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    custom_session_id: Option<String>,
}

impl AssistantMessageEvent {
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn message(&self) -> &ChatMessage {
        &self.message
    }

    pub fn models(&self) -> &Inference {
        &self.models
    }

    pub fn from_text(&self) -> bool {
        self.from_text
    }
}

/// `audio_output` event: one fragment of assistant speech.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AudioOutputEvent {
    id: String,

    /// Base64 encoded audio, usually a complete WAV file per fragment
    data: Base64EncodedAudioBytes,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    index: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    custom_session_id: Option<String>,
}

impl AudioOutputEvent {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn index(&self) -> Option<u32> {
        self.index
    }

    pub fn decode(&self) -> Result<Vec<u8>, CodecError> {
        decode_base64(&self.data)
    }
}

/// `assistant_end` event: the assistant finished its turn.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct AssistantEndEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    custom_session_id: Option<String>,
}

/// `user_interruption` event: the user spoke over the assistant.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct UserInterruptionEvent {
    #[serde(default)]
    time: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    custom_session_id: Option<String>,
}

impl UserInterruptionEvent {
    pub fn time(&self) -> u64 {
        self.time
    }
}
