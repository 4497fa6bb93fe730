use std::collections::BTreeMap;

use base64::Engine;

use crate::audio::{AudioEncoding, Base64EncodedAudioBytes};
use crate::tools::Tool;

/// `session_settings` message
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SessionSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    custom_session_id: Option<String>,

    /// Overrides the system prompt of the active config
    #[serde(default, skip_serializing_if = "Option::is_none")]
    system_prompt: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    context: Option<Context>,

    /// Format of the audio the client is about to stream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    audio: Option<AudioSettings>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    language_model_api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,

    /// Values substituted into `{{placeholders}}` of the system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    variables: Option<BTreeMap<String, String>>,
}

impl SessionSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_custom_session_id(mut self, id: &str) -> Self {
        self.custom_session_id = Some(id.to_string());
        self
    }

    pub fn with_system_prompt(mut self, prompt: &str) -> Self {
        self.system_prompt = Some(prompt.to_string());
        self
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_audio(mut self, audio: AudioSettings) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn with_language_model_api_key(mut self, key: &str) -> Self {
        self.language_model_api_key = Some(key.to_string());
        self
    }

    pub fn with_tool(mut self, tool: Tool) -> Self {
        self.tools.get_or_insert_with(Vec::new).push(tool);
        self
    }

    pub fn with_variable(mut self, name: &str, value: &str) -> Self {
        self.variables
            .get_or_insert_with(BTreeMap::new)
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn audio(&self) -> Option<&AudioSettings> {
        self.audio.as_ref()
    }

    pub fn tools(&self) -> &[Tool] {
        self.tools.as_deref().unwrap_or_default()
    }
}

/// Audio format announced in `session_settings`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AudioSettings {
    encoding: AudioEncoding,
    sample_rate: u32,
    channels: u16,
}

impl AudioSettings {
    pub fn linear16(sample_rate: u32, channels: u16) -> Self {
        Self {
            encoding: AudioEncoding::Linear16,
            sample_rate,
            channels,
        }
    }

    pub fn encoding(&self) -> &AudioEncoding {
        &self.encoding
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextType {
    /// Kept for the whole session
    Persistent,
    /// Applied to the next turn only
    Temporary,
    Editable,
}

/// Extra text injected into the conversation context.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Context {
    text: String,
    #[serde(rename = "type")]
    context_type: ContextType,
}

impl Context {
    pub fn new(text: &str, context_type: ContextType) -> Self {
        Self {
            text: text.to_string(),
            context_type,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn context_type(&self) -> ContextType {
        self.context_type
    }
}

/// `audio_input` message
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AudioInput {
    /// Base64 encoded audio
    data: Base64EncodedAudioBytes,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    custom_session_id: Option<String>,
}

impl AudioInput {
    pub fn new(data: Base64EncodedAudioBytes) -> Self {
        Self {
            data,
            custom_session_id: None,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::new(base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn data(&self) -> &str {
        &self.data
    }
}

/// `user_input` message: text the assistant treats as if the user spoke it.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UserInput {
    text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    custom_session_id: Option<String>,
}

impl UserInput {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            custom_session_id: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// `assistant_input` message: text the assistant speaks verbatim.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AssistantInput {
    text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    custom_session_id: Option<String>,
}

impl AssistantInput {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            custom_session_id: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// `pause_assistant_message` message
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct PauseAssistantMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    custom_session_id: Option<String>,
}

/// `resume_assistant_message` message
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ResumeAssistantMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    custom_session_id: Option<String>,
}
