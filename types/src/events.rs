pub mod client;
pub mod server;

use client::*;
use server::*;

use crate::tools::{ToolCallMessage, ToolErrorMessage, ToolResponseMessage};

/// Messages the client writes to the EVI chat socket.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session_settings")]
    SessionSettings(SessionSettings),
    #[serde(rename = "audio_input")]
    AudioInput(AudioInput),
    #[serde(rename = "user_input")]
    UserInput(UserInput),
    #[serde(rename = "assistant_input")]
    AssistantInput(AssistantInput),
    #[serde(rename = "pause_assistant_message")]
    PauseAssistantMessage(PauseAssistantMessage),
    #[serde(rename = "resume_assistant_message")]
    ResumeAssistantMessage(ResumeAssistantMessage),
    #[serde(rename = "tool_response")]
    ToolResponse(ToolResponseMessage),
    #[serde(rename = "tool_error")]
    ToolError(ToolErrorMessage),
}

impl ClientEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ClientEvent::SessionSettings(_) => "session_settings",
            ClientEvent::AudioInput(_) => "audio_input",
            ClientEvent::UserInput(_) => "user_input",
            ClientEvent::AssistantInput(_) => "assistant_input",
            ClientEvent::PauseAssistantMessage(_) => "pause_assistant_message",
            ClientEvent::ResumeAssistantMessage(_) => "resume_assistant_message",
            ClientEvent::ToolResponse(_) => "tool_response",
            ClientEvent::ToolError(_) => "tool_error",
        }
    }
}

/// Messages the EVI chat socket delivers to the client.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "chat_metadata")]
    ChatMetadata(ChatMetadataEvent),
    #[serde(rename = "user_message")]
    UserMessage(UserMessageEvent),
    #[serde(rename = "assistant_message")]
    AssistantMessage(AssistantMessageEvent),
    #[serde(rename = "audio_output")]
    AudioOutput(AudioOutputEvent),
    #[serde(rename = "assistant_end")]
    AssistantEnd(AssistantEndEvent),
    #[serde(rename = "user_interruption")]
    UserInterruption(UserInterruptionEvent),
    #[serde(rename = "tool_call")]
    ToolCall(ToolCallMessage),
    #[serde(rename = "tool_response")]
    ToolResponse(ToolResponseMessage),
    #[serde(rename = "tool_error")]
    ToolError(ToolErrorMessage),
    #[serde(rename = "error")]
    Error(ErrorEvent),
    /// Any message kind this crate does not model yet.
    #[serde(other)]
    Unknown,
}

impl ServerEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::ChatMetadata(_) => "chat_metadata",
            ServerEvent::UserMessage(_) => "user_message",
            ServerEvent::AssistantMessage(_) => "assistant_message",
            ServerEvent::AudioOutput(_) => "audio_output",
            ServerEvent::AssistantEnd(_) => "assistant_end",
            ServerEvent::UserInterruption(_) => "user_interruption",
            ServerEvent::ToolCall(_) => "tool_call",
            ServerEvent::ToolResponse(_) => "tool_response",
            ServerEvent::ToolError(_) => "tool_error",
            ServerEvent::Error(_) => "error",
            ServerEvent::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioEncoding;

    #[test]
    fn serializes_session_settings_with_audio() {
        let event = ClientEvent::SessionSettings(
            SessionSettings::new()
                .with_audio(AudioSettings::linear16(16000, 1))
                .with_system_prompt("be brief"),
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "session_settings");
        assert_eq!(json["audio"]["encoding"], "linear16");
        assert_eq!(json["audio"]["sample_rate"], 16000);
        assert_eq!(json["audio"]["channels"], 1);
        assert_eq!(json["system_prompt"], "be brief");
        assert!(json.get("context").is_none());
    }

    #[test]
    fn serializes_pause_and_resume_as_bare_type() {
        let pause = serde_json::to_string(&ClientEvent::PauseAssistantMessage(
            PauseAssistantMessage::default(),
        ))
        .unwrap();
        assert_eq!(pause, r#"{"type":"pause_assistant_message"}"#);

        let resume = serde_json::to_string(&ClientEvent::ResumeAssistantMessage(
            ResumeAssistantMessage::default(),
        ))
        .unwrap();
        assert_eq!(resume, r#"{"type":"resume_assistant_message"}"#);
    }

    #[test]
    fn serializes_text_inputs() {
        let json = serde_json::to_value(ClientEvent::UserInput(UserInput::new("hi"))).unwrap();
        assert_eq!(json["type"], "user_input");
        assert_eq!(json["text"], "hi");

        let json =
            serde_json::to_value(ClientEvent::AssistantInput(AssistantInput::new("hello")))
                .unwrap();
        assert_eq!(json["type"], "assistant_input");
        assert_eq!(json["text"], "hello");
    }

    #[test]
    fn serializes_tool_replies() {
        let json = serde_json::to_value(ClientEvent::ToolResponse(
            ToolResponseMessage::new("call_1", "{\"ok\":true}").with_tool_name("lookup"),
        ))
        .unwrap();
        assert_eq!(json["type"], "tool_response");
        assert_eq!(json["tool_call_id"], "call_1");
        assert_eq!(json["tool_name"], "lookup");

        let json = serde_json::to_value(ClientEvent::ToolError(
            ToolErrorMessage::new("call_2", "no handler").with_level("warn"),
        ))
        .unwrap();
        assert_eq!(json["type"], "tool_error");
        assert_eq!(json["error"], "no handler");
        assert_eq!(json["level"], "warn");
    }

    #[test]
    fn deserializes_chat_metadata() {
        let json = r#"{"type":"chat_metadata","chat_id":"c1","chat_group_id":"g1","request_id":"r1"}"#;
        match serde_json::from_str::<ServerEvent>(json).unwrap() {
            ServerEvent::ChatMetadata(meta) => {
                assert_eq!(meta.chat_id(), "c1");
                assert_eq!(meta.chat_group_id(), "g1");
                assert_eq!(meta.request_id(), Some("r1"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn deserializes_user_message_with_prosody() {
        let json = r#"{
            "type": "user_message",
            "message": {"role": "user", "content": "I'm fine"},
            "models": {"prosody": {"scores": {"Joy": 0.7, "Calmness": 0.4, "Anger": 0.01}}},
            "time": {"begin": 120, "end": 980},
            "from_text": false,
            "interim": true
        }"#;
        match serde_json::from_str::<ServerEvent>(json).unwrap() {
            ServerEvent::UserMessage(msg) => {
                assert_eq!(msg.message().role(), Role::User);
                assert_eq!(msg.message().content(), Some("I'm fine"));
                assert!(msg.interim());
                assert!(!msg.from_text());
                assert_eq!(msg.time().map(|t| (t.begin(), t.end())), Some((120, 980)));

                let scores = msg.models().prosody().unwrap().scores();
                let top = scores.top(2);
                assert_eq!(top[0].0, "Joy");
                assert_eq!(top[1].0, "Calmness");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn deserializes_audio_output() {
        let json = r#"{"type":"audio_output","id":"a1","index":0,"data":"AAEC"}"#;
        match serde_json::from_str::<ServerEvent>(json).unwrap() {
            ServerEvent::AudioOutput(audio) => {
                assert_eq!(audio.id(), "a1");
                assert_eq!(audio.decode().unwrap(), vec![0, 1, 2]);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn deserializes_tool_call_and_error() {
        let json = r#"{"type":"tool_call","name":"weather","parameters":"{\"city\":\"Oslo\"}","tool_call_id":"t1","tool_type":"function","response_required":true}"#;
        match serde_json::from_str::<ServerEvent>(json).unwrap() {
            ServerEvent::ToolCall(call) => {
                assert_eq!(call.name(), "weather");
                assert!(call.response_required());
                assert_eq!(call.parameters_json().unwrap()["city"], "Oslo");
            }
            other => panic!("unexpected event: {:?}", other),
        }

        let json = r#"{"type":"error","code":"I0100","slug":"uncaught","message":"boom"}"#;
        match serde_json::from_str::<ServerEvent>(json).unwrap() {
            ServerEvent::Error(err) => {
                assert_eq!(err.code(), "I0100");
                assert_eq!(err.slug(), "uncaught");
                assert_eq!(err.message(), "boom");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn unknown_kinds_are_tolerated() {
        let json = r#"{"type":"assistant_prosody","id":"x"}"#;
        assert!(matches!(
            serde_json::from_str::<ServerEvent>(json).unwrap(),
            ServerEvent::Unknown
        ));
    }

    #[test]
    fn client_events_round_trip_for_mock_servers() {
        let json = r#"{"type":"session_settings","audio":{"encoding":"linear16","sample_rate":48000,"channels":2}}"#;
        match serde_json::from_str::<ClientEvent>(json).unwrap() {
            ClientEvent::SessionSettings(settings) => {
                let audio = settings.audio().unwrap();
                assert_eq!(audio.encoding(), &AudioEncoding::Linear16);
                assert_eq!(audio.sample_rate(), 48000);
                assert_eq!(audio.channels(), 2);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
