use async_trait::async_trait;

use crate::chat::socket::ChatSocket;
use crate::error::Result;
use crate::types::tools::{ToolCallMessage, ToolErrorMessage, ToolResponseMessage};

/// Answers `tool_call` events.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// The tool's output, or an error message shown to the assistant.
    async fn call(&self, call: &ToolCallMessage) -> std::result::Result<String, String>;
}

/// Replies to a tool call through `handler`, or with a fallback error when
/// no handler is configured and the server waits for an answer.
pub(crate) async fn answer(socket: &ChatSocket, handler: Option<&dyn ToolHandler>, call: &ToolCallMessage) -> Result<()> {
    tracing::info!("tool call {} ({})", call.name(), call.tool_call_id());
    let Some(handler) = handler else {
        tracing::warn!(
            "no tool handler configured, ignoring tool call {} ({})",
            call.name(),
            call.tool_call_id()
        );
        if call.response_required() {
            socket.send_tool_error(fallback_error(call)).await?;
        }
        return Ok(());
    };

    match handler.call(call).await {
        Ok(content) => {
            let response = ToolResponseMessage::new(call.tool_call_id(), &content).with_tool_name(call.name());
            socket.send_tool_response(response).await
        }
        Err(error) => {
            tracing::warn!("tool {} failed: {}", call.name(), error);
            let reply = ToolErrorMessage::new(call.tool_call_id(), &error).with_level("warn");
            socket.send_tool_error(reply).await
        }
    }
}

fn fallback_error(call: &ToolCallMessage) -> ToolErrorMessage {
    ToolErrorMessage::new(call.tool_call_id(), &format!("no handler for tool {}", call.name()))
        .with_content("This tool is not available.")
        .with_level("warn")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_targets_the_call() {
        let call = ToolCallMessage::new("t1", "weather", "{}").with_response_required(true);
        let json = serde_json::to_value(crate::types::ClientEvent::ToolError(fallback_error(&call))).unwrap();
        assert_eq!(json["type"], "tool_error");
        assert_eq!(json["tool_call_id"], "t1");
        assert!(json["error"].as_str().unwrap().contains("weather"));
    }
}
