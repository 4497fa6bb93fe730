#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolType {
    Builtin,
    Function,
}

/// A user-defined function made available to the assistant through
/// `session_settings`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Tool {
    #[serde(rename = "type")]
    tool_type: ToolType,

    /// The name of the function
    name: String,

    /// The parameters of the function as a JSON Schema string
    parameters: String,

    /// The description of the function
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,

    /// Text spoken by the assistant when the tool call fails
    #[serde(skip_serializing_if = "Option::is_none")]
    fallback_content: Option<String>,
}

impl Tool {
    pub fn function(name: &str, parameters: &serde_json::Value) -> Self {
        Self {
            tool_type: ToolType::Function,
            name: name.to_string(),
            parameters: parameters.to_string(),
            description: None,
            fallback_content: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_fallback_content(mut self, content: &str) -> Self {
        self.fallback_content = Some(content.to_string());
        self
    }

    pub fn tool_type(&self) -> ToolType {
        self.tool_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &str {
        &self.parameters
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// `tool_call` event: the assistant asks the client to run a tool.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolCallMessage {
    name: String,

    /// JSON encoded arguments
    parameters: String,

    tool_call_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_type: Option<ToolType>,

    /// Whether the server waits for a `tool_response` or `tool_error`
    #[serde(default)]
    response_required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    custom_session_id: Option<String>,
}

impl ToolCallMessage {
    pub fn new(tool_call_id: &str, name: &str, parameters: &str) -> Self {
        Self {
            name: name.to_string(),
            parameters: parameters.to_string(),
            tool_call_id: tool_call_id.to_string(),
            tool_type: None,
            response_required: false,
            custom_session_id: None,
        }
    }

    pub fn with_response_required(mut self, required: bool) -> Self {
        self.response_required = required;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &str {
        &self.parameters
    }

    pub fn parameters_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_str(&self.parameters)
    }

    pub fn tool_call_id(&self) -> &str {
        &self.tool_call_id
    }

    pub fn tool_type(&self) -> Option<ToolType> {
        self.tool_type
    }

    pub fn response_required(&self) -> bool {
        self.response_required
    }
}

/// `tool_response`: the successful result of a tool call.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolResponseMessage {
    tool_call_id: String,
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_type: Option<ToolType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    custom_session_id: Option<String>,
}

impl ToolResponseMessage {
    pub fn new(tool_call_id: &str, content: &str) -> Self {
        Self {
            tool_call_id: tool_call_id.to_string(),
            content: content.to_string(),
            tool_name: None,
            tool_type: None,
            custom_session_id: None,
        }
    }

    pub fn with_tool_name(mut self, name: &str) -> Self {
        self.tool_name = Some(name.to_string());
        self
    }

    pub fn tool_call_id(&self) -> &str {
        &self.tool_call_id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn tool_name(&self) -> Option<&str> {
        self.tool_name.as_deref()
    }
}

/// `tool_error`: a tool call that could not be completed.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolErrorMessage {
    tool_call_id: String,
    error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_type: Option<ToolType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    custom_session_id: Option<String>,
}

impl ToolErrorMessage {
    pub fn new(tool_call_id: &str, error: &str) -> Self {
        Self {
            tool_call_id: tool_call_id.to_string(),
            error: error.to_string(),
            content: None,
            code: None,
            level: None,
            tool_type: None,
            custom_session_id: None,
        }
    }

    pub fn with_content(mut self, content: &str) -> Self {
        self.content = Some(content.to_string());
        self
    }

    pub fn with_code(mut self, code: &str) -> Self {
        self.code = Some(code.to_string());
        self
    }

    pub fn with_level(mut self, level: &str) -> Self {
        self.level = Some(level.to_string());
        self
    }

    pub fn tool_call_id(&self) -> &str {
        &self.tool_call_id
    }

    pub fn error(&self) -> &str {
        &self.error
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}
