/// `error` event: the server aborted the request or the whole chat.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ErrorEvent {
    /// Machine readable error code, e.g. `E0100`
    code: String,

    /// Short identifier of the error class
    #[serde(default)]
    slug: String,

    message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    custom_session_id: Option<String>,
}

impl ErrorEvent {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            slug: String::new(),
            message: message.to_string(),
            request_id: None,
            custom_session_id: None,
        }
    }

    pub fn with_slug(mut self, slug: &str) -> Self {
        self.slug = slug.to_string();
        self
    }

    pub fn with_request_id(mut self, request_id: &str) -> Self {
        self.request_id = Some(request_id.to_string());
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }
}
