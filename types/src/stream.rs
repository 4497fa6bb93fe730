//! Frames of the streaming inference socket (`/v0/stream/models`).
//!
//! Each request carries one payload plus the model configuration to run on
//! it; the server answers every request with exactly one response frame.

use serde_json::{Map, Value};

use crate::audio::encode_base64;

pub const MODEL_FACE: &str = "face";
pub const MODEL_PROSODY: &str = "prosody";
pub const MODEL_LANGUAGE: &str = "language";
pub const MODEL_BURST: &str = "burst";
pub const MODEL_FACEMESH: &str = "facemesh";

/// Opaque per-model configuration blocks, keyed by model name.
///
/// The block contents are forwarded as-is; this crate does not interpret
/// model specific fields.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ModelsConfig(Map<String, Value>);

impl ModelsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, name: &str, config: Value) -> Self {
        self.0.insert(name.to_string(), config);
        self
    }

    pub fn with_face(self) -> Self {
        self.with_model(MODEL_FACE, Value::Object(Map::new()))
    }

    pub fn with_prosody(self) -> Self {
        self.with_model(MODEL_PROSODY, Value::Object(Map::new()))
    }

    pub fn with_language(self) -> Self {
        self.with_model(MODEL_LANGUAGE, Value::Object(Map::new()))
    }

    pub fn with_burst(self) -> Self {
        self.with_model(MODEL_BURST, Value::Object(Map::new()))
    }

    pub fn with_facemesh(self) -> Self {
        self.with_model(MODEL_FACEMESH, Value::Object(Map::new()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct StreamRequest {
    /// Base64 media, or plain text when `raw_text` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    models: Option<ModelsConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    raw_text: Option<bool>,

    /// Length of the sliding window the server keeps for audio models
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stream_window_ms: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    reset_stream: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    job_details: Option<bool>,

    /// Echoed back in the matching response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload_id: Option<String>,
}

impl StreamRequest {
    pub fn bytes(bytes: &[u8]) -> Self {
        Self {
            data: Some(encode_base64(bytes)),
            ..Self::default()
        }
    }

    pub fn text(text: &str) -> Self {
        Self {
            data: Some(text.to_string()),
            raw_text: Some(true),
            ..Self::default()
        }
    }

    /// Facemesh landmarks, sent as their JSON text.
    pub fn facemesh(landmarks: &Value) -> Self {
        Self {
            data: Some(landmarks.to_string()),
            ..Self::default()
        }
    }

    pub fn reset() -> Self {
        Self {
            reset_stream: Some(true),
            ..Self::default()
        }
    }

    pub fn job_details() -> Self {
        Self {
            job_details: Some(true),
            ..Self::default()
        }
    }

    pub fn with_models(mut self, models: ModelsConfig) -> Self {
        self.models = Some(models);
        self
    }

    pub fn with_stream_window_ms(mut self, window: u32) -> Self {
        self.stream_window_ms = Some(window);
        self
    }

    pub fn with_payload_id(mut self, payload_id: &str) -> Self {
        self.payload_id = Some(payload_id.to_string());
        self
    }

    pub fn data(&self) -> Option<&str> {
        self.data.as_deref()
    }

    pub fn models(&self) -> Option<&ModelsConfig> {
        self.models.as_ref()
    }

    pub fn raw_text(&self) -> bool {
        self.raw_text.unwrap_or(false)
    }

    pub fn stream_window_ms(&self) -> Option<u32> {
        self.stream_window_ms
    }

    pub fn is_reset(&self) -> bool {
        self.reset_stream.unwrap_or(false)
    }

    pub fn wants_job_details(&self) -> bool {
        self.job_details.unwrap_or(false)
    }

    pub fn payload_id(&self) -> Option<&str> {
        self.payload_id.as_deref()
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StreamJobDetails {
    job_id: String,
}

impl StreamJobDetails {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }
}

/// Reply to one [`StreamRequest`]. Prediction blocks are kept as raw JSON.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct StreamResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    job_details: Option<StreamJobDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    face: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    prosody: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    language: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    burst: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    facemesh: Option<Value>,
}

impl StreamResponse {
    pub fn payload_id(&self) -> Option<&str> {
        self.payload_id.as_deref()
    }

    pub fn job_details(&self) -> Option<&StreamJobDetails> {
        self.job_details.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }

    /// Predictions of one model, e.g. `"prosody"`.
    pub fn predictions(&self, model: &str) -> Option<&Value> {
        match model {
            MODEL_FACE => self.face.as_ref(),
            MODEL_PROSODY => self.prosody.as_ref(),
            MODEL_LANGUAGE => self.language.as_ref(),
            MODEL_BURST => self.burst.as_ref(),
            MODEL_FACEMESH => self.facemesh.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bytes_request_is_base64() {
        let request = StreamRequest::bytes(&[1, 2, 3])
            .with_models(ModelsConfig::new().with_prosody())
            .with_stream_window_ms(2000);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["data"], "AQID");
        assert_eq!(json["models"], json!({"prosody": {}}));
        assert_eq!(json["stream_window_ms"], 2000);
        assert!(json.get("raw_text").is_none());
    }

    #[test]
    fn text_request_sets_raw_text() {
        let json = serde_json::to_value(StreamRequest::text("hello there")).unwrap();
        assert_eq!(json, json!({"data": "hello there", "raw_text": true}));
    }

    #[test]
    fn control_requests_carry_only_their_flag() {
        assert_eq!(
            serde_json::to_value(StreamRequest::reset()).unwrap(),
            json!({"reset_stream": true})
        );
        assert_eq!(
            serde_json::to_value(StreamRequest::job_details()).unwrap(),
            json!({"job_details": true})
        );
    }

    #[test]
    fn models_config_is_forwarded_verbatim() {
        let models = ModelsConfig::new()
            .with_model("face", json!({"fps_pred": 3, "identify_faces": true}))
            .with_language();
        let json = serde_json::to_value(&models).unwrap();
        assert_eq!(json["face"]["fps_pred"], 3);
        assert_eq!(json["language"], json!({}));
    }

    #[test]
    fn response_exposes_predictions_and_errors() {
        let response: StreamResponse = serde_json::from_value(json!({
            "payload_id": "p-1",
            "prosody": {"predictions": [{"emotions": []}]},
            "warning": "no speech"
        }))
        .unwrap();
        assert_eq!(response.payload_id(), Some("p-1"));
        assert!(response.predictions("prosody").is_some());
        assert!(response.predictions("face").is_none());
        assert_eq!(response.warning(), Some("no speech"));

        let response: StreamResponse =
            serde_json::from_value(json!({"error": "bad payload", "code": "E0203"})).unwrap();
        assert_eq!(response.error(), Some("bad payload"));
        assert_eq!(response.code(), Some("E0203"));
    }
}
