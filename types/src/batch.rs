use std::fmt;

use crate::stream::ModelsConfig;

/// Identifier of a batch inference job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    /// COMPLETED and FAILED jobs never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct JobState {
    status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_timestamp_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    started_timestamp_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ended_timestamp_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    num_predictions: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    num_errors: Option<u64>,
    /// Failure reason of FAILED jobs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl JobState {
    pub fn new(status: JobStatus) -> Self {
        Self {
            status,
            created_timestamp_ms: None,
            started_timestamp_ms: None,
            ended_timestamp_ms: None,
            num_predictions: None,
            num_errors: None,
            message: None,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn created_timestamp_ms(&self) -> Option<u64> {
        self.created_timestamp_ms
    }

    pub fn ended_timestamp_ms(&self) -> Option<u64> {
        self.ended_timestamp_ms
    }

    pub fn num_predictions(&self) -> Option<u64> {
        self.num_predictions
    }

    pub fn num_errors(&self) -> Option<u64> {
        self.num_errors
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

/// Snapshot of a batch job as reported by `GET /v0/batch/jobs/{id}`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct JobDetails {
    job_id: JobId,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    state: JobState,
    /// The submitted request, kept opaque
    #[serde(default, skip_serializing_if = "Option::is_none")]
    request: Option<serde_json::Value>,
}

impl JobDetails {
    pub fn new(job_id: JobId, state: JobState) -> Self {
        Self {
            job_id,
            kind: None,
            state,
            request: None,
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    pub fn status(&self) -> JobStatus {
        self.state.status
    }

    pub fn request(&self) -> Option<&serde_json::Value> {
        self.request.as_ref()
    }
}

/// Body of `POST /v0/batch/jobs`: media to fetch or inline text, plus the models to run.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct JobRequest {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    text: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    models: Option<ModelsConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    callback_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    notify: Option<bool>,
}

impl JobRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.urls.push(url.to_string());
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text.push(text.to_string());
        self
    }

    pub fn with_models(mut self, models: ModelsConfig) -> Self {
        self.models = Some(models);
        self
    }

    /// URL the server POSTs the job details to once the job ends.
    pub fn with_callback_url(mut self, url: &str) -> Self {
        self.callback_url = Some(url.to_string());
        self
    }

    pub fn with_notify(mut self, notify: bool) -> Self {
        self.notify = Some(notify);
        self
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn text(&self) -> &[String] {
        &self.text
    }

    pub fn models(&self) -> Option<&ModelsConfig> {
        self.models.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty() && self.text.is_empty()
    }
}

/// Body returned by `POST /v0/batch/jobs`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SubmittedJob {
    job_id: JobId,
}

impl SubmittedJob {
    pub fn new(job_id: JobId) -> Self {
        Self { job_id }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }
}
