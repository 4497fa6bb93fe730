//! Batch inference jobs over the REST API.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use secrecy::ExposeSecret;

use crate::client::config::ClientConfig;
use crate::client::consts::{API_KEY_HEADER, BATCH_JOBS_PATH};
use crate::client::utils;
use crate::error::{Error, Result};
use crate::retry::{poll_until, Attempt, RetryPolicy};
use crate::types::batch::{JobDetails, JobId, JobRequest, JobStatus, SubmittedJob};

/// Anything that reports the current state of a job.
#[async_trait]
pub trait JobStatusSource: Send + Sync {
    async fn job_details(&self, id: &JobId) -> Result<JobDetails>;
}

#[derive(Debug, Clone)]
pub struct BatchClient {
    config: Arc<ClientConfig>,
    http: reqwest::Client,
}

impl BatchClient {
    pub(crate) fn new(config: Arc<ClientConfig>) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Submits a job and returns a handle to it.
    pub async fn submit_job(&self, request: &JobRequest) -> Result<BatchJob> {
        if request.is_empty() {
            return Err(Error::InvalidArgument("job request has neither urls nor text".to_string()));
        }
        let url = utils::endpoint_url(self.config.base_url(), BATCH_JOBS_PATH, &[])?;
        let response = self.authorized(self.http.post(url)).json(request).send().await?;
        let submitted: SubmittedJob = check(response).await?.json().await?;
        tracing::info!("submitted batch job {}", submitted.job_id());
        Ok(self.job(submitted.job_id().clone()))
    }

    pub async fn get_job_details(&self, id: &JobId) -> Result<JobDetails> {
        let response = self.get(&format!("{}/{}", BATCH_JOBS_PATH, id)).await?;
        Ok(response.json().await?)
    }

    /// Predictions of a completed job, as returned by the server.
    pub async fn get_job_predictions(&self, id: &JobId) -> Result<serde_json::Value> {
        let response = self.get(&format!("{}/{}/predictions", BATCH_JOBS_PATH, id)).await?;
        Ok(response.json().await?)
    }

    /// Zip archive of the job's artifacts.
    pub async fn get_job_artifacts(&self, id: &JobId) -> Result<Bytes> {
        let response = self.get(&format!("{}/{}/artifacts", BATCH_JOBS_PATH, id)).await?;
        Ok(response.bytes().await?)
    }

    /// Fetches an arbitrary URL, e.g. a media file referenced by a job.
    pub async fn download(&self, url: &str) -> Result<Bytes> {
        let response = self.http.get(url).send().await?;
        Ok(check(response).await?.bytes().await?)
    }

    pub fn job(&self, id: JobId) -> BatchJob {
        BatchJob::new(id, self.clone())
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response> {
        let url = utils::endpoint_url(self.config.base_url(), path, &[])?;
        let response = self.authorized(self.http.get(url)).send().await?;
        check(response).await
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.header(API_KEY_HEADER, self.config.api_key().expose_secret())
    }
}

#[async_trait]
impl JobStatusSource for BatchClient {
    async fn job_details(&self, id: &JobId) -> Result<JobDetails> {
        self.get_job_details(id).await
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::error!("request failed with {}: {}", status, body);
    Err(Error::from_status(status, body))
}

/// Handle to a submitted job. Holds no state; every query hits the server.
#[derive(Debug, Clone)]
pub struct BatchJob<C = BatchClient> {
    id: JobId,
    client: C,
}

impl<C: JobStatusSource> BatchJob<C> {
    pub fn new(id: JobId, client: C) -> Self {
        Self { id, client }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub async fn get_details(&self) -> Result<JobDetails> {
        self.client.job_details(&self.id).await
    }

    pub async fn get_status(&self) -> Result<JobStatus> {
        Ok(self.get_details().await?.status())
    }

    /// Waits until the job completed or failed, polling with backoff.
    ///
    /// Failing with [`Error::Timeout`] only stops the waiting; the job keeps
    /// running on the server.
    pub async fn await_complete(&self, timeout: Duration) -> Result<JobDetails> {
        self.await_complete_with(&RetryPolicy::new(timeout)).await
    }

    pub async fn await_complete_with(&self, policy: &RetryPolicy) -> Result<JobDetails> {
        let details = poll_until(policy, move || async move {
            let details = self.get_details().await?;
            if details.status().is_terminal() {
                Ok(Attempt::Done(details))
            } else {
                tracing::debug!("job {} is {:?}", self.id, details.status());
                Ok(Attempt::Pending)
            }
        })
        .await?;
        tracing::info!("job {} ended as {:?}", self.id, details.status());
        Ok(details)
    }
}

impl BatchJob<BatchClient> {
    pub async fn get_predictions(&self) -> Result<serde_json::Value> {
        self.client.get_job_predictions(&self.id).await
    }

    /// Writes the predictions as JSON to `path`.
    pub async fn download_predictions(&self, path: impl AsRef<Path>) -> Result<()> {
        let predictions = self.get_predictions().await?;
        let json = serde_json::to_vec_pretty(&predictions)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Writes the artifacts archive to `path`.
    pub async fn download_artifacts(&self, path: impl AsRef<Path>) -> Result<()> {
        let artifacts = self.client.get_job_artifacts(&self.id).await?;
        tokio::fs::write(path, &artifacts).await?;
        Ok(())
    }
}
