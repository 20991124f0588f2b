//! Async video generation client.
//!
//! The video service exposes a Bedrock-style async invoke surface: submit a
//! model input plus an S3 output location, get back an invocation ARN, then
//! poll until the job reports Completed or Failed. The service drops the
//! finished render under the S3 prefix it was given.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{AiError, AiResult};

const MODEL_ID: &str = "luma.ray-v2:0";

/// One video generation request: fixed 16:9 / 5s / 720p, optional keyframe.
#[derive(Debug, Clone)]
pub struct VideoGenRequest {
    /// Prompt text for the clip
    pub prompt: String,
    /// Base64 JPEG used as the opening frame, if any
    pub keyframe_jpeg: Option<String>,
    /// `s3://bucket/prefix/` the service writes the render under
    pub output_s3_uri: String,
}

/// Opaque handle to a submitted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle(pub String);

impl std::fmt::Display for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Result of one poll of a submitted job.
#[derive(Debug, Clone)]
pub enum JobPoll {
    /// Still rendering
    Running,
    /// Done; the render is under `output_location`
    Completed { output_location: String },
    /// The service gave up on this job
    Failed { reason: String },
}

/// The submit/poll seam the pipeline drives jobs through.
#[async_trait]
pub trait VideoGenerator: Send + Sync {
    /// Submit a job; returns a handle for polling.
    async fn submit(&self, request: &VideoGenRequest) -> AiResult<JobHandle>;

    /// Check on a submitted job.
    async fn poll(&self, handle: &JobHandle) -> AiResult<JobPoll>;
}

/// HTTP client for the async invoke API.
pub struct RayClient {
    base_url: String,
    api_key: String,
    client: Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartInvokeRequest {
    model_id: String,
    model_input: ModelInput,
    output_data_config: OutputDataConfig,
}

#[derive(Debug, Serialize)]
struct ModelInput {
    prompt: String,
    aspect_ratio: String,
    #[serde(rename = "loop")]
    loop_video: bool,
    duration: String,
    resolution: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    keyframes: Option<Keyframes>,
}

#[derive(Debug, Serialize)]
struct Keyframes {
    frame0: KeyframeSpec,
}

#[derive(Debug, Serialize)]
struct KeyframeSpec {
    #[serde(rename = "type")]
    frame_type: String,
    source: KeyframeSource,
}

#[derive(Debug, Serialize)]
struct KeyframeSource {
    #[serde(rename = "type")]
    source_type: String,
    media_type: String,
    data: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutputDataConfig {
    s3_output_data_config: S3OutputDataConfig,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct S3OutputDataConfig {
    s3_uri: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartInvokeResponse {
    invocation_arn: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetInvokeResponse {
    status: String,
    #[serde(default)]
    failure_message: Option<String>,
    #[serde(default)]
    output_data_config: Option<OutputDataConfig>,
}

impl RayClient {
    /// Create a client from environment variables.
    ///
    /// Requires `VIDEOGEN_API_URL` and `VIDEOGEN_API_KEY`.
    pub fn from_env() -> AiResult<Self> {
        let base_url = std::env::var("VIDEOGEN_API_URL")
            .map_err(|_| AiError::config_error("VIDEOGEN_API_URL not set"))?;
        let api_key = std::env::var("VIDEOGEN_API_KEY")
            .map_err(|_| AiError::config_error("VIDEOGEN_API_KEY not set"))?;

        Ok(Self::new(base_url, api_key))
    }

    /// Create a client against an explicit endpoint.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            client: Client::new(),
        }
    }

    fn build_request(&self, request: &VideoGenRequest) -> StartInvokeRequest {
        StartInvokeRequest {
            model_id: MODEL_ID.to_string(),
            model_input: ModelInput {
                prompt: request.prompt.clone(),
                aspect_ratio: "16:9".to_string(),
                loop_video: false,
                duration: "5s".to_string(),
                resolution: "720p".to_string(),
                keyframes: request.keyframe_jpeg.as_ref().map(|data| Keyframes {
                    frame0: KeyframeSpec {
                        frame_type: "image".to_string(),
                        source: KeyframeSource {
                            source_type: "base64".to_string(),
                            media_type: "image/jpeg".to_string(),
                            data: data.clone(),
                        },
                    },
                }),
            },
            output_data_config: OutputDataConfig {
                s3_output_data_config: S3OutputDataConfig {
                    s3_uri: request.output_s3_uri.clone(),
                },
            },
        }
    }
}

#[async_trait]
impl VideoGenerator for RayClient {
    async fn submit(&self, request: &VideoGenRequest) -> AiResult<JobHandle> {
        let url = format!("{}/async-invoke", self.base_url);
        debug!("Submitting video job, output {}", request.output_s3_uri);

        let body = self.build_request(request);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AiError::request_failed(format!("submit request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // 4xx means the request itself was bad; no point retrying it.
            if status.is_client_error() {
                return Err(AiError::SubmissionRejected(format!("{}: {}", status, body)));
            }
            return Err(AiError::ApiStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: StartInvokeResponse = response
            .json()
            .await
            .map_err(|e| AiError::malformed(format!("submit response: {}", e)))?;

        info!("Started async job {}", parsed.invocation_arn);
        Ok(JobHandle(parsed.invocation_arn))
    }

    async fn poll(&self, handle: &JobHandle) -> AiResult<JobPoll> {
        let url = format!("{}/async-invoke/{}", self.base_url, handle.0);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| AiError::request_failed(format!("poll request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::ApiStatus { status, body });
        }

        let parsed: GetInvokeResponse = response
            .json()
            .await
            .map_err(|e| AiError::malformed(format!("poll response: {}", e)))?;

        match parsed.status.as_str() {
            "InProgress" => Ok(JobPoll::Running),
            "Completed" => {
                let output_location = parsed
                    .output_data_config
                    .map(|c| c.s3_output_data_config.s3_uri)
                    .ok_or_else(|| {
                        AiError::malformed("completed job missing output location")
                    })?;
                Ok(JobPoll::Completed { output_location })
            }
            "Failed" => Ok(JobPoll::Failed {
                reason: parsed
                    .failure_message
                    .unwrap_or_else(|| "unspecified failure".to_string()),
            }),
            other => {
                warn!("Unexpected job status {} for {}", other, handle);
                Ok(JobPoll::Running)
            }
        }
    }
}
