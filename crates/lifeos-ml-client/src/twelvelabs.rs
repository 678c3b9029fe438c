//! TwelveLabs REST client: video indexing, summarization and embeddings.

use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{MlError, MlResult};

const INDEX_NAME: &str = "video_analysis_index";
const INDEX_MODEL: &str = "pegasus1.2";
const EMBED_MODEL: &str = "Marengo-retrieval-2.7";

/// Hard cap on one ingest wait.
const INGEST_WAIT_CAP: Duration = Duration::from_secs(180);
/// Hard cap on one embedding wait.
const EMBED_WAIT_CAP: Duration = Duration::from_secs(300);
/// Fixed embedding poll interval, matching the upstream SDK default.
const EMBED_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// TwelveLabs client configuration.
#[derive(Debug, Clone)]
pub struct TwelveLabsConfig {
    pub api_key: String,
    pub base_url: String,
}

impl TwelveLabsConfig {
    /// Create config from environment variables. The key is required for
    /// workers; a missing key is fatal at startup.
    pub fn from_env() -> MlResult<Self> {
        Ok(Self {
            api_key: std::env::var("TWELVELABS_API_KEY")
                .map_err(|_| MlError::config_error("TWELVELABS_API_KEY not set"))?,
            base_url: std::env::var("TWELVELABS_BASE_URL")
                .unwrap_or_else(|_| "https://api.twelvelabs.io/v1.3".to_string()),
        })
    }
}

/// Observed state of an ingest or embedding task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Processing,
    Ready,
    Failed(String),
}

impl TaskState {
    fn parse(status: &str) -> Self {
        match status {
            "ready" => TaskState::Ready,
            "processing" | "indexing" => TaskState::Processing,
            "failed" | "error" => TaskState::Failed(status.to_string()),
            _ => TaskState::Pending,
        }
    }
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    #[serde(rename = "_id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct IndexListResponse {
    #[serde(default)]
    data: Vec<IndexEntry>,
}

#[derive(Debug, Deserialize)]
struct IndexEntry {
    #[serde(rename = "_id")]
    id: String,
    index_name: String,
}

#[derive(Debug, Deserialize)]
struct TaskResponse {
    status: String,
    #[serde(default)]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    data: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingSegments {
    #[serde(default)]
    segments: Vec<EmbeddingSegment>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingSegment {
    #[serde(default)]
    embeddings_float: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbedTaskResponse {
    #[serde(default)]
    video_embedding: Option<EmbeddingSegments>,
}

#[derive(Debug, Deserialize)]
struct TextEmbedResponse {
    #[serde(default)]
    text_embedding: Option<EmbeddingSegments>,
}

/// TwelveLabs REST client. One instance per worker.
#[derive(Clone)]
pub struct TwelveLabsClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl TwelveLabsClient {
    /// Create a new client.
    pub fn new(config: TwelveLabsConfig) -> MlResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            http,
            api_key: config.api_key,
            base_url: config.base_url,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> MlResult<Self> {
        Self::new(TwelveLabsConfig::from_env()?)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> MlResult<T> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(MlError::Api {
                status: status.as_u16(),
                body,
            })
        }
    }

    /// Ensure the analysis index exists and return its id.
    pub async fn ensure_index(&self) -> MlResult<String> {
        let response = self
            .http
            .get(self.url("/indexes"))
            .header("x-api-key", &self.api_key)
            .query(&[("index_name", INDEX_NAME)])
            .send()
            .await?;
        let list: IndexListResponse = Self::check(response).await?;

        if let Some(index) = list.data.into_iter().find(|i| i.index_name == INDEX_NAME) {
            debug!("Using existing index {} ({})", INDEX_NAME, index.id);
            return Ok(index.id);
        }

        let body = serde_json::json!({
            "index_name": INDEX_NAME,
            "models": [{
                "model_name": INDEX_MODEL,
                "model_options": ["visual", "audio"],
            }],
        });
        let response = self
            .http
            .post(self.url("/indexes"))
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let created: IdResponse = Self::check(response).await?;
        info!("Created index {} ({})", INDEX_NAME, created.id);
        Ok(created.id)
    }

    /// Create a video indexing task for one segment file.
    pub async fn create_index_task(&self, index_id: &str, path: &Path) -> MlResult<String> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("segment.mp4")
            .to_string();

        let form = Form::new().text("index_id", index_id.to_string()).part(
            "video_file",
            Part::bytes(bytes)
                .file_name(file_name)
                .mime_str("video/mp4")?,
        );

        let response = self
            .http
            .post(self.url("/tasks"))
            .header("x-api-key", &self.api_key)
            .multipart(form)
            .send()
            .await?;
        let task: IdResponse = Self::check(response).await?;
        debug!("Created indexing task {}", task.id);
        Ok(task.id)
    }

    async fn get_task(&self, task_id: &str) -> MlResult<(TaskState, Option<String>)> {
        let response = self
            .http
            .get(self.url(&format!("/tasks/{}", task_id)))
            .header("x-api-key", &self.api_key)
            .send()
            .await?;
        let task: TaskResponse = Self::check(response).await?;
        Ok((TaskState::parse(&task.status), task.video_id))
    }

    /// Adaptive wait for an indexing task, returning the provider video id.
    ///
    /// The interval shrinks during active processing and grows while
    /// pending; consecutive transport errors back off exponentially until
    /// the next successful poll. A terminal `failed`/`error` status is fatal
    /// for the job, as is exceeding the hard cap.
    pub async fn wait_for_ready(&self, task_id: &str) -> MlResult<String> {
        let started = Instant::now();
        let mut interval = Duration::from_millis(500);
        let mut error_streak = 0u32;

        loop {
            if started.elapsed() > INGEST_WAIT_CAP {
                return Err(MlError::Timeout(format!(
                    "indexing task {} not ready after {:?}",
                    task_id, INGEST_WAIT_CAP
                )));
            }

            match self.get_task(task_id).await {
                Ok((TaskState::Ready, video_id)) => {
                    let video_id = video_id
                        .ok_or_else(|| MlError::missing_data("ready task has no video_id"))?;
                    debug!("Task {} ready, video {}", task_id, video_id);
                    return Ok(video_id);
                }
                Ok((TaskState::Failed(status), _)) => {
                    return Err(MlError::TaskFailed(format!(
                        "indexing task {} ended with status {}",
                        task_id, status
                    )));
                }
                Ok((state, _)) => {
                    error_streak = 0;
                    interval = next_poll_interval(interval, &state);
                }
                Err(e) => {
                    error_streak += 1;
                    interval = transport_backoff(error_streak);
                    warn!(
                        "Poll of task {} failed ({} consecutive): {}",
                        task_id, error_streak, e
                    );
                }
            }

            tokio::time::sleep(interval).await;
        }
    }

    /// Generate the segment summary. Retried up to 3 times with linear
    /// backoff, per attempt `0.5s * attempt`.
    pub async fn generate_summary(&self, video_id: &str, prompt: &str) -> MlResult<String> {
        let body = serde_json::json!({
            "video_id": video_id,
            "prompt": prompt,
        });

        let mut last_error = None;
        for attempt in 1..=3u32 {
            let result: MlResult<GenerateResponse> = async {
                let response = self
                    .http
                    .post(self.url("/generate"))
                    .header("x-api-key", &self.api_key)
                    .json(&body)
                    .send()
                    .await?;
                Self::check(response).await
            }
            .await;

            match result {
                Ok(generated) => return Ok(generated.data),
                Err(e) => {
                    warn!("Summary attempt {}/3 failed: {}", attempt, e);
                    last_error = Some(e);
                    if attempt < 3 {
                        tokio::time::sleep(Duration::from_millis(500 * attempt as u64)).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| MlError::missing_data("summary retry loop")))
    }

    /// Create a video embedding task over the same segment file.
    pub async fn create_embed_task(&self, path: &Path) -> MlResult<String> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("segment.mp4")
            .to_string();

        let form = Form::new()
            .text("model_name", EMBED_MODEL)
            .text("video_embedding_scopes", "clip")
            .text("video_embedding_scopes", "video")
            .part(
                "video_file",
                Part::bytes(bytes)
                    .file_name(file_name)
                    .mime_str("video/mp4")?,
            );

        let response = self
            .http
            .post(self.url("/embed/tasks"))
            .header("x-api-key", &self.api_key)
            .multipart(form)
            .send()
            .await?;
        let task: IdResponse = Self::check(response).await?;
        debug!("Created embedding task {}", task.id);
        Ok(task.id)
    }

    /// Create a video embedding task from a remote URL instead of a local
    /// file. Used by the memory-create surface.
    pub async fn create_embed_task_from_url(&self, video_url: &str) -> MlResult<String> {
        let form = Form::new()
            .text("model_name", EMBED_MODEL)
            .text("video_embedding_scopes", "clip")
            .text("video_embedding_scopes", "video")
            .text("video_url", video_url.to_string());

        let response = self
            .http
            .post(self.url("/embed/tasks"))
            .header("x-api-key", &self.api_key)
            .multipart(form)
            .send()
            .await?;
        let task: IdResponse = Self::check(response).await?;
        debug!("Created embedding task {} for URL", task.id);
        Ok(task.id)
    }

    async fn get_embed_status(&self, task_id: &str) -> MlResult<TaskState> {
        let response = self
            .http
            .get(self.url(&format!("/embed/tasks/{}/status", task_id)))
            .header("x-api-key", &self.api_key)
            .send()
            .await?;
        let task: TaskResponse = Self::check(response).await?;
        Ok(TaskState::parse(&task.status))
    }

    /// Wait for an embedding task at a fixed interval.
    pub async fn wait_for_embedding(&self, task_id: &str) -> MlResult<()> {
        let started = Instant::now();

        loop {
            if started.elapsed() > EMBED_WAIT_CAP {
                return Err(MlError::Timeout(format!(
                    "embedding task {} not ready after {:?}",
                    task_id, EMBED_WAIT_CAP
                )));
            }

            match self.get_embed_status(task_id).await? {
                TaskState::Ready => return Ok(()),
                TaskState::Failed(status) => {
                    return Err(MlError::TaskFailed(format!(
                        "embedding task {} ended with status {}",
                        task_id, status
                    )));
                }
                _ => tokio::time::sleep(EMBED_POLL_INTERVAL).await,
            }
        }
    }

    /// Retrieve the 1024-d vector from a completed embedding task.
    pub async fn retrieve_embedding(&self, task_id: &str) -> MlResult<Vec<f32>> {
        let response = self
            .http
            .get(self.url(&format!("/embed/tasks/{}", task_id)))
            .header("x-api-key", &self.api_key)
            .query(&[
                ("embedding_option", "visual-text"),
                ("embedding_option", "audio"),
            ])
            .send()
            .await?;
        let task: EmbedTaskResponse = Self::check(response).await?;

        task.video_embedding
            .and_then(|e| e.segments.into_iter().next())
            .map(|s| s.embeddings_float)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| MlError::missing_data("embedding task returned no segments"))
    }

    /// Embed a text query into the shared 1024-d space.
    pub async fn text_embedding(&self, text: &str) -> MlResult<Vec<f32>> {
        let form = Form::new()
            .text("model_name", EMBED_MODEL)
            .text("text", text.to_string());

        let response = self
            .http
            .post(self.url("/embed"))
            .header("x-api-key", &self.api_key)
            .multipart(form)
            .send()
            .await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            return Err(MlError::Api { status: 429, body });
        }
        let embedded: TextEmbedResponse = Self::check(response).await?;

        embedded
            .text_embedding
            .and_then(|e| e.segments.into_iter().next())
            .map(|s| s.embeddings_float)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| MlError::missing_data("text embedding returned no segments"))
    }
}

/// Next poll interval given the last observed state.
fn next_poll_interval(current: Duration, state: &TaskState) -> Duration {
    match state {
        TaskState::Processing => Duration::from_millis(500),
        _ => {
            let grown = current.mul_f64(1.2);
            grown.min(Duration::from_secs(2))
        }
    }
}

/// Backoff after `streak` consecutive transport errors: `min(2.0, 0.1 * 2^k)`.
fn transport_backoff(streak: u32) -> Duration {
    let secs = 0.1_f64 * 2.0_f64.powi(streak.saturating_sub(1) as i32);
    Duration::from_secs_f64(secs.min(2.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base: &str) -> TwelveLabsClient {
        TwelveLabsClient::new(TwelveLabsConfig {
            api_key: "test-key".to_string(),
            base_url: base.to_string(),
        })
        .unwrap()
    }

    #[test]
    fn processing_clamps_to_half_second() {
        let next = next_poll_interval(Duration::from_secs(2), &TaskState::Processing);
        assert_eq!(next, Duration::from_millis(500));
    }

    #[test]
    fn pending_grows_but_stays_under_two_seconds() {
        let mut interval = Duration::from_millis(500);
        for _ in 0..20 {
            interval = next_poll_interval(interval, &TaskState::Pending);
            assert!(interval <= Duration::from_secs(2));
        }
        assert_eq!(interval, Duration::from_secs(2));
    }

    #[test]
    fn transport_backoff_caps_at_two_seconds() {
        assert_eq!(transport_backoff(1), Duration::from_secs_f64(0.1));
        assert_eq!(transport_backoff(2), Duration::from_secs_f64(0.2));
        assert_eq!(transport_backoff(10), Duration::from_secs(2));
    }

    #[test]
    fn task_state_parsing() {
        assert_eq!(TaskState::parse("ready"), TaskState::Ready);
        assert_eq!(TaskState::parse("processing"), TaskState::Processing);
        assert_eq!(TaskState::parse("validating"), TaskState::Pending);
        assert!(matches!(TaskState::parse("failed"), TaskState::Failed(_)));
    }

    #[tokio::test]
    async fn wait_for_ready_returns_video_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks/task-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "_id": "task-1",
                "status": "ready",
                "video_id": "vid-9",
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let video_id = client.wait_for_ready("task-1").await.unwrap();
        assert_eq!(video_id, "vid-9");
    }

    #[tokio::test]
    async fn wait_for_ready_fails_on_terminal_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks/task-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "_id": "task-2",
                "status": "failed",
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.wait_for_ready("task-2").await.unwrap_err();
        assert!(matches!(err, MlError::TaskFailed(_)));
    }

    #[tokio::test]
    async fn summary_retries_transient_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "gen-1",
                "data": "A person cooking dinner.",
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let summary = client.generate_summary("vid-1", "Summarize").await.unwrap();
        assert_eq!(summary, "A person cooking dinner.");
    }

    #[tokio::test]
    async fn text_embedding_extracts_first_segment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "text_embedding": {
                    "segments": [{"embeddings_float": [0.1, 0.2, 0.3]}],
                },
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let vector = client.text_embedding("cooking").await.unwrap();
        assert_eq!(vector, vec![0.1, 0.2, 0.3]);
    }
}
