//! REST wrapper over the ComfyUI HTTP endpoints.
//!
//! Covers prompt submission, queue inspection, cancellation, history
//! retrieval, image upload, and the `/view` output proxy. Transport
//! failures surface as [`EngineApiError::Unreachable`]; non-2xx replies
//! as [`EngineApiError::Rejected`]. No retries happen at this layer.

use serde::Deserialize;
use serde_json::Value;

/// HTTP client for a single engine endpoint.
#[derive(Clone)]
pub struct EngineApi {
    client: reqwest::Client,
    base_url: String,
}

/// Reply from `POST /prompt` after a workflow is queued.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Engine-assigned identity for the queued prompt.
    pub prompt_id: String,
    /// Position in the execution queue.
    #[serde(default)]
    pub number: i64,
}

/// Point-in-time snapshot of the engine's own queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub pending: usize,
    pub running: usize,
}

/// Raw shape of `GET /queue`.
#[derive(Debug, Deserialize)]
struct QueueResponse {
    #[serde(default)]
    queue_pending: Vec<Value>,
    #[serde(default)]
    queue_running: Vec<Value>,
}

/// Reply from `POST /upload/image`.
#[derive(Debug, Deserialize)]
pub struct UploadedImage {
    /// Name the engine stored the file under.
    pub name: String,
    #[serde(default)]
    pub subfolder: String,
    #[serde(rename = "type", default)]
    pub folder_type: String,
}

/// Errors from the engine REST layer.
#[derive(Debug, thiserror::Error)]
pub enum EngineApiError {
    /// The endpoint could not be reached (network, DNS, TLS).
    #[error("engine unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),

    /// The engine answered with a non-2xx status.
    #[error("engine rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },
}

impl EngineApi {
    /// Create a client for one engine instance.
    ///
    /// * `base_url` - HTTP base, e.g. `http://127.0.0.1:8188`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Queue a merged prompt for execution.
    ///
    /// `client_id` scopes engine-side state so event-stream messages
    /// reach the right consumer.
    pub async fn submit_prompt(
        &self,
        prompt: &Value,
        client_id: &str,
    ) -> Result<SubmitResponse, EngineApiError> {
        let body = serde_json::json!({
            "prompt": prompt,
            "client_id": client_id,
        });

        let response = self
            .client
            .post(format!("{}/prompt", self.base_url))
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Snapshot the engine's pending/running queue counts.
    pub async fn get_queue(&self) -> Result<QueueSnapshot, EngineApiError> {
        let response = self
            .client
            .get(format!("{}/queue", self.base_url))
            .send()
            .await?;

        let queue: QueueResponse = Self::parse_response(response).await?;
        Ok(QueueSnapshot {
            pending: queue.queue_pending.len(),
            running: queue.queue_running.len(),
        })
    }

    /// Remove a still-queued prompt from the engine's queue.
    pub async fn delete_queued(&self, prompt_id: &str) -> Result<(), EngineApiError> {
        let body = serde_json::json!({ "delete": [prompt_id] });

        let response = self
            .client
            .post(format!("{}/queue", self.base_url))
            .json(&body)
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// Interrupt whatever prompt is currently executing.
    ///
    /// The engine offers no per-prompt interrupt; callers must check
    /// that the target prompt is the one running before using this.
    pub async fn interrupt(&self) -> Result<(), EngineApiError> {
        let response = self
            .client
            .post(format!("{}/interrupt", self.base_url))
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// Fetch the recorded outputs for a finished prompt.
    ///
    /// `GET /history/{prompt_id}` returns a map keyed by prompt id;
    /// the entry's `outputs` object maps node ids to their results.
    pub async fn get_outputs(&self, prompt_id: &str) -> Result<Option<Value>, EngineApiError> {
        let response = self
            .client
            .get(format!("{}/history/{}", self.base_url, prompt_id))
            .send()
            .await?;

        let history: Value = Self::parse_response(response).await?;
        Ok(history
            .get(prompt_id)
            .and_then(|entry| entry.get("outputs"))
            .cloned())
    }

    /// Stage an input image on the engine.
    pub async fn upload_image(
        &self,
        image: Vec<u8>,
        filename: &str,
        overwrite: bool,
    ) -> Result<UploadedImage, EngineApiError> {
        let part = reqwest::multipart::Part::bytes(image).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new()
            .part("image", part)
            .text("overwrite", overwrite.to_string());

        let response = self
            .client
            .post(format!("{}/upload/image", self.base_url))
            .multipart(form)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Open a streaming response for an output file.
    ///
    /// `query` is the raw querystring forwarded to `GET /view`
    /// (`filename=...&type=output`). The caller streams the body.
    pub async fn view(&self, query: &str) -> Result<reqwest::Response, EngineApiError> {
        let response = self
            .client
            .get(format!("{}/view?{}", self.base_url, query))
            .send()
            .await?;

        Self::ensure_success(response).await
    }

    // ---- private helpers ----

    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, EngineApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(EngineApiError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, EngineApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    async fn check_status(response: reqwest::Response) -> Result<(), EngineApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_response_counts_entries() {
        let raw = r#"{"queue_pending":[[0,"a"],[1,"b"]],"queue_running":[[2,"c"]]}"#;
        let parsed: QueueResponse = serde_json::from_str(raw).unwrap();

        assert_eq!(parsed.queue_pending.len(), 2);
        assert_eq!(parsed.queue_running.len(), 1);
    }

    #[test]
    fn queue_response_defaults_when_fields_missing() {
        let parsed: QueueResponse = serde_json::from_str("{}").unwrap();

        assert!(parsed.queue_pending.is_empty());
        assert!(parsed.queue_running.is_empty());
    }

    #[test]
    fn uploaded_image_parses_engine_reply() {
        let raw = r#"{"name":"sketch.png","subfolder":"","type":"input"}"#;
        let parsed: UploadedImage = serde_json::from_str(raw).unwrap();

        assert_eq!(parsed.name, "sketch.png");
        assert_eq!(parsed.folder_type, "input");
    }
}
