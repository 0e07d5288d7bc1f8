//! Client for the external content-store API.
//!
//! Workflow definitions live in a remote CRUD service; this wrapper
//! covers the list/find endpoint this core depends on plus the CRUD
//! passthroughs the HTTP surface re-exposes. Responses come back as
//! `{"data": ...}` envelopes.

use serde::Deserialize;
use serde_json::Value;

use crate::definition::WorkflowDefinition;

/// HTTP client for the content API.
#[derive(Clone)]
pub struct ContentClient {
    client: reqwest::Client,
    base_url: String,
}

/// Envelope for the query-string-filtered list endpoint.
#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    data: Vec<Value>,
}

/// Errors from the content API layer.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("content API request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("content API error ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("malformed workflow definition: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ContentClient {
    /// * `base_url` - e.g. `http://content.internal/material-center/api`.
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// List workflows matching query parameters, returning the raw
    /// response envelope.
    pub async fn find(&self, query: &[(&str, &str)]) -> Result<Value, ContentError> {
        let response = self
            .client
            .get(format!("{}/workflows", self.base_url))
            .query(query)
            .send()
            .await?;
        Self::parse(response).await
    }

    /// Resolve the first workflow definition matching `key`.
    pub async fn find_by_key(&self, key: &str) -> Result<Option<WorkflowDefinition>, ContentError> {
        let response = self
            .client
            .get(format!("{}/workflows", self.base_url))
            .query(&[("key", key)])
            .send()
            .await?;

        let list: ListResponse = {
            let value: Value = Self::parse(response).await?;
            serde_json::from_value(value)?
        };

        match list.data.into_iter().next() {
            Some(raw) => Ok(Some(serde_json::from_value(raw)?)),
            None => Ok(None),
        }
    }

    pub async fn get(&self, id: &str) -> Result<Value, ContentError> {
        let response = self
            .client
            .get(format!("{}/workflows/{id}", self.base_url))
            .send()
            .await?;
        Self::parse(response).await
    }

    pub async fn create(&self, payload: &Value) -> Result<Value, ContentError> {
        let response = self
            .client
            .post(format!("{}/workflows", self.base_url))
            .json(payload)
            .send()
            .await?;
        Self::parse(response).await
    }

    pub async fn update(&self, id: &str, payload: &Value) -> Result<Value, ContentError> {
        let response = self
            .client
            .put(format!("{}/workflows/{id}", self.base_url))
            .json(payload)
            .send()
            .await?;
        Self::parse(response).await
    }

    pub async fn delete(&self, id: &str) -> Result<Value, ContentError> {
        let response = self
            .client
            .delete(format!("{}/workflows/{id}", self.base_url))
            .send()
            .await?;
        Self::parse(response).await
    }

    async fn parse(response: reqwest::Response) -> Result<Value, ContentError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ContentError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}
