//! Handlers for the `/workflows/api` routes.
//!
//! CRUD operations pass through to the content API; `queue` and
//! `cancel` drive the execution orchestrator; `view` and
//! `upload/image` proxy the engine's file endpoints.

use axum::body::Body;
use axum::extract::{Multipart, Path, Query, RawQuery, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use flowdeck_workflows::RunRequest;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

fn envelope(data: impl serde::Serialize) -> Json<Value> {
    Json(json!({ "data": data }))
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())
}

/// `GET /workflows/api` - list workflows filtered by query parameters.
pub async fn find(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> AppResult<Json<Value>> {
    let query: Vec<(&str, &str)> = params
        .iter()
        .map(|(name, value)| (name.as_str(), value.as_str()))
        .collect();
    Ok(Json(state.runner.content().find(&query).await?))
}

/// `GET /workflows/api/{id}`
pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    if !is_valid_id(&id) {
        return Err(AppError::BadRequest("id should be integer".into()));
    }
    Ok(Json(state.runner.content().get(&id).await?))
}

/// `POST /workflows/api/create`
pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> AppResult<Json<Value>> {
    Ok(Json(state.runner.content().create(&payload).await?))
}

/// `POST /workflows/api/update/{id}`
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<Value>,
) -> AppResult<Json<Value>> {
    if !is_valid_id(&id) {
        return Err(AppError::BadRequest("id should be integer".into()));
    }
    Ok(Json(state.runner.content().update(&id, &payload).await?))
}

/// `GET /workflows/api/delete/{id}`
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    if !is_valid_id(&id) {
        return Err(AppError::BadRequest("id should be integer".into()));
    }
    Ok(Json(state.runner.content().delete(&id).await?))
}

/// `POST /workflows/api/queue` - execute a workflow run.
///
/// Holds the request open for the full run; progress streams to the
/// caller's relay subscription in the meantime.
pub async fn queue(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> AppResult<Json<Value>> {
    let outputs = state.runner.queue(request).await?;
    Ok(envelope(outputs))
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    #[serde(rename = "promptId")]
    prompt_id: String,
}

/// `POST /workflows/api/cancel` - interrupt or dequeue a submitted run.
pub async fn cancel(
    State(state): State<AppState>,
    Json(request): Json<CancelRequest>,
) -> AppResult<Json<Value>> {
    state.runner.cancel(&request.prompt_id).await?;
    Ok(envelope(Value::Null))
}

/// `GET /workflows/api/view?filename=...&type=output` - stream an
/// output file from the engine.
pub async fn view(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> AppResult<Response> {
    let query = query.ok_or_else(|| AppError::BadRequest("missing query string".into()))?;
    let upstream = state.runner.engine_api(None).view(&query).await?;

    let mut response = Response::builder();
    if let Some(content_type) = upstream.headers().get(CONTENT_TYPE) {
        response = response.header(CONTENT_TYPE, content_type);
    }
    let body = Body::from_stream(upstream.bytes_stream());
    response
        .body(body)
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

/// `POST /workflows/api/upload/image` - stage an input image on the
/// engine.
pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<Value>> {
    let mut image: Option<(Vec<u8>, String)> = None;
    let mut overwrite = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        match field.name() {
            Some("image") => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| AppError::BadRequest("image field needs a filename".into()))?;
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                image = Some((bytes.to_vec(), filename));
            }
            Some("overwrite") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                overwrite = text == "true" || text == "1";
            }
            _ => {}
        }
    }

    let (bytes, filename) =
        image.ok_or_else(|| AppError::BadRequest("missing image field".into()))?;
    let uploaded = state
        .runner
        .engine_api(None)
        .upload_image(bytes, &filename, overwrite)
        .await?;

    let url = format!(
        "/workflows/api/view?filename={}&type={}&subfolder={}",
        uploaded.name, uploaded.folder_type, uploaded.subfolder
    );
    Ok(envelope(json!({
        "name": uploaded.name,
        "subfolder": uploaded.subfolder,
        "type": uploaded.folder_type,
        "url": url,
    })))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(rename = "clientId")]
    client_id: String,
    key: String,
}

/// `GET /workflows/api/history?clientId=...&key=...` - last cached run
/// for a client and workflow.
pub async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<Value>> {
    match state.runner.history().get(&query.client_id, &query.key) {
        Some(entry) => Ok(envelope(entry)),
        None => Ok(envelope(Value::Null)),
    }
}

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_ids_are_valid() {
        assert!(is_valid_id("42"));
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("4x2"));
        assert!(!is_valid_id("-1"));
    }
}
