//! Route tree for the workflows service.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::workflows;
use crate::state::AppState;
use crate::ws;

/// The `/workflows/api` surface: CRUD passthrough, execution, engine
/// file proxying and run history.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(workflows::find))
        .route("/{id}", get(workflows::get_one))
        .route("/view", get(workflows::view))
        .route("/create", post(workflows::create))
        .route("/update/{id}", post(workflows::update))
        .route("/delete/{id}", get(workflows::delete))
        .route("/queue", post(workflows::queue))
        .route("/cancel", post(workflows::cancel))
        .route("/upload/image", post(workflows::upload_image))
        .route("/history", get(workflows::history))
}

/// Full application router minus middleware.
pub fn app_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(workflows::health))
        .nest("/workflows/api", api_routes())
        .route("/workflows/ws", get(ws::ws_handler))
}
