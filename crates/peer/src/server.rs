use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde_json::json;
use std::sync::Arc;

use domain::DomainError;

use crate::runtime::Thing;

pub fn create_router(thing: Arc<Thing>) -> Router {
    Router::new()
        .route("/properties", get(get_properties))
        .route("/actions/{name}", post(invoke_action))
        .with_state(thing)
}

async fn get_properties(State(thing): State<Arc<Thing>>) -> impl IntoResponse {
    Json(thing.properties_json())
}

async fn invoke_action(
    State(thing): State<Arc<Thing>>,
    Path(name): Path<String>,
    payload: Option<Json<serde_json::Value>>,
) -> Response {
    let params = payload.map(|Json(v)| v).unwrap_or(json!({}));

    match thing.execute_action(&name, &params).await {
        Ok(()) => Json(json!({ "success": true })).into_response(),
        Err(
            e @ (DomainError::UnsupportedAction { .. }
            | DomainError::UnknownProperty { .. }
            | DomainError::InvalidPayload(_)),
        ) => (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}
