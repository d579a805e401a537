use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{
        IntoResponse, Json, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use chrono::Utc;
use futures::Stream;
use serde::Deserialize;
use serde_json::json;
use std::{sync::Arc, time::Duration};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tower_http::cors::{Any, CorsLayer};

use domain::{ActionRequest, DomainError, GatewayEvent, ThingId};

use crate::state::{AppState, AuditEvent};

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/things", post(register_thing).get(list_things))
        .route("/things/{id}/updated", post(thing_updated))
        .route("/things/{id}/properties", get(thing_properties))
        .route("/things/{id}/actions/{action}", post(thing_action))
        .route("/event", post(post_event))
        .route("/analytics", get(get_analytics))
        .route("/events", get(sse_handler))
        .layer(cors)
        .with_state(state)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Registration and audit are the privileged surface: they require the
/// token the gateway published at startup.
fn require_system_token(state: &AppState, headers: &HeaderMap) -> Result<(), Response> {
    match bearer_token(headers) {
        Some(token) if token == state.system_token => Ok(()),
        Some(_) => Err((
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "System token required" })),
        )
            .into_response()),
        None => Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Missing token" })),
        )
            .into_response()),
    }
}

#[derive(Deserialize)]
struct RegisterRequest {
    name: String,
    kind: domain::ThingKind,
    endpoint: String,
}

async fn register_thing(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<RegisterRequest>,
) -> Response {
    if let Err(rejection) = require_system_token(&state, &headers) {
        return rejection;
    }

    let descriptor = state.registry.register(req.name, req.kind, req.endpoint);
    (StatusCode::CREATED, Json(descriptor)).into_response()
}

async fn list_things(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.registry.list())
}

#[derive(Deserialize)]
struct UpdateRequest {
    #[serde(default)]
    properties: serde_json::Map<String, serde_json::Value>,
}

async fn thing_updated(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateRequest>,
) -> Response {
    let thing_id = ThingId::from(id);
    match state.propagator.on_thing_update(&thing_id, &req.properties).await {
        Ok(()) => Json(json!({ "success": true })).into_response(),
        Err(e @ DomainError::UnknownThing(_)) => {
            (StatusCode::NOT_FOUND, Json(json!({ "error": e.to_string() }))).into_response()
        }
        Err(e) => (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response(),
    }
}

/// Proxies the property snapshot from the peer itself; the registry cache
/// is not consulted here, so the caller sees the authoritative values.
async fn thing_properties(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let thing_id = ThingId::from(id);
    let descriptor = match state.registry.lookup(&thing_id) {
        Ok(d) => d,
        Err(e) => {
            return (StatusCode::NOT_FOUND, Json(json!({ "error": e.to_string() }))).into_response();
        }
    };

    match state.peers.fetch_properties(&descriptor).await {
        Ok(properties) => Json(json!({
            "thingId": thing_id,
            "kind": descriptor.kind,
            "properties": properties,
        }))
        .into_response(),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": "Service unavailable", "details": e.to_string() })),
        )
            .into_response(),
    }
}

/// Dashboard-inbound action request, forwarded to the peer fire-and-forget.
async fn thing_action(
    State(state): State<Arc<AppState>>,
    Path((id, action)): Path<(String, String)>,
    Json(params): Json<serde_json::Value>,
) -> Response {
    let thing_id = ThingId::from(id);
    let descriptor = match state.registry.lookup(&thing_id) {
        Ok(d) => d,
        Err(e) => {
            return (StatusCode::NOT_FOUND, Json(json!({ "error": e.to_string() }))).into_response();
        }
    };

    let request = ActionRequest::new(action.clone(), params.clone());
    state.dispatcher.dispatch(&descriptor, &request).await;

    state.audit.record(AuditEvent {
        thing_id: thing_id.to_string(),
        thing_type: Some(descriptor.kind.to_string()),
        event_type: "action".to_string(),
        data: json!({ "action": action, "params": params }),
        at: Utc::now(),
    });

    Json(json!({ "status": "dispatched" })).into_response()
}

#[derive(Deserialize)]
struct EventRequest {
    #[serde(rename = "thingId")]
    thing_id: Option<String>,
    #[serde(rename = "thingType")]
    thing_type: Option<String>,
    #[serde(rename = "type")]
    event_type: Option<String>,
    #[serde(default)]
    data: serde_json::Value,
}

async fn post_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<EventRequest>,
) -> Response {
    if let Err(rejection) = require_system_token(&state, &headers) {
        return rejection;
    }

    let (Some(thing_id), Some(event_type)) = (req.thing_id, req.event_type) else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "Missing fields" }))).into_response();
    };

    state.audit.record(AuditEvent {
        thing_id,
        thing_type: req.thing_type,
        event_type,
        data: req.data,
        at: Utc::now(),
    });

    Json(json!({ "success": true })).into_response()
}

async fn get_analytics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.audit.snapshot())
}

/// Dashboard subscription channel: a `things:list` snapshot first, then the
/// live `thing:registered` / `thing:updated` broadcasts.
async fn sse_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let snapshot = GatewayEvent::ThingsList(state.registry.list());
    let first = tokio_stream::once(
        Event::default()
            .json_data(snapshot)
            .map_err(|_| axum::Error::new("Serialization error")),
    );

    let rx = state.registry.subscribe();
    let live = BroadcastStream::new(rx).map(|msg| match msg {
        Ok(event) => Event::default()
            .json_data(event)
            .map_err(|_| axum::Error::new("Serialization error")),
        Err(_) => Ok(Event::default().comment("keep-alive")),
    });

    Sse::new(first.chain(live))
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
