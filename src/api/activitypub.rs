//! ActivityPub HTTP endpoints for the demo binary.
//!
//! - GET /users/:actor - Actor profile
//! - POST /users/:actor/inbox - Personal inbox
//! - POST /inbox - Shared inbox
//! - GET/POST /users/:actor/outbox - Outbox
//! - GET /users/:actor/followers - Followers collection
//! - GET /users/:actor/following - Following collection

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

use apub_federator::error::EngineError;
use apub_federator::federation::Store;
use apub_federator::metrics::{FEDERATION_REQUEST_DURATION_SECONDS, FEDERATION_REQUESTS_TOTAL};
use apub_federator::model::{Collection, Iri};

use crate::api::{DemoError, DemoState};

pub fn activitypub_router() -> Router<DemoState> {
    Router::new()
        .route("/users/:actor", get(actor))
        .route("/users/:actor/inbox", post(inbox))
        .route("/inbox", post(shared_inbox))
        .route("/users/:actor/outbox", get(get_outbox).post(post_outbox))
        .route("/users/:actor/followers", get(followers))
        .route("/users/:actor/following", get(following))
}

/// GET /users/:actor — builds the Actor document from the stored `Node`
/// plus the well-known child endpoints `register_actor` lays out
/// (`inbox`, `outbox`, `followers`, `following`).
async fn actor(
    State(state): State<DemoState>,
    Path(actor): Path<String>,
) -> Result<Json<serde_json::Value>, DemoError> {
    let iri = state
        .store
        .actor_iri(&actor)
        .await?
        .ok_or_else(|| EngineError::NotFound(actor.clone()))?;
    let node = state
        .store
        .get(&iri)
        .await?
        .ok_or_else(|| EngineError::NotFound(actor.clone()))?;

    let mut value = node.to_value();
    if let serde_json::Value::Object(ref mut map) = value {
        map.entry("inbox").or_insert_with(|| child_url(&iri, "inbox"));
        map.entry("outbox").or_insert_with(|| child_url(&iri, "outbox"));
        map.entry("followers").or_insert_with(|| child_url(&iri, "followers"));
        map.entry("following").or_insert_with(|| child_url(&iri, "following"));
    }
    Ok(Json(value))
}

fn child_url(actor: &Iri, segment: &str) -> serde_json::Value {
    serde_json::json!(
        actor
            .as_url()
            .join(segment)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| actor.to_string())
    )
}

/// POST /users/:actor/inbox — verifies the HTTP Signature, then delegates
/// to the engine's inbound pipeline.
async fn inbox(
    State(state): State<DemoState>,
    Path(actor): Path<String>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<StatusCode, Response> {
    let path = format!("/users/{}/inbox", actor);
    handle_inbound(&state, &actor, &path, headers, body).await
}

/// POST /inbox — the shared inbox: one delivery target for every local
/// actor, addressed via the activity's own recipient fields rather than
/// the URL path. The demo fans the single POST out to every locally
/// registered actor rather than filtering by addressing, since
/// `handle_inbound_post` itself doesn't check whether `path_actor` was
/// actually addressed.
async fn shared_inbox(
    State(state): State<DemoState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<StatusCode, Response> {
    let actors = state.store.local_actors();
    if actors.is_empty() {
        return Err(DemoError::Engine(EngineError::NotFound(
            "no actor registered for the shared inbox".to_string(),
        ))
        .into_response());
    }
    for actor in actors {
        handle_inbound(&state, &actor, "/inbox", headers.clone(), body.clone()).await?;
    }
    Ok(StatusCode::ACCEPTED)
}

async fn handle_inbound(
    state: &DemoState,
    path_actor: &str,
    path: &str,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<StatusCode, Response> {
    let timer = FEDERATION_REQUEST_DURATION_SECONDS
        .with_label_values(&["inbound"])
        .start_timer();

    let result = verify_and_dispatch_inbound(state, path_actor, path, &headers, &body).await;
    timer.observe_duration();

    match result {
        Ok(()) => {
            FEDERATION_REQUESTS_TOTAL
                .with_label_values(&["inbound", "success"])
                .inc();
            Ok(StatusCode::ACCEPTED)
        }
        Err(err) => {
            FEDERATION_REQUESTS_TOTAL
                .with_label_values(&["inbound", "error"])
                .inc();
            Err(err.into_response())
        }
    }
}

async fn verify_and_dispatch_inbound(
    state: &DemoState,
    path_actor: &str,
    path: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(), DemoError> {
    let signature_header = headers
        .get("signature")
        .ok_or(EngineError::Unauthorized)?
        .to_str()
        .map_err(|_| EngineError::Unauthorized)?;
    let parsed = apub_federator::support::signature::parse_signature_header(signature_header)?;
    let public_key_pem = state.key_cache.get(&parsed.key_id).await?;
    apub_federator::support::signature::verify_signature(
        "POST",
        path,
        headers,
        Some(body),
        &public_key_pem,
    )?;

    let activity: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| DemoError::BadRequest(e.to_string()))?;
    state
        .federator
        .handle_inbound_post(path_actor, activity)
        .await?;
    Ok(())
}

/// GET /users/:actor/outbox
async fn get_outbox(
    State(state): State<DemoState>,
    Path(actor): Path<String>,
) -> Result<Json<serde_json::Value>, DemoError> {
    let collection = state.federator.get_outbox(&actor).await?;
    Ok(Json(collection.to_node().to_value()))
}

/// POST /users/:actor/outbox — client-to-server publish.
async fn post_outbox(
    State(state): State<DemoState>,
    Path(actor): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<Response, DemoError> {
    let timer = FEDERATION_REQUEST_DURATION_SECONDS
        .with_label_values(&["outbound"])
        .start_timer();
    let result = state.federator.handle_outbound_post(&actor, body).await;
    timer.observe_duration();

    match result {
        Ok(new_id) => {
            FEDERATION_REQUESTS_TOTAL
                .with_label_values(&["outbound", "success"])
                .inc();
            Ok((
                StatusCode::CREATED,
                [(axum::http::header::LOCATION, new_id.to_string())],
            )
                .into_response())
        }
        Err(err) => {
            FEDERATION_REQUESTS_TOTAL
                .with_label_values(&["outbound", "error"])
                .inc();
            Err(err.into())
        }
    }
}

/// GET /users/:actor/followers — the demo `MemoryStore` tracks follower
/// membership the same way it tracks `following` (a child collection), but
/// `Store`/`FederateApp` expose no dedicated accessor for it, so this
/// reads the child object directly off the generic store.
async fn followers(
    State(state): State<DemoState>,
    Path(actor): Path<String>,
) -> Result<Json<serde_json::Value>, DemoError> {
    read_child_collection(&state, &actor, "followers").await
}

/// GET /users/:actor/following
async fn following(
    State(state): State<DemoState>,
    Path(actor): Path<String>,
) -> Result<Json<serde_json::Value>, DemoError> {
    read_child_collection(&state, &actor, "following").await
}

async fn read_child_collection(
    state: &DemoState,
    actor: &str,
    segment: &str,
) -> Result<Json<serde_json::Value>, DemoError> {
    let owner = state
        .store
        .actor_iri(actor)
        .await?
        .ok_or_else(|| EngineError::NotFound(actor.to_string()))?;
    let child = owner
        .as_url()
        .join(segment)
        .map(Iri::from)
        .map_err(|e| EngineError::MalformedIri(segment.to_string(), e.to_string()))?;

    let collection = state
        .store
        .get(&child)
        .await?
        .and_then(|n| Collection::from_node(&n).ok())
        .unwrap_or_else(|| Collection::new(Some(child), true));
    Ok(Json(collection.to_node().to_value()))
}
