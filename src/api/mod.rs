//! Demo-binary HTTP layer: axum routes wiring the federation engine to
//! ActivityPub endpoints over HTTP. This module is intentionally not part
//! of the published library — the engine itself has no HTTP dependency
//! (SPEC_FULL §1 non-goal) — it only exists inside the `apub-federator-demo`
//! binary crate.

mod activitypub;
pub mod metrics;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use apub_federator::error::EngineError;
use apub_federator::federation::{Federator, NoopCallbacks, SystemClock};
use apub_federator::memory_store::{MemoryStore, MemoryStoreError};
use apub_federator::metrics::ERRORS_TOTAL;
use apub_federator::support::PublicKeyCache;
use apub_federator::support::signature::SignatureError;

pub use activitypub::activitypub_router;
pub use metrics::metrics_router;

/// The concrete `Federator` instantiation the demo binary runs: every
/// collaborator slot filled by the same `Arc<MemoryStore>` (the blanket
/// `impl<T: Store> Store for Arc<T>` in the engine is what makes this
/// legal — one store, shared with [`DemoState`] for direct reads).
pub type DemoFederator = Federator<
    Arc<MemoryStore>,
    Arc<MemoryStore>,
    Arc<MemoryStore>,
    SystemClock,
    NoopCallbacks,
    NoopCallbacks,
>;

#[derive(Clone)]
pub struct DemoState {
    pub federator: Arc<DemoFederator>,
    pub store: Arc<MemoryStore>,
    pub key_cache: Arc<PublicKeyCache>,
}

/// Thin error wrapper turning engine/store/signature errors into HTTP
/// responses. The engine's own [`EngineError`] has no `IntoResponse` impl
/// by design (§1) — that conversion belongs to whoever puts it behind HTTP.
pub enum DemoError {
    Engine(EngineError),
    Store(MemoryStoreError),
    Signature(SignatureError),
    BadRequest(String),
}

impl From<EngineError> for DemoError {
    fn from(err: EngineError) -> Self {
        DemoError::Engine(err)
    }
}

impl From<MemoryStoreError> for DemoError {
    fn from(err: MemoryStoreError) -> Self {
        DemoError::Store(err)
    }
}

impl From<SignatureError> for DemoError {
    fn from(err: SignatureError) -> Self {
        DemoError::Signature(err)
    }
}

impl IntoResponse for DemoError {
    fn into_response(self) -> Response {
        let (kind, status, message): (&str, StatusCode, String) = match self {
            DemoError::Engine(err) => {
                let status = match err {
                    EngineError::ObjectRequired
                    | EngineError::TypeRequired
                    | EngineError::MalformedIri(_, _)
                    | EngineError::UnsupportedIriOnlyObject(_)
                    | EngineError::NotACollection => StatusCode::BAD_REQUEST,
                    EngineError::Forbidden | EngineError::Unauthorized => StatusCode::FORBIDDEN,
                    EngineError::NotFound(_) => StatusCode::NOT_FOUND,
                    EngineError::Disabled => StatusCode::METHOD_NOT_ALLOWED,
                    EngineError::Delivery { .. }
                    | EngineError::Store(_)
                    | EngineError::Config(_)
                    | EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                ("engine", status, err.to_string())
            }
            DemoError::Store(err) => ("store", StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            DemoError::Signature(err) => ("signature", StatusCode::UNAUTHORIZED, err.to_string()),
            DemoError::BadRequest(msg) => ("bad_request", StatusCode::BAD_REQUEST, msg),
        };

        ERRORS_TOTAL.with_label_values(&[kind]).inc();
        (status, message).into_response()
    }
}
