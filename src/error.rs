//! Error types for the federation engine.
//!
//! The core engine never depends on a web framework (§1), so unlike a
//! typical application `AppError` there is no `IntoResponse` impl here —
//! that conversion lives in the demo binary's own thin error wrapper.

use thiserror::Error;

/// Errors raised by the federation engine itself.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Activity is missing a required `object` (§7: Create/Update/Delete/...).
    #[error("object is required")]
    ObjectRequired,

    /// Activity is missing a required `type`, or a payload that must be an
    /// object (e.g. the body passed to wrapInCreate) is not one.
    #[error("type is required")]
    TypeRequired,

    /// Payload failed to parse as an IRI.
    #[error("malformed IRI {0:?}: {1}")]
    MalformedIri(String, String),

    /// Create/Update referenced an object by IRI only; the engine does not
    /// dereference it (§5, §9 Open Question resolution).
    #[error("object {0} was given as an IRI only, dereferencing is not supported")]
    UnsupportedIriOnlyObject(String),

    /// `Add`/`Remove` target collection is not one this actor may modify.
    #[error("actor is not authorized to modify target collection")]
    Forbidden,

    /// Activity referenced a target collection that is not a Collection/OrderedCollection.
    #[error("target is not a collection")]
    NotACollection,

    /// A referenced object does not exist in the store.
    #[error("object not found: {0}")]
    NotFound(String),

    /// Client posted activity lacking authorization (§6 `post_outbox_authorized`).
    #[error("client is not authorized to post to this outbox")]
    Unauthorized,

    /// The relevant API (Social or Federated Protocol) is turned off in
    /// configuration (§4.1, §4.2: "HTTP 405 if disabled").
    #[error("this API is disabled by configuration")]
    Disabled,

    /// Delivery pool rejected a task after exhausting retries. Never
    /// surfaces synchronously — it is pushed to the `errors()` channel
    /// (§7 policy); this variant exists so that channel can carry a typed
    /// error rather than a bare string.
    #[error("delivery to {inbox} failed: {source}")]
    Delivery {
        inbox: String,
        #[source]
        source: anyhow::Error,
    },

    /// Error from the integrator-supplied `Store`/`FederateApp`/`SocialApp`.
    #[error("store error: {0}")]
    Store(#[source] anyhow::Error),

    /// Error loading configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Catch-all for unexpected failures.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
