//! Verb Dispatch & Rules (§4.3, §4.4, §4.5): the two dispatch tables,
//! `client_side` (outbox side-effects) and `server_side` (inbox
//! side-effects), keyed by [`crate::model::ActivityKind`].

pub mod client_side;
pub mod server_side;

use crate::error::EngineError;

pub(crate) fn store_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> EngineError {
    EngineError::Store(anyhow::Error::new(e))
}
