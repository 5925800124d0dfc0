//! apub-federator — core of an ActivityPub federation engine.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 demo binary (axum, src/main.rs)              │
//! │  - /users/:actor/inbox, /users/:actor/outbox routes          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    federation (this crate)                   │
//! │  - federator: inbox/outbox pipeline                          │
//! │  - verbs: per-verb client/server side effects                │
//! │  - recipients, delivery, token_bucket                        │
//! │  - traits: the Store/FederateApp/SocialApp/Clock contract     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │           integrator-supplied Store (memory_store here)      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `model`: the ActivityStreams typed view (`Node`, `Activity`, `Iri`, ...)
//! - `federation`: the engine itself — `federator`, `verbs`, `recipients`,
//!   `delivery`, `token_bucket`, `traits`
//! - `support`: ambient integration helpers (HTTP signing, key caching)
//!   kept out of the core engine's dependency graph
//! - `memory_store`: a reference, non-persistent `Store` implementation
//! - `config`: layered configuration loading
//! - `error`: the engine's error type
//! - `metrics`: the federation-scoped Prometheus registry

pub mod config;
pub mod error;
pub mod federation;
pub mod memory_store;
pub mod metrics;
pub mod model;
pub mod support;
