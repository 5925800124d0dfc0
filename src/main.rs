//! apub-federator-demo: a minimal single-tenant ActivityPub server built
//! on top of the `apub_federator` engine, backed by `MemoryStore`.

mod api;

use std::sync::Arc;

use apub_federator::config::AppConfig;
use apub_federator::federation::{FederatorBuilder, NoopCallbacks, SystemClock};
use apub_federator::memory_store::MemoryStore;
use apub_federator::model::{Iri, Node};
use apub_federator::support::{PublicKeyCache, RsaSigner};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use api::DemoState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config.logging.format);

    tracing::info!("Starting apub-federator-demo...");
    apub_federator::metrics::init_metrics();

    let base = Iri::parse(&config.instance.base_url())?;
    let store = Arc::new(MemoryStore::new(base));
    let alice = seed_demo_actor(&store)?;

    let signer: Arc<dyn apub_federator::federation::Signer> = Arc::new(RsaSigner::new(
        format!("{}#main-key", alice),
        demo_private_key_pem(),
    ));

    let federator = FederatorBuilder::new()
        .enable_client(config.federation.enable_client)
        .enable_server(config.federation.enable_server)
        .max_delivery_depth(config.federation.max_delivery_depth)
        .delivery_config(config.federation.to_delivery_config())
        .build(
            store.clone(),
            store.clone(),
            store.clone(),
            SystemClock,
            NoopCallbacks,
            NoopCallbacks,
            signer,
        )?;

    let state = DemoState {
        federator: Arc::new(federator),
        store: store.clone(),
        key_cache: Arc::new(PublicKeyCache::new(Arc::new(reqwest::Client::new()), None)),
    };

    let app = build_router(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, public_url = %config.instance.base_url(), "listening");

    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: DemoState) -> axum::Router {
    use tower_http::trace::TraceLayer;

    axum::Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(api::activitypub_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .merge(api::metrics_router())
}

async fn health_check() -> &'static str {
    "OK"
}

fn init_tracing(format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "apub_federator=info,apub_federator_demo=info,tower_http=debug".into()
    });

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

/// Registers one demo actor ("alice") so the federator has something to
/// receive/send against out of the box, and returns its minted IRI.
fn seed_demo_actor(store: &MemoryStore) -> Result<Iri, Box<dyn std::error::Error>> {
    let node = Node::from_value(serde_json::json!({
        "type": "Person",
        "preferredUsername": "alice",
        "name": "Alice",
    }))?;
    Ok(store.register_actor("alice", node)?)
}

/// Placeholder RSA private key for demo signing. A real deployment loads
/// this from its own secret store; the engine never generates or manages
/// key material (§1 non-goal).
fn demo_private_key_pem() -> String {
    std::env::var("APUB_FEDERATOR_DEMO_PRIVATE_KEY").unwrap_or_default()
}
