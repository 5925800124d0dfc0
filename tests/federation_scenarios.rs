//! Integration tests exercising the federator end to end against
//! `MemoryStore`, one test per literal scenario plus the quantified
//! invariants not already covered at the unit level (recipient dedup,
//! sharedInbox collapse, bto/bcc stripping and the public-sentinel
//! exclusion all have dedicated coverage in
//! `federation::recipients::tests`).

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use apub_federator::federation::{
    DeliveryConfig, FederateApp, FederatorBuilder, NoopCallbacks, NoopSigner, Store, SystemClock,
};
use apub_federator::memory_store::MemoryStore;
use apub_federator::model::{Iri, Node};

fn person_node(name: &str) -> Node {
    Node::from_value(json!({"type": "Person", "name": name})).unwrap()
}

/// A remote actor as it would be cached after first dereference: just
/// enough shape for recipient resolution to find an inbox.
fn remote_actor_node(iri: &Iri, inbox: &Iri) -> Node {
    Node::from_value(json!({
        "id": iri.as_str(),
        "type": "Person",
        "inbox": inbox.as_str(),
    }))
    .unwrap()
}

fn build_federator(
    store: Arc<MemoryStore>,
) -> apub_federator::federation::Federator<
    Arc<MemoryStore>,
    Arc<MemoryStore>,
    Arc<MemoryStore>,
    SystemClock,
    NoopCallbacks,
    NoopCallbacks,
> {
    FederatorBuilder::new()
        .delivery_config(DeliveryConfig {
            worker_count: 1,
            max_attempts: 1,
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            ..Default::default()
        })
        .build(
            store.clone(),
            store.clone(),
            store,
            SystemClock,
            NoopCallbacks,
            NoopCallbacks,
            Arc::new(NoopSigner),
        )
        .unwrap()
}

fn array_contains_str(value: &Value, needle: &str) -> bool {
    value
        .as_array()
        .map(|items| items.iter().any(|v| v.as_str() == Some(needle)))
        .unwrap_or(false)
}

/// S1 — a bare object POSTed to the outbox is wrapped in a synthesized
/// Create, persisted with its addressing intact, and handed to delivery.
/// Covers invariants 1 (Location round-trip) and 3 (Create/attributedTo
/// symmetry).
#[tokio::test]
async fn bare_note_is_wrapped_in_create_and_delivered() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/inbox"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new(Iri::parse("https://local.example/").unwrap()));
    let alice = store.register_actor("a", person_node("Alice")).unwrap();

    let bob_inbox = Iri::parse(&format!("{}/inbox", server.uri())).unwrap();
    let bob = Iri::parse("https://remote.example/u/bob").unwrap();
    store.set(&bob, remote_actor_node(&bob, &bob_inbox)).await.unwrap();

    let federator = build_federator(store.clone());
    let new_id = federator
        .handle_outbound_post(
            "a",
            json!({"type": "Note", "content": "hi", "to": [bob.as_str()]}),
        )
        .await
        .unwrap();

    // Location round-trip (invariant 1): fetching the minted IRI yields
    // the wrapped, fully-addressed Create.
    let stored = store.get(&new_id).await.unwrap().unwrap();
    assert!(stored.has_kind("Create"));
    assert!(array_contains_str(stored.get_raw("actor").unwrap(), alice.as_str()));
    assert!(array_contains_str(stored.get_raw("to").unwrap(), bob.as_str()));

    let object = &stored.get_raw("object").unwrap().as_array().unwrap()[0];
    assert_eq!(object["type"], "Note");

    // Create/attributedTo symmetry (invariant 3).
    assert!(array_contains_str(&object["attributedTo"], alice.as_str()));

    tokio::time::timeout(Duration::from_secs(2), federator.errors())
        .await
        .expect_err("delivery to a 202-responding inbox should not surface a terminal error");
    federator.stop().await;
}

/// S2 — deleting a stored object replaces it at the same IRI with a
/// Tombstone carrying its former type (invariant 2).
#[tokio::test]
async fn delete_replaces_object_with_tombstone() {
    let store = Arc::new(MemoryStore::new(Iri::parse("https://local.example/").unwrap()));
    let alice = store.register_actor("a", person_node("Alice")).unwrap();

    let note_id = Iri::parse("https://local.example/n/1").unwrap();
    store
        .set(
            &note_id,
            Node::from_value(json!({"id": note_id.as_str(), "type": "Note", "content": "bye"})).unwrap(),
        )
        .await
        .unwrap();

    let federator = build_federator(store.clone());
    federator
        .handle_outbound_post(
            "a",
            json!({"type": "Delete", "actor": alice.as_str(), "object": note_id.as_str()}),
        )
        .await
        .unwrap();

    let tombstone = store.get(&note_id).await.unwrap().unwrap();
    assert!(tombstone.has_kind("Tombstone"));
    assert_eq!(tombstone.get_raw("formerType"), Some(&json!("Note")));
    assert!(tombstone.get_raw("deleted").is_some());

    federator.stop().await;
}

/// S3 — an inbound Follow is auto-accepted and the Accept is delivered
/// back to the follower.
#[tokio::test]
async fn inbound_follow_auto_accepts_and_delivers_accept() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/inbox"))
        .and(body_partial_json(json!({"type": "Accept"})))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new(Iri::parse("https://local.example/").unwrap()));
    let alice = store.register_actor("a", person_node("Alice")).unwrap();

    let bob_inbox = Iri::parse(&format!("{}/inbox", server.uri())).unwrap();
    let bob = Iri::parse("https://remote.example/u/x").unwrap();
    store.set(&bob, remote_actor_node(&bob, &bob_inbox)).await.unwrap();

    let federator = build_federator(store.clone());
    federator
        .handle_inbound_post("a", json!({"type": "Follow", "actor": bob.as_str(), "object": alice.as_str()}))
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(2), federator.errors())
        .await
        .expect_err("the synthesized Accept should deliver without a terminal error");
    federator.stop().await;
}

/// S4 — an inbound Accept of a Follow appends the accepting actor to
/// the follower's `following` collection.
#[tokio::test]
async fn inbound_accept_appends_to_following() {
    let store = Arc::new(MemoryStore::new(Iri::parse("https://local.example/").unwrap()));
    let alice = store.register_actor("a", person_node("Alice")).unwrap();
    let bob = Iri::parse("https://remote.example/u/x").unwrap();

    let federator = build_federator(store.clone());
    federator
        .handle_inbound_post(
            "a",
            json!({
                "type": "Accept",
                "actor": bob.as_str(),
                "object": {
                    "type": "Follow",
                    "actor": alice.as_str(),
                    "object": bob.as_str(),
                },
            }),
        )
        .await
        .unwrap();

    let following = store.get_following(&alice).await.unwrap();
    assert!(following.contains_id(&bob));

    federator.stop().await;
}

/// S5 — Block is dispatched locally but never handed to the delivery
/// pool. `expect(0)` is verified when `server` drops at the end of the
/// test.
#[tokio::test]
async fn block_is_not_federated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/inbox"))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new(Iri::parse("https://local.example/").unwrap()));
    let alice = store.register_actor("a", person_node("Alice")).unwrap();

    let target_inbox = Iri::parse(&format!("{}/inbox", server.uri())).unwrap();
    let target = Iri::parse("https://remote.example/u/mallory").unwrap();
    store.set(&target, remote_actor_node(&target, &target_inbox)).await.unwrap();

    let federator = build_federator(store.clone());
    let new_id = federator
        .handle_outbound_post(
            "a",
            json!({"type": "Block", "actor": alice.as_str(), "object": target.as_str(), "to": [target.as_str()]}),
        )
        .await
        .unwrap();

    assert!(store.get(&new_id).await.unwrap().is_some());
    tokio::time::sleep(Duration::from_millis(200)).await;
    federator.stop().await;
}

/// S6 — the same activity id delivered to the same inbox twice is
/// returned only once on GET (invariant 7).
#[tokio::test]
async fn inbox_get_deduplicates_by_id() {
    let store = Arc::new(MemoryStore::new(Iri::parse("https://local.example/").unwrap()));
    store.register_actor("a", person_node("Alice")).unwrap();

    let remote_actor = Iri::parse("https://remote.example/u/x").unwrap();
    let remote_inbox = Iri::parse("https://remote.example/inbox").unwrap();
    store
        .set(&remote_actor, remote_actor_node(&remote_actor, &remote_inbox))
        .await
        .unwrap();

    let federator = build_federator(store.clone());
    let activity = || {
        json!({
            "id": "https://remote.example/activities/7",
            "type": "Create",
            "actor": remote_actor.as_str(),
            "object": {"id": "https://remote.example/notes/7", "type": "Note"},
        })
    };
    federator.handle_inbound_post("a", activity()).await.unwrap();
    federator.handle_inbound_post("a", activity()).await.unwrap();

    let inbox = federator.get_inbox("a").await.unwrap();
    assert_eq!(inbox.total_items, 1);

    federator.stop().await;
}
