//! Recipient Resolver (§4.6 steps 1-4): expands an outbound activity's
//! addressing fields into a deduplicated set of target inbox IRIs.

use std::collections::HashSet;

use futures::future::BoxFuture;

use crate::error::EngineError;
use crate::federation::traits::Store;
use crate::model::{Activity, Collection, Iri, Node, Reference, is_public};

/// Resolves `activity`'s `to`/`cc`/`bto`/`bcc`/`audience` into the
/// inbox IRIs it must be delivered to. Strips the public sentinel,
/// recurses through actors (preferring `sharedInbox`) and Collections up
/// to `max_depth` dereferences, breaks cycles with a visited-IRI set, and
/// excludes `origin_inbox` (the sending actor never delivers to itself).
pub async fn resolve_recipients<S: Store>(
    activity: &Activity,
    store: &S,
    max_depth: u32,
    origin_inbox: Option<&Iri>,
) -> Result<Vec<Iri>, EngineError> {
    let seeds: Vec<Reference> = activity
        .all_addressees()
        .into_iter()
        .filter(|r| !is_public(r))
        .collect();

    let mut visited = HashSet::new();
    let mut inboxes = HashSet::new();

    for seed in seeds {
        expand(seed, store, max_depth, &mut visited, &mut inboxes).await?;
    }

    if let Some(origin) = origin_inbox {
        inboxes.remove(origin);
    }

    Ok(inboxes.into_iter().collect())
}

fn expand<'a, S: Store>(
    reference: Reference,
    store: &'a S,
    depth_remaining: u32,
    visited: &'a mut HashSet<Iri>,
    inboxes: &'a mut HashSet<Iri>,
) -> BoxFuture<'a, Result<(), EngineError>> {
    Box::pin(async move {
        let Some(iri) = reference.iri() else {
            return Ok(());
        };
        if !visited.insert(iri.clone()) {
            return Ok(());
        }

        let node = match reference.as_node() {
            Some(n) => Some(n.clone()),
            None => store
                .get(&iri)
                .await
                .map_err(|e| EngineError::Store(anyhow::Error::new(e)))?,
        };
        let Some(node) = node else {
            return Ok(());
        };

        if let Some(inbox) = actor_inbox(&node) {
            inboxes.insert(inbox);
            return Ok(());
        }

        if is_collection_like(&node) {
            if depth_remaining == 0 {
                return Ok(());
            }
            let collection = Collection::from_node(&node)?;
            for member in collection.items {
                expand(member, store, depth_remaining - 1, visited, inboxes).await?;
            }
        }

        Ok(())
    })
}

fn is_collection_like(node: &Node) -> bool {
    ["Collection", "OrderedCollection", "CollectionPage", "OrderedCollectionPage"]
        .iter()
        .any(|k| node.has_kind(k))
}

/// An actor's preferred delivery endpoint: `endpoints.sharedInbox` when
/// present (collapsing deliveries to peers on the same instance), else
/// `inbox`. A node lacking both is not treated as an actor.
fn actor_inbox(node: &Node) -> Option<Iri> {
    let shared = node
        .get_raw("endpoints")
        .and_then(|v| v.get("sharedInbox"))
        .and_then(|v| v.as_str())
        .and_then(|s| Iri::parse(s).ok());
    if shared.is_some() {
        return shared;
    }
    node.get_raw("inbox")
        .and_then(|v| v.as_str())
        .and_then(|s| Iri::parse(s).ok())
}

/// Strips `bto`/`bcc` from the wire body before dispatch (§4.6 step 3).
pub fn strip_bcc(activity: &Activity) -> serde_json::Value {
    let mut value = activity.node().to_value();
    if let serde_json::Value::Object(ref mut map) = value {
        map.remove("bto");
        map.remove("bcc");
    }
    value
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::model::Node;

    struct FakeStore {
        objects: Mutex<HashMap<String, Node>>,
    }

    impl FakeStore {
        fn new(objects: Vec<Node>) -> Self {
            let map = objects
                .into_iter()
                .filter_map(|n| n.id().map(|id| (id.as_str().to_string(), n)))
                .collect();
            FakeStore {
                objects: Mutex::new(map),
            }
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("fake store error")]
    struct FakeStoreError;

    #[async_trait]
    impl Store for FakeStore {
        type Error = FakeStoreError;

        async fn get_inbox(&self, _actor: &Iri) -> Result<Collection, Self::Error> {
            unimplemented!()
        }
        async fn get_outbox(&self, _actor: &Iri) -> Result<Collection, Self::Error> {
            unimplemented!()
        }
        async fn save_inbox(&self, _actor: &Iri, _inbox: Collection) -> Result<(), Self::Error> {
            unimplemented!()
        }
        async fn save_outbox(&self, _actor: &Iri, _outbox: Collection) -> Result<(), Self::Error> {
            unimplemented!()
        }
        async fn get(&self, id: &Iri) -> Result<Option<Node>, Self::Error> {
            Ok(self.objects.lock().unwrap().get(id.as_str()).cloned())
        }
        async fn set(&self, id: &Iri, node: Node) -> Result<(), Self::Error> {
            self.objects
                .lock()
                .unwrap()
                .insert(id.as_str().to_string(), node);
            Ok(())
        }
        async fn new_id(&self, _node: &Node) -> Result<Iri, Self::Error> {
            unimplemented!()
        }
        async fn post_outbox_authorized(&self, _actor: &Iri) -> Result<bool, Self::Error> {
            unimplemented!()
        }
        async fn actor_iri(&self, _path_actor: &str) -> Result<Option<Iri>, Self::Error> {
            unimplemented!()
        }
    }

    fn iri(s: &str) -> Iri {
        Iri::parse(s).unwrap()
    }

    fn actor(id: &str, inbox: &str, shared: Option<&str>) -> Node {
        let mut node = Node::from_value(json!({
            "id": id,
            "type": "Person",
            "inbox": inbox,
        }))
        .unwrap();
        if let Some(shared) = shared {
            node.set_raw("endpoints", json!({"sharedInbox": shared}));
        }
        node
    }

    #[tokio::test]
    async fn expands_direct_actor_recipient_to_its_inbox() {
        let bob = actor(
            "https://example.com/users/bob",
            "https://example.com/users/bob/inbox",
            None,
        );
        let store = FakeStore::new(vec![bob]);
        let activity = Activity::from_node(
            Node::from_value(json!({
                "id": "https://origin.example/activities/1",
                "type": "Create",
                "actor": "https://origin.example/users/alice",
                "object": {"type": "Note", "id": "https://origin.example/notes/1"},
                "to": ["https://example.com/users/bob"],
            }))
            .unwrap(),
        );

        let recipients = resolve_recipients(&activity, &store, 4, None).await.unwrap();
        assert_eq!(recipients, vec![iri("https://example.com/users/bob/inbox")]);
    }

    #[tokio::test]
    async fn collapses_shared_inbox_and_deduplicates_across_followers() {
        let bob = actor(
            "https://example.com/users/bob",
            "https://example.com/users/bob/inbox",
            Some("https://example.com/inbox"),
        );
        let carol = actor(
            "https://example.com/users/carol",
            "https://example.com/users/carol/inbox",
            Some("https://example.com/inbox"),
        );
        let followers = Node::from_value(json!({
            "id": "https://origin.example/users/alice/followers",
            "type": "OrderedCollection",
            "orderedItems": ["https://example.com/users/bob", "https://example.com/users/carol"],
        }))
        .unwrap();
        let store = FakeStore::new(vec![bob, carol, followers]);
        let activity = Activity::from_node(
            Node::from_value(json!({
                "id": "https://origin.example/activities/1",
                "type": "Create",
                "actor": "https://origin.example/users/alice",
                "object": {"type": "Note", "id": "https://origin.example/notes/1"},
                "to": ["https://origin.example/users/alice/followers"],
            }))
            .unwrap(),
        );

        let recipients = resolve_recipients(&activity, &store, 4, None).await.unwrap();
        assert_eq!(recipients, vec![iri("https://example.com/inbox")]);
    }

    #[tokio::test]
    async fn excludes_origin_inbox_and_public_sentinel() {
        let store = FakeStore::new(vec![]);
        let activity = Activity::from_node(
            Node::from_value(json!({
                "id": "https://origin.example/activities/1",
                "type": "Create",
                "actor": "https://origin.example/users/alice",
                "object": {"type": "Note", "id": "https://origin.example/notes/1"},
                "to": ["https://www.w3.org/ns/activitystreams#Public", "https://origin.example/users/alice/inbox"],
            }))
            .unwrap(),
        );

        let recipients = resolve_recipients(
            &activity,
            &store,
            4,
            Some(&iri("https://origin.example/users/alice/inbox")),
        )
        .await
        .unwrap();

        assert!(recipients.is_empty());
    }

    #[test]
    fn strip_bcc_removes_blind_copy_fields() {
        let activity = Activity::from_node(
            Node::from_value(json!({
                "id": "https://origin.example/activities/1",
                "type": "Create",
                "to": ["https://example.com/users/bob"],
                "bcc": ["https://example.com/users/eve"],
                "bto": ["https://example.com/users/frank"],
            }))
            .unwrap(),
        );

        let wire = strip_bcc(&activity);
        assert!(wire.get("bcc").is_none());
        assert!(wire.get("bto").is_none());
        assert!(wire.get("to").is_some());
    }
}
