//! Reference `Store`/`FederateApp`/`SocialApp` implementation, in-memory
//! and `tokio::sync::RwLock`-guarded (§2 `[MODULE: memory_store]`).
//!
//! Grounded on the teacher's `federation::key_cache::PublicKeyCache`
//! shape — `Arc<RwLock<HashMap<...>>>` guarding a volatile map — widened
//! here to hold the full object graph instead of one TTL'd entry kind.
//! Not a production object store: nothing here is persisted to disk, and
//! actor registration is manual (`register_actor`) rather than derived
//! from any real account system.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use thiserror::Error;
use ulid::Ulid;

use crate::federation::{FederateApp, FollowResponse, SocialApp, Store};
use crate::model::{Activity, Collection, Iri, Node};

#[derive(Debug, Error)]
pub enum MemoryStoreError {
    #[error("actor already registered: {0}")]
    ActorExists(String),
}

/// One locally-hosted actor's mutable registration state. `inbox`/`outbox`
/// are kept separate from the generic object map since they're addressed
/// by owner, not by their own IRI, until first read.
struct ActorEntry {
    iri: Iri,
    inbox: Collection,
    outbox: Collection,
    post_outbox_authorized: bool,
}

/// Single-process reference implementation good enough to run the §8
/// scenarios and the demo binary. One `MemoryStore` per `Federator`.
pub struct MemoryStore {
    base: Iri,
    objects: RwLock<HashMap<String, Node>>,
    actors: RwLock<HashMap<String, ActorEntry>>,
    blocked_domains: RwLock<std::collections::HashSet<String>>,
}

impl MemoryStore {
    pub fn new(base: Iri) -> Self {
        MemoryStore {
            base,
            objects: RwLock::new(HashMap::new()),
            actors: RwLock::new(HashMap::new()),
            blocked_domains: RwLock::new(std::collections::HashSet::new()),
        }
    }

    /// Registers a locally-hosted actor under `path_actor` (e.g. `"alice"`
    /// resolves `/users/alice/inbox`), storing the actor's own `Node` and
    /// giving it empty inbox/outbox/following/followers/liked collections.
    pub fn register_actor(
        &self,
        path_actor: &str,
        mut actor_node: Node,
    ) -> Result<Iri, MemoryStoreError> {
        let iri = self.base.as_url().join(&format!("users/{path_actor}")).ok();
        let iri = iri
            .map(Iri::from)
            .unwrap_or_else(|| actor_node.id().cloned().expect("actor node or base must yield an iri"));
        actor_node.set_id(iri.clone());

        let mut actors = self.actors.write().unwrap();
        if actors.contains_key(path_actor) {
            return Err(MemoryStoreError::ActorExists(path_actor.to_string()));
        }
        actors.insert(
            path_actor.to_string(),
            ActorEntry {
                iri: iri.clone(),
                inbox: Collection::new(Some(self.child(&iri, "inbox")), true),
                outbox: Collection::new(Some(self.child(&iri, "outbox")), true),
                post_outbox_authorized: true,
            },
        );
        drop(actors);

        self.objects
            .write()
            .unwrap()
            .insert(iri.as_str().to_string(), actor_node);
        Ok(iri)
    }

    pub fn block_domain(&self, domain: impl Into<String>) {
        self.blocked_domains.write().unwrap().insert(domain.into());
    }

    /// Path segments of every locally-hosted actor (demo binary's shared
    /// inbox uses this to fan a single shared-inbox POST out to each
    /// actor it might be addressed to; `Store` itself has no enumeration
    /// method since an integrator backed by a real database would page
    /// this rather than load it all).
    pub fn local_actors(&self) -> Vec<String> {
        self.actors.read().unwrap().keys().cloned().collect()
    }

    fn child(&self, actor: &Iri, segment: &str) -> Iri {
        Iri::from(actor.as_url().join(segment).expect("valid child path"))
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Error = MemoryStoreError;

    async fn get_inbox(&self, actor: &Iri) -> Result<Collection, Self::Error> {
        let actors = self.actors.read().unwrap();
        Ok(actors
            .values()
            .find(|a| &a.iri == actor)
            .map(|a| a.inbox.clone())
            .unwrap_or_else(|| Collection::new(Some(self.child(actor, "inbox")), true)))
    }

    async fn get_outbox(&self, actor: &Iri) -> Result<Collection, Self::Error> {
        let actors = self.actors.read().unwrap();
        Ok(actors
            .values()
            .find(|a| &a.iri == actor)
            .map(|a| a.outbox.clone())
            .unwrap_or_else(|| Collection::new(Some(self.child(actor, "outbox")), true)))
    }

    async fn save_inbox(&self, actor: &Iri, inbox: Collection) -> Result<(), Self::Error> {
        let mut actors = self.actors.write().unwrap();
        if let Some(entry) = actors.values_mut().find(|a| &a.iri == actor) {
            entry.inbox = inbox;
        }
        Ok(())
    }

    async fn save_outbox(&self, actor: &Iri, outbox: Collection) -> Result<(), Self::Error> {
        let mut actors = self.actors.write().unwrap();
        if let Some(entry) = actors.values_mut().find(|a| &a.iri == actor) {
            entry.outbox = outbox;
        }
        Ok(())
    }

    async fn get(&self, id: &Iri) -> Result<Option<Node>, Self::Error> {
        Ok(self.objects.read().unwrap().get(id.as_str()).cloned())
    }

    async fn set(&self, id: &Iri, node: Node) -> Result<(), Self::Error> {
        self.objects
            .write()
            .unwrap()
            .insert(id.as_str().to_string(), node);
        Ok(())
    }

    async fn new_id(&self, _node: &Node) -> Result<Iri, Self::Error> {
        let id = self
            .base
            .as_url()
            .join(&format!("activities/{}", Ulid::new()))
            .expect("base joined with a ULID path segment is always a valid URL");
        Ok(Iri::from(id))
    }

    async fn post_outbox_authorized(&self, actor: &Iri) -> Result<bool, Self::Error> {
        Ok(self
            .actors
            .read()
            .unwrap()
            .values()
            .find(|a| &a.iri == actor)
            .map(|a| a.post_outbox_authorized)
            .unwrap_or(false))
    }

    async fn actor_iri(&self, path_actor: &str) -> Result<Option<Iri>, Self::Error> {
        Ok(self
            .actors
            .read()
            .unwrap()
            .get(path_actor)
            .map(|a| a.iri.clone()))
    }
}

#[async_trait]
impl FederateApp for MemoryStore {
    type Error = MemoryStoreError;

    async fn unblocked(&self, actor_iris: &[Iri]) -> Result<bool, Self::Error> {
        let blocked = self.blocked_domains.read().unwrap();
        Ok(actor_iris
            .iter()
            .filter_map(|iri| iri.domain())
            .all(|domain| !blocked.contains(domain)))
    }

    /// Accepts every inbound Follow. A real `FederateApp` would consult an
    /// approval queue or blocklist policy here.
    async fn on_follow(&self, _follow: &Activity) -> Result<FollowResponse, Self::Error> {
        Ok(FollowResponse::Accept)
    }

    async fn get_following(&self, actor: &Iri) -> Result<Collection, Self::Error> {
        Ok(self
            .get(&self.child(actor, "following"))
            .await?
            .and_then(|n| Collection::from_node(&n).ok())
            .unwrap_or_else(|| Collection::new(Some(self.child(actor, "following")), true)))
    }
}

#[async_trait]
impl SocialApp for MemoryStore {
    type Error = MemoryStoreError;

    /// An actor owns a target collection if its IRI is a child path of the
    /// actor's own IRI (`.../users/alice/<anything>`), matching the
    /// `register_actor` naming convention above.
    async fn owns(&self, actor: &Iri, object: &Iri) -> Result<bool, Self::Error> {
        Ok(object.as_str().starts_with(actor.as_str()))
    }

    async fn can_add(&self, actor: &Iri, _object: &Iri, target: &Iri) -> Result<bool, Self::Error> {
        self.owns(actor, target).await
    }

    async fn can_remove(
        &self,
        actor: &Iri,
        _object: &Iri,
        target: &Iri,
    ) -> Result<bool, Self::Error> {
        self.owns(actor, target).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> MemoryStore {
        MemoryStore::new(Iri::parse("https://origin.example/").unwrap())
    }

    #[tokio::test]
    async fn registers_actor_and_resolves_its_iri() {
        let store = store();
        let actor_node = Node::from_value(json!({"type": "Person", "name": "Alice"})).unwrap();
        let iri = store.register_actor("alice", actor_node).unwrap();

        assert_eq!(
            store.actor_iri("alice").await.unwrap().as_ref(),
            Some(&iri)
        );
        assert!(store.get(&iri).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn rejects_duplicate_registration() {
        let store = store();
        let node = || Node::from_value(json!({"type": "Person"})).unwrap();
        store.register_actor("alice", node()).unwrap();
        assert!(store.register_actor("alice", node()).is_err());
    }

    #[tokio::test]
    async fn inbox_prepend_round_trips_through_save_and_get() {
        let store = store();
        let iri = store
            .register_actor("alice", Node::from_value(json!({"type": "Person"})).unwrap())
            .unwrap();

        let mut inbox = store.get_inbox(&iri).await.unwrap();
        inbox.push_front(crate::model::Reference::Iri(
            Iri::parse("https://origin.example/activities/1").unwrap(),
        ));
        store.save_inbox(&iri, inbox).await.unwrap();

        let reloaded = store.get_inbox(&iri).await.unwrap();
        assert_eq!(reloaded.total_items, 1);
    }

    #[tokio::test]
    async fn unblocked_respects_blocked_domains() {
        let store = store();
        store.block_domain("evil.example");
        let blocked = vec![Iri::parse("https://evil.example/users/mallory").unwrap()];
        assert!(!store.unblocked(&blocked).await.unwrap());

        let allowed = vec![Iri::parse("https://good.example/users/bob").unwrap()];
        assert!(store.unblocked(&allowed).await.unwrap());
    }

    #[tokio::test]
    async fn owns_matches_child_paths_of_the_actors_own_iri() {
        let store = store();
        let alice = Iri::parse("https://origin.example/users/alice").unwrap();
        let alices_collection = Iri::parse("https://origin.example/users/alice/liked").unwrap();
        let bobs_collection = Iri::parse("https://origin.example/users/bob/liked").unwrap();

        assert!(store.owns(&alice, &alices_collection).await.unwrap());
        assert!(!store.owns(&alice, &bobs_collection).await.unwrap());
    }
}
