//! The Application-facing contract (§6): the four collaborator traits an
//! integrator implements to plug persistence, authorization and follow
//! policy into the engine, plus the per-verb callback traits used to
//! observe side effects.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{Activity, Collection, Iri, Node};

/// Persistence and addressing the engine treats as an external
/// collaborator (§1, §6). Named `Store` here rather than spec.md's
/// `Application` prose name to match the Rust convention of naming a
/// trait after the capability it exposes, not the role that implements it.
#[async_trait]
pub trait Store: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch `actor`'s inbox collection (unpaginated view; §4.7 read handlers
    /// are responsible for slicing it into pages).
    async fn get_inbox(&self, actor: &Iri) -> Result<Collection, Self::Error>;

    /// Fetch `actor`'s outbox collection.
    async fn get_outbox(&self, actor: &Iri) -> Result<Collection, Self::Error>;

    /// Persist the updated inbox collection after a prepend (§4.1 step 6).
    async fn save_inbox(&self, actor: &Iri, inbox: Collection) -> Result<(), Self::Error>;

    /// Persist the updated outbox collection after a prepend (§4.2 step 8).
    async fn save_outbox(&self, actor: &Iri, outbox: Collection) -> Result<(), Self::Error>;

    /// Look up any stored object (actor, activity, or plain object) by IRI.
    async fn get(&self, id: &Iri) -> Result<Option<Node>, Self::Error>;

    /// Create or overwrite a stored object.
    async fn set(&self, id: &Iri, node: Node) -> Result<(), Self::Error>;

    /// Mint a new IRI for an object the engine is about to persist (e.g. an
    /// activity id assigned during outbox posting, §4.2 step 2).
    async fn new_id(&self, node: &Node) -> Result<Iri, Self::Error>;

    /// Whether `actor` is authorized to post to its own outbox (§6).
    /// Distinct from [`SocialApp::owns`], which governs object ownership.
    async fn post_outbox_authorized(&self, actor: &Iri) -> Result<bool, Self::Error>;

    /// Resolve the local actor IRI addressed by an inbound request path
    /// segment (e.g. turn `"alice"` from `/users/alice/inbox` into its IRI).
    async fn actor_iri(&self, path_actor: &str) -> Result<Option<Iri>, Self::Error>;
}

/// The tri-state response to an inbound `Follow` (§4.5 handle_follow):
/// accept it (send `Accept`, add to `following`), reject it (send
/// `Reject`), or take no automatic action (the integrator handles it out
/// of band — e.g. manual approval queues).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowResponse {
    Accept,
    Reject,
    DoNothing,
}

/// Server-side federation policy: blocklisting and follow handling (§4.5,
/// §6). Split from [`Store`] because an integrator's persistence layer and
/// its federation policy are frequently different concerns.
#[async_trait]
pub trait FederateApp: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Whether none of `actor_iris` (and their hosting domains) are blocked.
    async fn unblocked(&self, actor_iris: &[Iri]) -> Result<bool, Self::Error>;

    /// Decide how to respond to an inbound `Follow` activity.
    async fn on_follow(&self, follow: &Activity) -> Result<FollowResponse, Self::Error>;

    /// The local actor's `following` collection (read back after Accept).
    async fn get_following(&self, actor: &Iri) -> Result<Collection, Self::Error>;
}

/// Client-side (Social API) authorization predicates (§4.4, §6).
#[async_trait]
pub trait SocialApp: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Whether `actor` owns `object` (required for Update/Delete).
    async fn owns(&self, actor: &Iri, object: &Iri) -> Result<bool, Self::Error>;

    /// Whether `actor` may add `object` to `target` (Add rule, §4.4).
    async fn can_add(&self, actor: &Iri, object: &Iri, target: &Iri) -> Result<bool, Self::Error>;

    /// Whether `actor` may remove `object` from `target` (Remove rule, §4.4).
    async fn can_remove(&self, actor: &Iri, object: &Iri, target: &Iri)
    -> Result<bool, Self::Error>;
}

// Delegating impls so an `Arc<T>` can stand in for `T` wherever a
// collaborator trait is required — lets a demo binary share one
// `MemoryStore` between the `Federator` (which owns its collaborators by
// value) and its own direct read handlers (actor profile GET, etc.).
#[async_trait]
impl<T: Store + ?Sized> Store for Arc<T> {
    type Error = T::Error;

    async fn get_inbox(&self, actor: &Iri) -> Result<Collection, Self::Error> {
        self.as_ref().get_inbox(actor).await
    }
    async fn get_outbox(&self, actor: &Iri) -> Result<Collection, Self::Error> {
        self.as_ref().get_outbox(actor).await
    }
    async fn save_inbox(&self, actor: &Iri, inbox: Collection) -> Result<(), Self::Error> {
        self.as_ref().save_inbox(actor, inbox).await
    }
    async fn save_outbox(&self, actor: &Iri, outbox: Collection) -> Result<(), Self::Error> {
        self.as_ref().save_outbox(actor, outbox).await
    }
    async fn get(&self, id: &Iri) -> Result<Option<Node>, Self::Error> {
        self.as_ref().get(id).await
    }
    async fn set(&self, id: &Iri, node: Node) -> Result<(), Self::Error> {
        self.as_ref().set(id, node).await
    }
    async fn new_id(&self, node: &Node) -> Result<Iri, Self::Error> {
        self.as_ref().new_id(node).await
    }
    async fn post_outbox_authorized(&self, actor: &Iri) -> Result<bool, Self::Error> {
        self.as_ref().post_outbox_authorized(actor).await
    }
    async fn actor_iri(&self, path_actor: &str) -> Result<Option<Iri>, Self::Error> {
        self.as_ref().actor_iri(path_actor).await
    }
}

#[async_trait]
impl<T: FederateApp + ?Sized> FederateApp for Arc<T> {
    type Error = T::Error;

    async fn unblocked(&self, actor_iris: &[Iri]) -> Result<bool, Self::Error> {
        self.as_ref().unblocked(actor_iris).await
    }
    async fn on_follow(&self, follow: &Activity) -> Result<FollowResponse, Self::Error> {
        self.as_ref().on_follow(follow).await
    }
    async fn get_following(&self, actor: &Iri) -> Result<Collection, Self::Error> {
        self.as_ref().get_following(actor).await
    }
}

#[async_trait]
impl<T: SocialApp + ?Sized> SocialApp for Arc<T> {
    type Error = T::Error;

    async fn owns(&self, actor: &Iri, object: &Iri) -> Result<bool, Self::Error> {
        self.as_ref().owns(actor, object).await
    }
    async fn can_add(&self, actor: &Iri, object: &Iri, target: &Iri) -> Result<bool, Self::Error> {
        self.as_ref().can_add(actor, object, target).await
    }
    async fn can_remove(
        &self,
        actor: &Iri,
        object: &Iri,
        target: &Iri,
    ) -> Result<bool, Self::Error> {
        self.as_ref().can_remove(actor, object, target).await
    }
}

/// Injectable time source so tests can fix "now" instead of depending on
/// the wall clock (used by Tombstone deletion timestamps, Create
/// `published` defaults, and delivery backoff scheduling).
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by [`chrono::Utc::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Observes client-side (outbox) side effects, one method per dispatched
/// verb (§4.3, §4.4). Every method is a no-op by default — mirrors go-fed's
/// `Callbacker` being satisfiable by an empty struct — so integrators only
/// override what they act on.
#[async_trait]
pub trait ClientCallbacks: Send + Sync {
    async fn create(&self, _activity: &Activity) {}
    async fn update(&self, _activity: &Activity) {}
    async fn delete(&self, _activity: &Activity) {}
    async fn follow(&self, _activity: &Activity) {}
    async fn accept(&self, _activity: &Activity) {}
    async fn reject(&self, _activity: &Activity) {}
    async fn add(&self, _activity: &Activity) {}
    async fn remove(&self, _activity: &Activity) {}
    async fn like(&self, _activity: &Activity) {}
    async fn undo(&self, _activity: &Activity) {}
    async fn block(&self, _activity: &Activity) {}
    /// Called for any verb without a dedicated rule (§4.3 pass-through),
    /// including `Announce`.
    async fn other(&self, _activity: &Activity) {}
}

/// Observes server-side (inbox) side effects, one method per dispatched
/// verb (§4.3, §4.5).
#[async_trait]
pub trait ServerCallbacks: Send + Sync {
    async fn create(&self, _activity: &Activity) {}
    async fn update(&self, _activity: &Activity) {}
    async fn delete(&self, _activity: &Activity) {}
    async fn follow(&self, _activity: &Activity) {}
    async fn accept(&self, _activity: &Activity) {}
    async fn reject(&self, _activity: &Activity) {}
    async fn add(&self, _activity: &Activity) {}
    async fn remove(&self, _activity: &Activity) {}
    async fn like(&self, _activity: &Activity) {}
    async fn undo(&self, _activity: &Activity) {}
    async fn block(&self, _activity: &Activity) {}
    async fn other(&self, _activity: &Activity) {}
}

/// No-op callback sets for integrators that don't need to observe
/// anything, analogous to go-fed's empty `Callbacker` struct.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCallbacks;

impl ClientCallbacks for NoopCallbacks {}
impl ServerCallbacks for NoopCallbacks {}
