//! Inbox/Outbox Pipeline (§4.1, §4.2, §4.7): the top-level entry points an
//! integrator's HTTP router calls into. Grounded on
//! `original_source/pub/fed.go`'s `federator` struct (`handleInboundPOST`,
//! `handleOutboundPOST`, `Stop`, `Errors`), restructured as a Rust type
//! generic over the four collaborator traits rather than Go interfaces.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::EngineError;
use crate::federation::delivery::{DeliveryConfig, DeliveryPool, DeliveryTask, Signer};
use crate::federation::recipients::{resolve_recipients, strip_bcc};
use crate::federation::traits::{Clock, ClientCallbacks, FederateApp, ServerCallbacks, SocialApp, Store};
use crate::federation::verbs::server_side::ServerOutcome;
use crate::federation::verbs::{client_side, server_side, store_err};
use crate::metrics::{ACTIVITIES_RECEIVED_TOTAL, ACTIVITIES_SENT_TOTAL};
use crate::model::{Activity, Collection, Iri, Node, Reference};

/// Builder for [`Federator`], mirroring the teacher's `AppConfig::load()`
/// layered-defaults idiom: every knob has a sensible default, callers
/// override only what they need (§6 Configuration).
pub struct FederatorBuilder {
    enable_client: bool,
    enable_server: bool,
    max_delivery_depth: u32,
    delivery: DeliveryConfig,
}

impl Default for FederatorBuilder {
    fn default() -> Self {
        FederatorBuilder {
            enable_client: true,
            enable_server: true,
            max_delivery_depth: 4,
            delivery: DeliveryConfig::default(),
        }
    }
}

impl FederatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enable_client(mut self, enabled: bool) -> Self {
        self.enable_client = enabled;
        self
    }

    pub fn enable_server(mut self, enabled: bool) -> Self {
        self.enable_server = enabled;
        self
    }

    pub fn max_delivery_depth(mut self, depth: u32) -> Self {
        self.max_delivery_depth = depth.max(1);
        self
    }

    pub fn agent(mut self, agent: impl Into<String>) -> Self {
        self.delivery.agent = agent.into();
        self
    }

    pub fn worker_count(mut self, count: usize) -> Self {
        self.delivery.worker_count = count.max(1);
        self
    }

    pub fn delivery_config(mut self, config: DeliveryConfig) -> Self {
        self.delivery = config;
        self
    }

    pub fn build<S, F, So, C, Cc, Sc>(
        self,
        store: S,
        federate: F,
        social: So,
        clock: C,
        client_callbacks: Cc,
        server_callbacks: Sc,
        signer: Arc<dyn Signer>,
    ) -> Result<Federator<S, F, So, C, Cc, Sc>, EngineError>
    where
        S: Store,
        F: FederateApp,
        So: SocialApp,
        C: Clock,
        Cc: ClientCallbacks,
        Sc: ServerCallbacks,
    {
        let pool = DeliveryPool::new(self.delivery, signer)?;
        Ok(Federator {
            store,
            federate,
            social,
            clock,
            client_callbacks,
            server_callbacks,
            enable_client: self.enable_client,
            enable_server: self.enable_server,
            max_delivery_depth: self.max_delivery_depth,
            pool,
        })
    }
}

/// The federation engine's top-level handle. One instance owns exactly
/// one [`DeliveryPool`] (§5: "no internal singletons other than the
/// delivery pool associated with one federator instance").
pub struct Federator<S, F, So, C, Cc, Sc> {
    store: S,
    federate: F,
    social: So,
    clock: C,
    client_callbacks: Cc,
    server_callbacks: Sc,
    enable_client: bool,
    enable_server: bool,
    max_delivery_depth: u32,
    pool: DeliveryPool,
}

impl<S, F, So, C, Cc, Sc> Federator<S, F, So, C, Cc, Sc>
where
    S: Store,
    F: FederateApp,
    So: SocialApp,
    C: Clock,
    Cc: ClientCallbacks,
    Sc: ServerCallbacks,
{
    /// Server-to-server inbox receive (§4.1). `path_actor` identifies the
    /// inbox owner as the HTTP router parsed it from the URL; `body` is
    /// the already-deserialized JSON payload (content-type negotiation is
    /// the router's job, §1).
    pub async fn handle_inbound_post(
        &self,
        path_actor: &str,
        body: serde_json::Value,
    ) -> Result<(), EngineError> {
        if !self.enable_server {
            return Err(EngineError::Disabled);
        }

        let node = Node::from_value(body)?;
        let activity = Activity::from_node(node);
        let kind_label = activity.kind().first().cloned().unwrap_or_default();
        ACTIVITIES_RECEIVED_TOTAL.with_label_values(&[&kind_label]).inc();

        let actor_iris = activity.actor_iris();
        if actor_iris.is_empty() {
            return Err(EngineError::ObjectRequired);
        }
        if !self
            .federate
            .unblocked(&actor_iris)
            .await
            .map_err(store_err)?
        {
            return Err(EngineError::Forbidden);
        }

        let owner = self
            .store
            .actor_iri(path_actor)
            .await
            .map_err(store_err)?
            .ok_or_else(|| EngineError::NotFound(path_actor.to_string()))?;

        let mut inbox = self.store.get_inbox(&owner).await.map_err(store_err)?;
        if let Some(id) = activity.id().cloned() {
            inbox.push_front(Reference::Iri(id));
        }
        self.store.save_inbox(&owner, inbox).await.map_err(store_err)?;

        let outcome = server_side::dispatch(
            &activity,
            &self.store,
            &self.federate,
            &self.clock,
            &self.server_callbacks,
        )
        .await?;

        if let ServerOutcome::Deliver(mut response) = outcome {
            let new_id = self.store.new_id(response.node()).await.map_err(store_err)?;
            response.set_id(new_id.clone());
            self.store
                .set(&new_id, response.node().clone())
                .await
                .map_err(store_err)?;
            self.deliver(&response).await?;
        }

        Ok(())
    }

    /// Client-to-server outbox receive (§4.2). Returns the minted
    /// activity IRI for the caller to set as the `Location` header.
    pub async fn handle_outbound_post(
        &self,
        path_actor: &str,
        body: serde_json::Value,
    ) -> Result<Iri, EngineError> {
        if !self.enable_client {
            return Err(EngineError::Disabled);
        }

        let owner = self
            .store
            .actor_iri(path_actor)
            .await
            .map_err(store_err)?
            .ok_or_else(|| EngineError::NotFound(path_actor.to_string()))?;
        if !self
            .store
            .post_outbox_authorized(&owner)
            .await
            .map_err(store_err)?
        {
            return Err(EngineError::Unauthorized);
        }

        let node = Node::from_value(body)?;
        let mut activity = client_side::wrap_in_create(node, &owner)?;
        let kind_label = activity.kind().first().cloned().unwrap_or_default();
        ACTIVITIES_SENT_TOTAL.with_label_values(&[&kind_label]).inc();

        let new_id = self.store.new_id(activity.node()).await.map_err(store_err)?;
        activity.set_id(new_id.clone());

        let mut outbox = self.store.get_outbox(&owner).await.map_err(store_err)?;
        outbox.push_front(Reference::Iri(new_id.clone()));
        self.store.save_outbox(&owner, outbox).await.map_err(store_err)?;
        self.store
            .set(&new_id, activity.node().clone())
            .await
            .map_err(store_err)?;

        let outcome = client_side::dispatch(
            &mut activity,
            &self.store,
            &self.social,
            &self.clock,
            &self.client_callbacks,
        )
        .await?;

        // The Create symmetry walk (and any other handler) may have
        // mutated the activity in place; the append above is authoritative
        // per §4.4's documented no-rollback policy, so this is a plain
        // overwrite, not a second authorization round.
        self.store
            .set(&new_id, activity.node().clone())
            .await
            .map_err(store_err)?;

        if self.enable_server && outcome.deliverable {
            self.deliver(&activity).await?;
        }

        Ok(new_id)
    }

    /// GET inbox (§4.7): deduplicates `orderedItems` by `id`, first
    /// occurrence wins.
    pub async fn get_inbox(&self, path_actor: &str) -> Result<Collection, EngineError> {
        let owner = self
            .store
            .actor_iri(path_actor)
            .await
            .map_err(store_err)?
            .ok_or_else(|| EngineError::NotFound(path_actor.to_string()))?;
        let mut collection = self.store.get_inbox(&owner).await.map_err(store_err)?;
        dedup_by_id(&mut collection);
        Ok(collection)
    }

    /// GET outbox (§4.7). No dedup requirement on the outbox side.
    pub async fn get_outbox(&self, path_actor: &str) -> Result<Collection, EngineError> {
        let owner = self
            .store
            .actor_iri(path_actor)
            .await
            .map_err(store_err)?
            .ok_or_else(|| EngineError::NotFound(path_actor.to_string()))?;
        self.store.get_outbox(&owner).await.map_err(store_err)
    }

    /// Quiesces the delivery pool (§4.6, §5).
    pub async fn stop(&self) {
        self.pool.stop().await;
    }

    /// Drains terminal delivery failures (§7 Delivery errors policy).
    pub async fn errors(&self) -> Option<EngineError> {
        self.pool.next_error().await
    }

    async fn deliver(&self, activity: &Activity) -> Result<(), EngineError> {
        let origin = match activity.actor_iris().into_iter().next() {
            Some(sender) => self.actor_inbox(&sender).await?,
            None => None,
        };
        let targets = resolve_recipients(activity, &self.store, self.max_delivery_depth, origin.as_ref())
            .await?;
        let body = strip_bcc(activity);
        for inbox in targets {
            self.pool
                .enqueue(DeliveryTask {
                    inbox,
                    body: body.clone(),
                })
                .await?;
        }
        Ok(())
    }

    async fn actor_inbox(&self, actor: &Iri) -> Result<Option<Iri>, EngineError> {
        let node = self.store.get(actor).await.map_err(store_err)?;
        Ok(node.and_then(|n| {
            n.get_raw("inbox")
                .and_then(|v| v.as_str())
                .and_then(|s| Iri::parse(s).ok())
        }))
    }
}

fn dedup_by_id(collection: &mut Collection) {
    let mut seen = HashSet::new();
    collection
        .items
        .retain(|item| match item.iri() {
            Some(iri) => seen.insert(iri),
            None => true,
        });
    collection.total_items = collection.items.len() as u64;
}
