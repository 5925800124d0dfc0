//! Client-side (outbox) verb rules (§4.4). Grounded on the teacher's
//! `federation/delivery.rs` `builder` module for activity shape and on
//! `original_source/pub/fed.go`'s `handleClientCreate` for the
//! attributedTo/actor symmetry walk.

use crate::error::EngineError;
use crate::federation::traits::{Clock, ClientCallbacks, SocialApp, Store};
use crate::federation::verbs::store_err;
use crate::model::{Activity, ActivityKind, Collection, Iri, Node, Reference, Tombstone, activity_kind};

/// Whether the dispatched verb should be handed to the delivery pool.
/// Only `Block` is excluded (§4.4: "Block SHOULD NOT be federated").
pub struct DispatchOutcome {
    pub deliverable: bool,
}

/// `wrapInCreate` (fed.go ~line 204): a POST body whose `type` is not a
/// recognized verb must be object-shaped, and is wrapped in a synthesized
/// Create addressed exactly like the object itself.
pub fn wrap_in_create(node: Node, actor: &Iri) -> Result<Activity, EngineError> {
    let kind = node.kind().first().cloned();
    let is_recognized_verb = kind
        .as_deref()
        .map(|k| !matches!(ActivityKind::parse(k), ActivityKind::Other(_)))
        .unwrap_or(false);
    if is_recognized_verb {
        return Ok(Activity::from_node(node));
    }
    if kind.is_none() {
        return Err(EngineError::TypeRequired);
    }

    let mut create = Node::new(None, vec!["Create".to_string()]);
    create.set_actor(&[Reference::Iri(actor.clone())]);
    for field in ["to", "cc", "bto", "bcc", "audience"] {
        if let Some(value) = node.get_raw(field) {
            create.set_raw(field, value.clone());
        }
    }
    create.set_raw("object", node.to_value());
    Ok(Activity::from_node(create))
}

fn require_object(activity: &Activity) -> Result<(), EngineError> {
    if activity.object().is_empty() {
        Err(EngineError::ObjectRequired)
    } else {
        Ok(())
    }
}

pub async fn dispatch<S, So, C, Cb>(
    activity: &mut Activity,
    store: &S,
    social: &So,
    clock: &C,
    callbacks: &Cb,
) -> Result<DispatchOutcome, EngineError>
where
    S: Store,
    So: SocialApp,
    C: Clock,
    Cb: ClientCallbacks,
{
    match activity_kind(activity) {
        ActivityKind::Create => {
            create(activity, store).await?;
            callbacks.create(activity).await;
            Ok(DispatchOutcome { deliverable: true })
        }
        ActivityKind::Update => {
            require_object(activity)?;
            update(activity, store).await?;
            callbacks.update(activity).await;
            Ok(DispatchOutcome { deliverable: true })
        }
        ActivityKind::Delete => {
            require_object(activity)?;
            delete(activity, store, clock).await?;
            callbacks.delete(activity).await;
            Ok(DispatchOutcome { deliverable: true })
        }
        ActivityKind::Follow => {
            require_object(activity)?;
            callbacks.follow(activity).await;
            Ok(DispatchOutcome { deliverable: true })
        }
        ActivityKind::Accept => {
            callbacks.accept(activity).await;
            Ok(DispatchOutcome { deliverable: true })
        }
        ActivityKind::Reject => {
            callbacks.reject(activity).await;
            Ok(DispatchOutcome { deliverable: true })
        }
        ActivityKind::Add => {
            require_object(activity)?;
            add_or_remove(activity, store, social, true).await?;
            callbacks.add(activity).await;
            Ok(DispatchOutcome { deliverable: true })
        }
        ActivityKind::Remove => {
            require_object(activity)?;
            add_or_remove(activity, store, social, false).await?;
            callbacks.remove(activity).await;
            Ok(DispatchOutcome { deliverable: true })
        }
        ActivityKind::Like => {
            require_object(activity)?;
            like(activity, store).await?;
            callbacks.like(activity).await;
            Ok(DispatchOutcome { deliverable: true })
        }
        ActivityKind::Undo => {
            require_object(activity)?;
            callbacks.undo(activity).await;
            Ok(DispatchOutcome { deliverable: true })
        }
        ActivityKind::Block => {
            require_object(activity)?;
            callbacks.block(activity).await;
            Ok(DispatchOutcome { deliverable: false })
        }
        ActivityKind::Announce | ActivityKind::Other(_) => {
            callbacks.other(activity).await;
            Ok(DispatchOutcome { deliverable: true })
        }
    }
}

/// Create attributedTo⇄actor symmetry (§3 invariant, §4.4): every actor
/// of the Create is added to the object's `attributedTo` if absent, and
/// vice versa. IRI-only objects are rejected (§9 Open Question).
async fn create<S: Store>(activity: &mut Activity, store: &S) -> Result<(), EngineError> {
    let objects = activity.object();
    if objects.is_empty() {
        return Err(EngineError::ObjectRequired);
    }

    let mut actor_refs = activity.actor();
    let mut actor_iris: Vec<Iri> = actor_refs.iter().filter_map(Reference::iri).collect();
    if actor_iris.is_empty() {
        return Err(EngineError::ObjectRequired);
    }

    let mut new_objects = Vec::with_capacity(objects.len());
    for object_ref in objects {
        let mut node = match object_ref {
            Reference::Object(node) => *node,
            Reference::Iri(iri) => return Err(EngineError::UnsupportedIriOnlyObject(iri.to_string())),
            Reference::Link(link) => {
                return Err(EngineError::UnsupportedIriOnlyObject(link.href.to_string()));
            }
        };

        let mut attributed = node.attributed_to();
        let attributed_iris: Vec<Iri> = attributed.iter().filter_map(Reference::iri).collect();
        for actor in &actor_iris {
            if !attributed_iris.contains(actor) {
                attributed.push(Reference::Iri(actor.clone()));
            }
        }
        node.set_attributed_to(&attributed);

        let final_attributed: Vec<Iri> = attributed.iter().filter_map(Reference::iri).collect();
        for attributed_iri in &final_attributed {
            if !actor_iris.contains(attributed_iri) {
                actor_iris.push(attributed_iri.clone());
                actor_refs.push(Reference::Iri(attributed_iri.clone()));
            }
        }

        if let Some(id) = node.id().cloned() {
            store.set(&id, node.clone()).await.map_err(store_err)?;
        }
        new_objects.push(Reference::Object(Box::new(node)));
    }

    activity.set_object(&new_objects);
    activity.set_actor(&actor_refs);
    Ok(())
}

/// Partial top-level merge of the provided object onto the stored one
/// (§4.4, §9: no JSON-merge-patch null redaction).
async fn update<S: Store>(activity: &Activity, store: &S) -> Result<(), EngineError> {
    for object_ref in activity.object() {
        let patch_node = match &object_ref {
            Reference::Object(node) => node.as_ref().clone(),
            Reference::Iri(iri) => return Err(EngineError::UnsupportedIriOnlyObject(iri.to_string())),
            Reference::Link(link) => {
                return Err(EngineError::UnsupportedIriOnlyObject(link.href.to_string()));
            }
        };
        let id = patch_node.id().cloned().ok_or(EngineError::ObjectRequired)?;
        let mut stored = store
            .get(&id)
            .await
            .map_err(store_err)?
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        stored.apply_overlay(patch_node.raw_map());
        store.set(&id, stored).await.map_err(store_err)?;
    }
    Ok(())
}

async fn delete<S: Store, C: Clock>(
    activity: &Activity,
    store: &S,
    clock: &C,
) -> Result<(), EngineError> {
    let now = clock.now();
    for object_ref in activity.object() {
        let id = object_ref.iri().ok_or(EngineError::ObjectRequired)?;
        let existing = store
            .get(&id)
            .await
            .map_err(store_err)?
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        let tombstone = Tombstone::from_deleted(&existing, now);
        store.set(&id, tombstone).await.map_err(store_err)?;
    }
    Ok(())
}

/// Add/Remove (§4.4): gated on the target being locally owned (`owns`)
/// and being a Collection/OrderedCollection, then per-object `CanAdd`/
/// `CanRemove` authorization.
async fn add_or_remove<S: Store, So: SocialApp>(
    activity: &Activity,
    store: &S,
    social: &So,
    adding: bool,
) -> Result<(), EngineError> {
    let actors = activity.actor_iris();
    let targets = activity.target();
    if targets.is_empty() {
        return Err(EngineError::ObjectRequired);
    }

    for target_ref in targets {
        let target_iri = target_ref.iri().ok_or(EngineError::ObjectRequired)?;

        let mut owned = false;
        for actor in &actors {
            if social.owns(actor, &target_iri).await.map_err(store_err)? {
                owned = true;
                break;
            }
        }
        if !owned {
            continue;
        }

        let target_node = store
            .get(&target_iri)
            .await
            .map_err(store_err)?
            .ok_or_else(|| EngineError::NotFound(target_iri.to_string()))?;
        if !(target_node.has_kind("Collection") || target_node.has_kind("OrderedCollection")) {
            return Err(EngineError::NotACollection);
        }
        let mut collection = Collection::from_node(&target_node)?;

        for object_ref in activity.object() {
            let object_iri = match object_ref.iri() {
                Some(iri) => iri,
                None => continue,
            };

            let mut authorized = false;
            for actor in &actors {
                let ok = if adding {
                    social.can_add(actor, &object_iri, &target_iri).await
                } else {
                    social.can_remove(actor, &object_iri, &target_iri).await
                }
                .map_err(store_err)?;
                if ok {
                    authorized = true;
                    break;
                }
            }
            if !authorized {
                return Err(EngineError::Forbidden);
            }

            if adding {
                if !collection.contains_id(&object_iri) {
                    collection.push_front(Reference::Iri(object_iri));
                }
            } else {
                collection.remove_by_id(&object_iri);
            }
        }

        store
            .set(&target_iri, collection.to_node())
            .await
            .map_err(store_err)?;
    }

    Ok(())
}

/// Like → `liked` (§9 Open Question resolved: stores the Like's *object*
/// IRI, not the activity itself).
async fn like<S: Store>(activity: &Activity, store: &S) -> Result<(), EngineError> {
    let object_iri = activity.primary_object_iri().ok_or(EngineError::ObjectRequired)?;
    let actors = activity.actor_iris();
    if actors.is_empty() {
        return Err(EngineError::ObjectRequired);
    }

    for actor_iri in actors {
        let Some(actor_node) = store.get(&actor_iri).await.map_err(store_err)? else {
            continue;
        };
        let Some(liked_iri) = actor_node
            .get_raw("liked")
            .and_then(|v| v.as_str())
            .and_then(|s| Iri::parse(s).ok())
        else {
            continue;
        };

        let liked_node = match store.get(&liked_iri).await.map_err(store_err)? {
            Some(node) => node,
            None => Collection::new(Some(liked_iri.clone()), true).to_node(),
        };
        let mut collection = Collection::from_node(&liked_node)?;
        if !collection.contains_id(&object_iri) {
            collection.push_front(Reference::Iri(object_iri.clone()));
        }
        store
            .set(&liked_iri, collection.to_node())
            .await
            .map_err(store_err)?;
    }

    Ok(())
}
