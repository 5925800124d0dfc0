//! Server-side (inbox) verb rules (§4.5). Grounded on
//! `original_source/pub/fed.go`'s `handleFollow`/`handleAccept`
//! for the Follow/Accept reciprocation flow.

use crate::error::EngineError;
use crate::federation::traits::{Clock, FederateApp, FollowResponse, ServerCallbacks, Store};
use crate::federation::verbs::store_err;
use crate::model::{Activity, ActivityKind, Collection, Node, Reference, Tombstone, activity_kind};

/// What the federator must do after dispatch returns, beyond the store
/// mutations already applied.
pub enum ServerOutcome {
    None,
    /// Follow's auto-Accept/auto-Reject synthesized response, still
    /// missing an id — the federator mints one and hands it to delivery
    /// (§4.5 Follow).
    Deliver(Activity),
}

fn require_object(activity: &Activity) -> Result<(), EngineError> {
    if activity.object().is_empty() {
        Err(EngineError::ObjectRequired)
    } else {
        Ok(())
    }
}

pub async fn dispatch<S, F, C, Cb>(
    activity: &Activity,
    store: &S,
    federate: &F,
    clock: &C,
    callbacks: &Cb,
) -> Result<ServerOutcome, EngineError>
where
    S: Store,
    F: FederateApp,
    C: Clock,
    Cb: ServerCallbacks,
{
    match activity_kind(activity) {
        ActivityKind::Create => {
            require_object(activity)?;
            create(activity, store).await?;
            callbacks.create(activity).await;
            Ok(ServerOutcome::None)
        }
        ActivityKind::Update => {
            require_object(activity)?;
            update(activity, store).await?;
            callbacks.update(activity).await;
            Ok(ServerOutcome::None)
        }
        ActivityKind::Delete => {
            require_object(activity)?;
            delete(activity, store, clock).await?;
            callbacks.delete(activity).await;
            Ok(ServerOutcome::None)
        }
        ActivityKind::Follow => {
            require_object(activity)?;
            let outbound = follow(activity, federate).await?;
            callbacks.follow(activity).await;
            match outbound {
                Some(response) => Ok(ServerOutcome::Deliver(response)),
                None => Ok(ServerOutcome::None),
            }
        }
        ActivityKind::Accept => {
            accept(activity, store, federate).await?;
            callbacks.accept(activity).await;
            Ok(ServerOutcome::None)
        }
        ActivityKind::Reject => {
            // MUST NOT add to `following` — callback only.
            callbacks.reject(activity).await;
            Ok(ServerOutcome::None)
        }
        ActivityKind::Add => {
            callbacks.add(activity).await;
            Ok(ServerOutcome::None)
        }
        ActivityKind::Remove => {
            callbacks.remove(activity).await;
            Ok(ServerOutcome::None)
        }
        ActivityKind::Like => {
            require_object(activity)?;
            like(activity, store).await?;
            callbacks.like(activity).await;
            Ok(ServerOutcome::None)
        }
        ActivityKind::Undo => {
            callbacks.undo(activity).await;
            Ok(ServerOutcome::None)
        }
        ActivityKind::Block => {
            callbacks.block(activity).await;
            Ok(ServerOutcome::None)
        }
        ActivityKind::Announce | ActivityKind::Other(_) => {
            callbacks.other(activity).await;
            Ok(ServerOutcome::None)
        }
    }
}

/// Persists each embedded object. IRI-only references are not
/// auto-fetched (§9 Open Question).
async fn create<S: Store>(activity: &Activity, store: &S) -> Result<(), EngineError> {
    for object_ref in activity.object() {
        match object_ref {
            Reference::Object(node) => {
                if let Some(id) = node.id().cloned() {
                    store.set(&id, *node).await.map_err(store_err)?;
                }
            }
            Reference::Iri(iri) => return Err(EngineError::UnsupportedIriOnlyObject(iri.to_string())),
            Reference::Link(link) => {
                return Err(EngineError::UnsupportedIriOnlyObject(link.href.to_string()));
            }
        }
    }
    Ok(())
}

/// Persists the updated object wholesale — unlike the client-side partial
/// merge, a federated Update is assumed to carry the full representation.
async fn update<S: Store>(activity: &Activity, store: &S) -> Result<(), EngineError> {
    for object_ref in activity.object() {
        match object_ref {
            Reference::Object(node) => {
                let id = node.id().cloned().ok_or(EngineError::ObjectRequired)?;
                store.set(&id, *node).await.map_err(store_err)?;
            }
            Reference::Iri(iri) => return Err(EngineError::UnsupportedIriOnlyObject(iri.to_string())),
            Reference::Link(link) => {
                return Err(EngineError::UnsupportedIriOnlyObject(link.href.to_string()));
            }
        }
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

/// Consults `OnFollow` and synthesizes the Accept/Reject response, whose
/// `object` is the original Follow and whose `to` is the Follow's actors
/// (§4.5). The id is left unset; the federator mints it before delivery.
async fn follow<F: FederateApp>(
    activity: &Activity,
    federate: &F,
) -> Result<Option<Activity>, EngineError> {
    let response = federate.on_follow(activity).await.map_err(store_err)?;
    let kind = match response {
        FollowResponse::DoNothing => return Ok(None),
        FollowResponse::Accept => "Accept",
        FollowResponse::Reject => "Reject",
    };

    let responder_iri = activity
        .object()
        .into_iter()
        .find_map(|r| r.iri())
        .ok_or(EngineError::ObjectRequired)?;
    let follow_actors = activity.actor_iris();

    let mut node = Node::new(None, vec![kind.to_string()]);
    node.set_actor(&[Reference::Iri(responder_iri)]);
    node.set_raw("object", activity.node().to_value());
    node.set_raw(
        "to",
        serde_json::Value::Array(
            follow_actors
                .iter()
                .map(|iri| serde_json::json!(iri.as_str()))
                .collect(),
        ),
    );
    Ok(Some(Activity::from_node(node)))
}

/// If the accepted object is a Follow, appends the Accept's actor(s) to
/// each follow-actor's `following` collection (§4.5).
async fn accept<S: Store, F: FederateApp>(
    activity: &Activity,
    store: &S,
    federate: &F,
) -> Result<(), EngineError> {
    let accept_actors = activity.actor_iris();
    let Some(follow_ref) = activity.primary_object() else {
        return Err(EngineError::ObjectRequired);
    };
    let follow_node = match &follow_ref {
        Reference::Object(node) => node.as_ref().clone(),
        Reference::Iri(iri) => store
            .get(iri)
            .await
            .map_err(store_err)?
            .ok_or_else(|| EngineError::NotFound(iri.to_string()))?,
        Reference::Link(link) => {
            return Err(EngineError::UnsupportedIriOnlyObject(link.href.to_string()));
        }
    };
    if !follow_node.has_kind("Follow") {
        return Ok(());
    }

    let follow_activity = Activity::from_node(follow_node);
    for follower_iri in follow_activity.actor_iris() {
        let mut collection = federate
            .get_following(&follower_iri)
            .await
            .map_err(store_err)?;
        for accepted_actor in &accept_actors {
            if !collection.contains_id(accepted_actor) {
                collection.push_front(Reference::Iri(accepted_actor.clone()));
            }
        }
        if let Some(id) = collection.id.clone() {
            store.set(&id, collection.to_node()).await.map_err(store_err)?;
        }
    }
    Ok(())
}

/// For each Like object that is locally owned (resolvable in the store),
/// appends the object's own id to its `likes` collection (§4.5 — the
/// mirror image of the client-side `liked` rule: both sides record the
/// liked object's id, never the Like activity's own id).
async fn like<S: Store>(activity: &Activity, store: &S) -> Result<(), EngineError> {
    for object_ref in activity.object() {
        let Some(object_iri) = object_ref.iri() else {
            continue;
        };
        let Some(object_node) = store.get(&object_iri).await.map_err(store_err)? else {
            continue;
        };
        let Some(likes_iri) = object_node
            .get_raw("likes")
            .and_then(|v| v.as_str())
            .and_then(|s| crate::model::Iri::parse(s).ok())
        else {
            continue;
        };

        let likes_node = match store.get(&likes_iri).await.map_err(store_err)? {
            Some(node) => node,
            None => Collection::new(Some(likes_iri.clone()), true).to_node(),
        };
        let mut collection = Collection::from_node(&likes_node)?;
        if !collection.contains_id(&object_iri) {
            collection.push_front(Reference::Iri(object_iri.clone()));
        }
        store
            .set(&likes_iri, collection.to_node())
            .await
            .map_err(store_err)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::MemoryStore;
    use crate::model::Iri;
    use serde_json::json;

    #[tokio::test]
    async fn like_appends_the_objects_own_id_not_the_activitys() {
        let store = MemoryStore::new(Iri::parse("https://origin.example/").unwrap());

        let object_iri = Iri::parse("https://origin.example/notes/1").unwrap();
        let likes_iri = Iri::parse("https://origin.example/notes/1/likes").unwrap();
        store
            .set(
                &object_iri,
                Node::from_value(json!({
                    "id": object_iri.as_str(),
                    "type": "Note",
                    "likes": likes_iri.as_str(),
                }))
                .unwrap(),
            )
            .await
            .unwrap();

        let activity = Activity::from_node(
            Node::from_value(json!({
                "id": "https://remote.example/activities/like-1",
                "type": "Like",
                "actor": "https://remote.example/users/bob",
                "object": object_iri.as_str(),
            }))
            .unwrap(),
        );

        like(&activity, &store).await.unwrap();

        let likes_node = store.get(&likes_iri).await.unwrap().unwrap();
        let collection = Collection::from_node(&likes_node).unwrap();
        assert!(collection.contains_id(&object_iri));
        assert!(!collection.contains_id(&Iri::parse("https://remote.example/activities/like-1").unwrap()));
    }
}
