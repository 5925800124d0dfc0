//! `Activity` — a `Node` that additionally carries actor/object/target.

use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::error::EngineError;
use crate::model::iri::Iri;
use crate::model::node::{Node, Reference, parse_reference_list};

#[derive(Debug, Clone, PartialEq)]
pub struct Activity(Node);

impl Deref for Activity {
    type Target = Node;
    fn deref(&self) -> &Node {
        &self.0
    }
}

impl DerefMut for Activity {
    fn deref_mut(&mut self) -> &mut Node {
        &mut self.0
    }
}

impl Activity {
    pub fn from_node(node: Node) -> Self {
        Activity(node)
    }

    pub fn into_node(self) -> Node {
        self.0
    }

    pub fn node(&self) -> &Node {
        &self.0
    }

    pub fn actor(&self) -> Vec<Reference> {
        parse_reference_list(self.0.get_raw("actor"))
    }

    pub fn object(&self) -> Vec<Reference> {
        parse_reference_list(self.0.get_raw("object"))
    }

    pub fn target(&self) -> Vec<Reference> {
        parse_reference_list(self.0.get_raw("target"))
    }

    /// The actor IRIs of this activity, resolved from whichever of the
    /// three polymorphic forms (embedded Object / Link / bare IRI) the
    /// wire payload used — mirrors go-fed's `getActorObject` /
    /// `getActorLink` / `getActorIRI` trio, collapsed into one accessor.
    pub fn actor_iris(&self) -> Vec<Iri> {
        self.actor().iter().filter_map(Reference::iri).collect()
    }

    pub fn primary_object(&self) -> Option<Reference> {
        self.object().into_iter().next()
    }

    pub fn primary_object_iri(&self) -> Option<Iri> {
        self.primary_object().and_then(|r| r.iri())
    }

    pub fn set_object(&mut self, refs: &[Reference]) {
        let value = serde_json::Value::Array(refs.iter().map(reference_to_value).collect());
        self.0.set_raw("object", value);
    }

    pub fn set_actor(&mut self, refs: &[Reference]) {
        let value = serde_json::Value::Array(refs.iter().map(reference_to_value).collect());
        self.0.set_raw("actor", value);
    }
}

fn reference_to_value(r: &Reference) -> serde_json::Value {
    match r {
        Reference::Iri(iri) => json!(iri.as_str()),
        Reference::Object(node) => node.to_value(),
        Reference::Link(link) => json!({"type": "Link", "href": link.href.as_str()}),
    }
}

/// Constructs the `Tombstone` object that replaces a deleted object in the
/// store (§3, §4.5 handle_delete). `deleted_at` is supplied by the caller
/// rather than read from a wall clock here, keeping the model module free
/// of ambient time access — callers hold a [`crate::federation::traits::Clock`].
pub struct Tombstone;

impl Tombstone {
    pub fn from_deleted(node: &Node, deleted_at: DateTime<Utc>) -> Node {
        let former_type = node.kind().to_vec();
        let mut tombstone = Node::new(node.id().cloned(), vec!["Tombstone".to_string()]);
        tombstone.set_raw(
            "formerType",
            if former_type.len() == 1 {
                json!(former_type[0])
            } else {
                json!(former_type)
            },
        );
        tombstone.set_raw("deleted", json!(deleted_at.to_rfc3339()));
        tombstone
    }
}

/// Recognized ActivityPub verbs (§2, §4.3). `Other` carries any
/// unrecognized `type` string through to the pass-through callback path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    Create,
    Update,
    Delete,
    Follow,
    Accept,
    Reject,
    Add,
    Remove,
    Like,
    Undo,
    Block,
    Announce,
    Other(String),
}

impl ActivityKind {
    pub fn parse(s: &str) -> Self {
        match s {
            "Create" => ActivityKind::Create,
            "Update" => ActivityKind::Update,
            "Delete" => ActivityKind::Delete,
            "Follow" => ActivityKind::Follow,
            "Accept" => ActivityKind::Accept,
            "Reject" => ActivityKind::Reject,
            "Add" => ActivityKind::Add,
            "Remove" => ActivityKind::Remove,
            "Like" => ActivityKind::Like,
            "Undo" => ActivityKind::Undo,
            "Block" => ActivityKind::Block,
            "Announce" => ActivityKind::Announce,
            other => ActivityKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ActivityKind::Create => "Create",
            ActivityKind::Update => "Update",
            ActivityKind::Delete => "Delete",
            ActivityKind::Follow => "Follow",
            ActivityKind::Accept => "Accept",
            ActivityKind::Reject => "Reject",
            ActivityKind::Add => "Add",
            ActivityKind::Remove => "Remove",
            ActivityKind::Like => "Like",
            ActivityKind::Undo => "Undo",
            ActivityKind::Block => "Block",
            ActivityKind::Announce => "Announce",
            ActivityKind::Other(s) => s.as_str(),
        }
    }
}

/// Extract the activity's kind from its first `type` entry, falling back
/// to `Other("")` for a typeless payload (rejected upstream by callers
/// that require a type, per §7 `TypeRequired`).
pub fn activity_kind(activity: &Activity) -> ActivityKind {
    activity
        .kind()
        .first()
        .map(|s| ActivityKind::parse(s))
        .unwrap_or_else(|| ActivityKind::Other(String::new()))
}

pub fn require_object_shape(value: &serde_json::Value) -> Result<(), EngineError> {
    if value.is_object() {
        Ok(())
    } else {
        Err(EngineError::TypeRequired)
    }
}
