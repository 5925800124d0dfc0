//! The typed view over ActivityStreams JSON objects.
//!
//! This is deliberately not a generated vocabulary (see SPEC_FULL.md
//! [MODULE: model] non-goals): `Node` keeps the full property bag as JSON
//! and exposes typed accessors only for the properties side-effect code
//! actually inspects. Every accessor funnels through [`Reference`] so the
//! rest of the engine never matches on raw `serde_json::Value` again once
//! a `Node` has been constructed.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};

use crate::error::EngineError;
use crate::model::iri::{Iri, is_public_str};

/// Any value that can occupy an addressing/actor/object/target slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    Iri(Iri),
    Object(Box<Node>),
    Link(LinkNode),
}

/// A minimal `Link` object (AS2 §3.2): enough to resolve `href` without
/// pulling in the full Link vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkNode {
    pub href: Iri,
    pub name: Option<String>,
    pub media_type: Option<String>,
}

impl Reference {
    /// The IRI this reference ultimately points at, regardless of shape.
    pub fn iri(&self) -> Option<Iri> {
        match self {
            Reference::Iri(iri) => Some(iri.clone()),
            Reference::Object(node) => node.id.clone(),
            Reference::Link(link) => Some(link.href.clone()),
        }
    }

    pub fn is_public(&self) -> bool {
        match self {
            Reference::Iri(iri) => is_public_str(iri.as_str()),
            _ => false,
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Reference::Object(node) => Some(node),
            _ => None,
        }
    }

    fn from_value(value: &Value) -> Option<Reference> {
        match value {
            Value::String(s) => {
                if is_public_str(s) {
                    Some(Reference::Iri(Iri::parse(s).unwrap_or_else(|_| {
                        // AS_PUBLIC and its legacy spellings are not always
                        // well-formed URLs ("Public" alone isn't); fall back to
                        // the canonical sentinel so is_public() still matches.
                        Iri::parse(crate::model::iri::AS_PUBLIC).expect("AS_PUBLIC is a valid URL")
                    })))
                } else {
                    Iri::parse(s).ok().map(Reference::Iri)
                }
            }
            Value::Object(obj) => {
                let kind = obj.get("type").and_then(Value::as_str).unwrap_or("");
                if kind.eq_ignore_ascii_case("Link") || (obj.contains_key("href") && !obj.contains_key("id")) {
                    let href = obj.get("href").and_then(Value::as_str)?;
                    Some(Reference::Link(LinkNode {
                        href: Iri::parse(href).ok()?,
                        name: obj.get("name").and_then(Value::as_str).map(str::to_string),
                        media_type: obj
                            .get("mediaType")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                    }))
                } else {
                    Node::from_value(Value::Object(obj.clone()))
                        .ok()
                        .map(|n| Reference::Object(Box::new(n)))
                }
            }
            _ => None,
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Reference::Iri(iri) => json!(iri.as_str()),
            Reference::Object(node) => node.to_value(),
            Reference::Link(link) => json!({
                "type": "Link",
                "href": link.href.as_str(),
                "name": link.name,
                "mediaType": link.media_type,
            }),
        }
    }
}

pub(crate) fn parse_reference_list(value: Option<&Value>) -> Vec<Reference> {
    match value {
        None => Vec::new(),
        Some(Value::Array(items)) => items.iter().filter_map(Reference::from_value).collect(),
        Some(other) => Reference::from_value(other).into_iter().collect(),
    }
}

fn references_to_value(refs: &[Reference]) -> Value {
    Value::Array(refs.iter().map(Reference::to_value).collect())
}

fn parse_kind(value: Option<&Value>) -> Vec<String> {
    match value {
        None => Vec::new(),
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(_) => Vec::new(),
    }
}

/// Any ActivityStreams object: an id, a type list (AS2 allows `type` to be
/// singular or an array), and the rest of the property bag preserved
/// opaquely so round-tripping never drops extension properties.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: Option<Iri>,
    pub kind: Vec<String>,
    raw: Map<String, Value>,
}

impl Node {
    pub fn from_value(value: Value) -> Result<Self, EngineError> {
        let raw = match value {
            Value::Object(map) => map,
            _ => return Err(EngineError::TypeRequired),
        };
        let id = match raw.get("id") {
            Some(Value::String(s)) => Some(Iri::parse(s)?),
            _ => None,
        };
        let kind = parse_kind(raw.get("type"));
        Ok(Node { id, kind, raw })
    }

    pub fn new(id: Option<Iri>, kind: Vec<String>) -> Self {
        let mut raw = Map::new();
        if let Some(ref id) = id {
            raw.insert("id".into(), json!(id.as_str()));
        }
        if !kind.is_empty() {
            raw.insert(
                "type".into(),
                if kind.len() == 1 {
                    json!(kind[0])
                } else {
                    json!(kind)
                },
            );
        }
        Node { id, kind, raw }
    }

    pub fn id(&self) -> Option<&Iri> {
        self.id.as_ref()
    }

    /// Assigns or overwrites the `id` (§4.2 step: "mint a fresh IRI ...
    /// set it on the activity"), updating both the typed field and the
    /// underlying property bag.
    pub fn set_id(&mut self, id: Iri) {
        self.raw.insert("id".into(), json!(id.as_str()));
        self.id = Some(id);
    }

    pub fn kind(&self) -> &[String] {
        &self.kind
    }

    pub fn has_kind(&self, k: &str) -> bool {
        self.kind.iter().any(|x| x.eq_ignore_ascii_case(k))
    }

    pub fn to(&self) -> Vec<Reference> {
        parse_reference_list(self.raw.get("to"))
    }

    pub fn cc(&self) -> Vec<Reference> {
        parse_reference_list(self.raw.get("cc"))
    }

    pub fn bto(&self) -> Vec<Reference> {
        parse_reference_list(self.raw.get("bto"))
    }

    pub fn bcc(&self) -> Vec<Reference> {
        parse_reference_list(self.raw.get("bcc"))
    }

    pub fn audience(&self) -> Vec<Reference> {
        parse_reference_list(self.raw.get("audience"))
    }

    pub fn attributed_to(&self) -> Vec<Reference> {
        parse_reference_list(self.raw.get("attributedTo"))
    }

    pub fn in_reply_to(&self) -> Vec<Reference> {
        parse_reference_list(self.raw.get("inReplyTo"))
    }

    pub fn content(&self) -> Option<&str> {
        self.raw.get("content").and_then(Value::as_str)
    }

    pub fn published(&self) -> Option<DateTime<Utc>> {
        self.raw
            .get("published")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// All addressing slots combined (§4.6 step 1), as raw references.
    pub fn all_addressees(&self) -> Vec<Reference> {
        let mut out = self.to();
        out.extend(self.cc());
        out.extend(self.bto());
        out.extend(self.bcc());
        out.extend(self.audience());
        out
    }

    pub fn set_attributed_to(&mut self, refs: &[Reference]) {
        self.raw
            .insert("attributedTo".into(), references_to_value(refs));
    }

    pub fn set_actor(&mut self, refs: &[Reference]) {
        self.raw.insert("actor".into(), references_to_value(refs));
    }

    /// Overlay top-level keys from `patch` onto this node (§9 Update
    /// resolution: top-level overlay, no JSON-merge-patch null-redaction —
    /// a literal `null` is stored as-is).
    pub fn apply_overlay(&mut self, patch: &Map<String, Value>) {
        for (key, value) in patch {
            self.raw.insert(key.clone(), value.clone());
        }
        if let Some(kind) = self.raw.get("type") {
            self.kind = parse_kind(Some(kind));
        }
    }

    pub fn get_raw(&self, key: &str) -> Option<&Value> {
        self.raw.get(key)
    }

    /// The full property bag, for overlay/merge callers that need more
    /// than one key at a time (e.g. [`Node::apply_overlay`]'s caller).
    pub fn raw_map(&self) -> &Map<String, Value> {
        &self.raw
    }

    pub fn set_raw(&mut self, key: &str, value: Value) {
        self.raw.insert(key.to_string(), value);
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.raw.clone())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_addressing_fields_into_references() {
        let node = Node::from_value(json!({
            "id": "https://example.com/notes/1",
            "type": "Note",
            "to": ["https://www.w3.org/ns/activitystreams#Public"],
            "cc": ["https://example.com/users/alice/followers"],
        }))
        .unwrap();

        assert!(node.to()[0].is_public());
        assert_eq!(
            node.cc()[0].iri().unwrap().as_str(),
            "https://example.com/users/alice/followers"
        );
    }

    #[test]
    fn distinguishes_link_from_embedded_object() {
        let node = Node::from_value(json!({
            "id": "https://example.com/notes/1",
            "type": "Note",
            "attachment": [],
            "tag": [{"type": "Link", "href": "https://example.com/tags/rust"}],
        }))
        .unwrap();

        let tag = parse_reference_list(node.get_raw("tag"));
        assert!(matches!(tag[0], Reference::Link(_)));
    }

    #[test]
    fn overlay_applies_top_level_keys_and_keeps_literal_null() {
        let mut node = Node::from_value(json!({
            "id": "https://example.com/users/alice",
            "type": "Person",
            "summary": "before",
        }))
        .unwrap();

        let mut patch = Map::new();
        patch.insert("summary".into(), json!(null));
        patch.insert("name".into(), json!("Alice"));
        node.apply_overlay(&patch);

        assert_eq!(node.get_raw("summary"), Some(&Value::Null));
        assert_eq!(node.get_raw("name"), Some(&json!("Alice")));
    }

    #[test]
    fn rejects_non_object_payload() {
        assert!(Node::from_value(json!("just a string")).is_err());
    }
}
