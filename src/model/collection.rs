//! `Collection` / `OrderedCollection` — member lists with pagination.

use serde_json::{Value, json};

use crate::error::EngineError;
use crate::model::iri::Iri;
use crate::model::node::{Node, Reference, parse_reference_list};

#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    pub id: Option<Iri>,
    pub ordered: bool,
    pub total_items: u64,
    pub items: Vec<Reference>,
    pub first: Option<Iri>,
    pub last: Option<Iri>,
    pub next: Option<Iri>,
    pub prev: Option<Iri>,
    pub current: Option<Iri>,
}

impl Collection {
    pub fn new(id: Option<Iri>, ordered: bool) -> Self {
        Collection {
            id,
            ordered,
            total_items: 0,
            items: Vec::new(),
            first: None,
            last: None,
            next: None,
            prev: None,
            current: None,
        }
    }

    pub fn from_node(node: &Node) -> Result<Self, EngineError> {
        let ordered = node.has_kind("OrderedCollection") || node.has_kind("OrderedCollectionPage");
        let items_key = if ordered { "orderedItems" } else { "items" };
        let items = parse_reference_list(node.get_raw(items_key));
        let total_items = node
            .get_raw("totalItems")
            .and_then(Value::as_u64)
            .unwrap_or(items.len() as u64);

        let iri_field = |key: &str| -> Option<Iri> {
            node.get_raw(key)
                .and_then(Value::as_str)
                .and_then(|s| Iri::parse(s).ok())
        };

        Ok(Collection {
            id: node.id().cloned(),
            ordered,
            total_items,
            items,
            first: iri_field("first"),
            last: iri_field("last"),
            next: iri_field("next"),
            prev: iri_field("prev"),
            current: iri_field("current"),
        })
    }

    /// Prepend semantics used by outbox/inbox posting (§4.1 step 6, §4.2 step 8).
    pub fn push_front(&mut self, item: Reference) {
        self.items.insert(0, item);
        self.total_items += 1;
    }

    pub fn contains_id(&self, iri: &Iri) -> bool {
        self.items.iter().any(|r| r.iri().as_ref() == Some(iri))
    }

    /// Removes every member whose resolved IRI matches `iri`. Returns
    /// whether anything was removed (used by Add/Remove/Undo handlers to
    /// detect a no-op).
    pub fn remove_by_id(&mut self, iri: &Iri) -> bool {
        let before = self.items.len();
        self.items.retain(|r| r.iri().as_ref() != Some(iri));
        let removed = before - self.items.len();
        self.total_items = self.total_items.saturating_sub(removed as u64);
        removed > 0
    }

    pub fn to_node(&self) -> Node {
        let kind = if self.ordered {
            "OrderedCollection"
        } else {
            "Collection"
        };
        let mut node = Node::new(self.id.clone(), vec![kind.to_string()]);
        node.set_raw("totalItems", json!(self.total_items));
        let items_key = if self.ordered { "orderedItems" } else { "items" };
        let items_value = Value::Array(
            self.items
                .iter()
                .map(|r| match r {
                    Reference::Iri(iri) => json!(iri.as_str()),
                    Reference::Object(n) => n.to_value(),
                    Reference::Link(l) => json!({"type": "Link", "href": l.href.as_str()}),
                })
                .collect(),
        );
        node.set_raw(items_key, items_value);
        if let Some(ref first) = self.first {
            node.set_raw("first", json!(first.as_str()));
        }
        if let Some(ref last) = self.last {
            node.set_raw("last", json!(last.as_str()));
        }
        if let Some(ref next) = self.next {
            node.set_raw("next", json!(next.as_str()));
        }
        if let Some(ref prev) = self.prev {
            node.set_raw("prev", json!(prev.as_str()));
        }
        if let Some(ref current) = self.current {
            node.set_raw("current", json!(current.as_str()));
        }
        node
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iri(s: &str) -> Iri {
        Iri::parse(s).unwrap()
    }

    #[test]
    fn push_front_prepends_and_bumps_total() {
        let mut collection = Collection::new(Some(iri("https://example.com/outbox")), true);
        collection.push_front(Reference::Iri(iri("https://example.com/activities/1")));
        collection.push_front(Reference::Iri(iri("https://example.com/activities/2")));

        assert_eq!(collection.total_items, 2);
        assert_eq!(
            collection.items[0].iri().unwrap().as_str(),
            "https://example.com/activities/2"
        );
    }

    #[test]
    fn remove_by_id_drops_matching_member_and_reports_change() {
        let mut collection = Collection::new(None, false);
        let target = iri("https://example.com/users/bob");
        collection.items.push(Reference::Iri(target.clone()));
        collection.total_items = 1;

        assert!(collection.remove_by_id(&target));
        assert!(collection.items.is_empty());
        assert!(!collection.remove_by_id(&target));
    }

    #[test]
    fn round_trips_through_node() {
        let node = Node::from_value(serde_json::json!({
            "id": "https://example.com/followers",
            "type": "OrderedCollection",
            "totalItems": 2,
            "orderedItems": ["https://example.com/users/a", "https://example.com/users/b"]
        }))
        .unwrap();

        let collection = Collection::from_node(&node).unwrap();
        assert_eq!(collection.total_items, 2);
        assert!(collection.ordered);
        assert!(collection.contains_id(&iri("https://example.com/users/a")));
    }
}
