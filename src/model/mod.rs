//! Vocabulary model — a lightweight typed view over ActivityStreams JSON.
//!
//! Not a fully generated AS2 vocabulary: that code generation is
//! mechanically derivable from the JSON-LD context and is explicitly out
//! of scope. What lives here is the minimum typed surface the federation
//! engine actually branches on: addressing, actor/object/target slots,
//! tombstones and collections.

mod activity;
mod collection;
mod iri;
mod node;

pub use activity::{Activity, ActivityKind, Tombstone, activity_kind, require_object_shape};
pub use collection::Collection;
pub use iri::{AS_PUBLIC, Iri, is_public_str};
pub use node::{LinkNode, Node, Reference};

pub fn is_public(reference: &Reference) -> bool {
    reference.is_public()
}
