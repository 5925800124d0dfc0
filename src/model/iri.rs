//! IRI primitive used as the primary key for every addressable thing.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A validated, cheaply-clonable identifier.
///
/// Wraps [`url::Url`] rather than a bare `String` so that every module
/// compares identities the way the wire protocol actually does (scheme +
/// authority + path), not by accidental string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Iri(url::Url);

impl Iri {
    pub fn parse(s: &str) -> Result<Self, crate::error::EngineError> {
        url::Url::parse(s)
            .map(Iri)
            .map_err(|e| crate::error::EngineError::MalformedIri(s.to_string(), e.to_string()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn as_url(&self) -> &url::Url {
        &self.0
    }

    pub fn domain(&self) -> Option<&str> {
        self.0.host_str()
    }
}

impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<url::Url> for Iri {
    fn from(url: url::Url) -> Self {
        Iri(url)
    }
}

impl TryFrom<&str> for Iri {
    type Error = crate::error::EngineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Iri::parse(s)
    }
}

impl TryFrom<String> for Iri {
    type Error = crate::error::EngineError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Iri::parse(&s)
    }
}

/// The ActivityStreams public-collection sentinel (§3, §4.6).
pub const AS_PUBLIC: &str = "https://www.w3.org/ns/activitystreams#Public";

/// True if the reference names the ActivityStreams "public" pseudo-collection,
/// in either its canonical or legacy (`as:Public`, bare `Public`) spellings.
pub fn is_public_str(s: &str) -> bool {
    s == AS_PUBLIC || s == "as:Public" || s == "Public"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_iri() {
        let iri = Iri::parse("https://example.com/users/alice").unwrap();
        assert_eq!(iri.domain(), Some("example.com"));
    }

    #[test]
    fn rejects_malformed_iri() {
        assert!(Iri::parse("not a url").is_err());
    }

    #[test]
    fn recognizes_public_sentinel_spellings() {
        assert!(is_public_str(AS_PUBLIC));
        assert!(is_public_str("as:Public"));
        assert!(is_public_str("Public"));
        assert!(!is_public_str("https://example.com/users/alice"));
    }
}
