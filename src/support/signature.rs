//! HTTP Signatures (draft-cavage-http-signatures), used by the demo binary
//! to sign outbound deliveries and verify inbound ones. Not part of the
//! engine itself (§1 non-goal: no HTTP signing built into the core), but
//! every integrator needs *some* signing story, so the reference one lives
//! here rather than nowhere.
//!
//! Grounded on the teacher's `federation/signature.rs`, with `AppError`
//! replaced by a dedicated [`SignatureError`] and `verify_signature`'s
//! result narrowed to what callers actually need.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Utc};
use rsa::pkcs1v15::Signature as Pkcs1v15Signature;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("invalid key material: {0}")]
    InvalidKey(String),
    #[error("malformed Signature header: {0}")]
    MalformedHeader(String),
    #[error("missing header: {0}")]
    MissingHeader(&'static str),
    #[error("request Date is too far from now")]
    StaleDate,
    #[error("digest mismatch")]
    DigestMismatch,
    #[error("signature verification failed")]
    VerificationFailed,
    #[error("failed to fetch remote actor key: {0}")]
    KeyFetch(String),
}

/// Headers to attach to a signed outbound request.
#[derive(Debug, Clone)]
pub struct SignatureHeaders {
    pub signature: String,
    pub date: String,
    pub digest: Option<String>,
}

/// Signs `method target` with an RSA-SHA256 keypair, producing the
/// `Signature`/`Date`/`Digest` header trio a remote inbox expects.
pub fn sign_request(
    method: &str,
    url: &str,
    body: Option<&[u8]>,
    private_key_pem: &str,
    key_id: &str,
) -> Result<SignatureHeaders, SignatureError> {
    let parsed_url =
        url::Url::parse(url).map_err(|e| SignatureError::InvalidUrl(e.to_string()))?;
    let host = parsed_url
        .host_str()
        .ok_or_else(|| SignatureError::InvalidUrl("missing host".to_string()))?;
    let path_and_query = match parsed_url.query() {
        Some(q) => format!("{}?{}", parsed_url.path(), q),
        None => parsed_url.path().to_string(),
    };

    let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
    let digest = body.map(generate_digest);

    let request_target = format!("{} {}", method.to_lowercase(), path_and_query);
    let mut signing_parts = vec![
        format!("(request-target): {}", request_target),
        format!("host: {}", host),
        format!("date: {}", date),
    ];
    let mut headers_list = vec!["(request-target)", "host", "date"];
    if let Some(ref digest_value) = digest {
        signing_parts.push(format!("digest: {}", digest_value));
        headers_list.push("digest");
    }
    let signing_string = signing_parts.join("\n");

    let private_key = RsaPrivateKey::from_pkcs8_pem(private_key_pem)
        .map_err(|e| SignatureError::InvalidKey(e.to_string()))?;
    let signing_key = rsa::pkcs1v15::SigningKey::<Sha256>::new_unprefixed(private_key);
    let mut rng = rand::thread_rng();
    let signature = signing_key.sign_with_rng(&mut rng, signing_string.as_bytes());
    let signature_b64 = BASE64.encode(signature.to_bytes());

    let signature_header = format!(
        "keyId=\"{}\",algorithm=\"rsa-sha256\",headers=\"{}\",signature=\"{}\"",
        key_id,
        headers_list.join(" "),
        signature_b64
    );

    Ok(SignatureHeaders {
        signature: signature_header,
        date,
        digest,
    })
}

#[derive(Debug, Clone)]
pub struct ParsedSignature {
    pub key_id: String,
    pub algorithm: String,
    pub headers: Vec<String>,
    pub signature: String,
}

pub fn parse_signature_header(header: &str) -> Result<ParsedSignature, SignatureError> {
    let mut key_id = None;
    let mut algorithm = None;
    let mut headers = None;
    let mut signature = None;

    for part in header.split(',') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            let value = value.trim().trim_matches('"');
            match key.trim() {
                "keyId" => key_id = Some(value.to_string()),
                "algorithm" => algorithm = Some(value.to_string()),
                "headers" => headers = Some(value.split_whitespace().map(str::to_string).collect()),
                "signature" => signature = Some(value.to_string()),
                _ => {}
            }
        }
    }

    Ok(ParsedSignature {
        key_id: key_id.ok_or(SignatureError::MissingHeader("keyId"))?,
        algorithm: algorithm.ok_or(SignatureError::MissingHeader("algorithm"))?,
        headers: headers.ok_or(SignatureError::MissingHeader("headers"))?,
        signature: signature.ok_or(SignatureError::MissingHeader("signature"))?,
    })
}

/// Verifies an inbound request's `Signature` header against the sender's
/// already-fetched public key. `path` is the request path the router
/// dispatched on, matching what the sender signed as `(request-target)`.
pub fn verify_signature(
    method: &str,
    path: &str,
    headers: &http::HeaderMap,
    body: Option<&[u8]>,
    public_key_pem: &str,
) -> Result<(), SignatureError> {
    let signature_header = headers
        .get("signature")
        .ok_or(SignatureError::MissingHeader("signature"))?
        .to_str()
        .map_err(|_| SignatureError::MalformedHeader("signature is not valid UTF-8".to_string()))?;
    let parsed = parse_signature_header(signature_header)?;

    if let Some(date_header) = headers.get("date") {
        let date_str = date_header
            .to_str()
            .map_err(|_| SignatureError::MalformedHeader("date is not valid UTF-8".to_string()))?;
        let date = DateTime::parse_from_rfc2822(date_str)
            .map_err(|_| SignatureError::MalformedHeader("unparseable date".to_string()))?;
        if (Utc::now().timestamp() - date.timestamp()).abs() > 300 {
            return Err(SignatureError::StaleDate);
        }
    }

    if let Some(body_data) = body {
        if let Some(digest_header) = headers.get("digest") {
            let digest_str = digest_header
                .to_str()
                .map_err(|_| SignatureError::MalformedHeader("digest is not valid UTF-8".to_string()))?;
            if digest_str != generate_digest(body_data) {
                return Err(SignatureError::DigestMismatch);
            }
        }
    }

    let mut signing_parts = Vec::new();
    for header_name in &parsed.headers {
        let value = match header_name.as_str() {
            "(request-target)" => format!("{} {}", method.to_lowercase(), path),
            "host" => header_str(headers, "host")?,
            "date" => header_str(headers, "date")?,
            "digest" => header_str(headers, "digest")?,
            other => return Err(SignatureError::MalformedHeader(format!("unsupported signed header {other}"))),
        };
        signing_parts.push(format!("{}: {}", header_name, value));
    }
    let signing_string = signing_parts.join("\n");

    let signature_bytes = BASE64
        .decode(&parsed.signature)
        .map_err(|_| SignatureError::MalformedHeader("signature is not valid base64".to_string()))?;
    let public_key = RsaPublicKey::from_public_key_pem(public_key_pem)
        .map_err(|e| SignatureError::InvalidKey(e.to_string()))?;
    let verifier = rsa::pkcs1v15::VerifyingKey::<Sha256>::new_unprefixed(public_key);
    let signature = Pkcs1v15Signature::try_from(signature_bytes.as_slice())
        .map_err(|_| SignatureError::MalformedHeader("signature is not valid PKCS#1v1.5".to_string()))?;
    verifier
        .verify(signing_string.as_bytes(), &signature)
        .map_err(|_| SignatureError::VerificationFailed)
}

fn header_str(headers: &http::HeaderMap, name: &'static str) -> Result<String, SignatureError> {
    headers
        .get(name)
        .ok_or(SignatureError::MissingHeader(name))?
        .to_str()
        .map_err(|_| SignatureError::MalformedHeader(format!("{name} is not valid UTF-8")))
        .map(str::to_string)
}

pub fn generate_digest(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    format!("SHA-256={}", BASE64.encode(hasher.finalize()))
}

/// Fetches the PEM public key advertised by a remote actor document, given
/// its `keyId` (the actor IRI with a `#fragment` stripped).
pub async fn fetch_public_key(
    key_id: &str,
    http_client: &reqwest::Client,
) -> Result<String, SignatureError> {
    let actor_url = key_id.split('#').next().unwrap_or(key_id);
    let response = http_client
        .get(actor_url)
        .header("Accept", "application/activity+json")
        .send()
        .await
        .map_err(|e| SignatureError::KeyFetch(e.to_string()))?;

    if !response.status().is_success() {
        return Err(SignatureError::KeyFetch(format!(
            "HTTP {}",
            response.status()
        )));
    }

    let actor: serde_json::Value = response
        .json()
        .await
        .map_err(|e| SignatureError::KeyFetch(e.to_string()))?;

    actor
        .get("publicKey")
        .and_then(|pk| pk.get("publicKeyPem"))
        .and_then(|pem| pem.as_str())
        .map(str::to_string)
        .ok_or_else(|| SignatureError::KeyFetch("actor document has no publicKeyPem".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_for_the_same_body() {
        assert_eq!(generate_digest(b"hello"), generate_digest(b"hello"));
        assert_ne!(generate_digest(b"hello"), generate_digest(b"world"));
    }

    #[test]
    fn parses_signature_header_fields() {
        let header = r#"keyId="https://example.com/users/alice#main-key",algorithm="rsa-sha256",headers="(request-target) host date",signature="abc123""#;
        let parsed = parse_signature_header(header).unwrap();
        assert_eq!(parsed.key_id, "https://example.com/users/alice#main-key");
        assert_eq!(parsed.headers, vec!["(request-target)", "host", "date"]);
    }

    #[test]
    fn rejects_header_missing_signature_field() {
        let header = r#"keyId="k",algorithm="rsa-sha256",headers="date""#;
        assert!(matches!(
            parse_signature_header(header),
            Err(SignatureError::MissingHeader("signature"))
        ));
    }
}
