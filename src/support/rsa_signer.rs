//! A [`Signer`] implementation backed by an RSA-SHA256 keypair, for the
//! demo binary and integration tests. The engine itself never depends on
//! this — `DeliveryPool` takes any `Arc<dyn Signer>` (§1 non-goal: no
//! built-in HTTP signing).

use async_trait::async_trait;

use crate::federation::Signer;
use crate::model::Iri;
use crate::support::signature::sign_request;

/// Signs every outbound delivery as one fixed actor (`key_id`), using its
/// RSA private key. One instance per locally-hosted actor that needs to
/// deliver activities.
pub struct RsaSigner {
    key_id: String,
    private_key_pem: String,
}

impl RsaSigner {
    pub fn new(key_id: impl Into<String>, private_key_pem: impl Into<String>) -> Self {
        RsaSigner {
            key_id: key_id.into(),
            private_key_pem: private_key_pem.into(),
        }
    }
}

#[async_trait]
impl Signer for RsaSigner {
    async fn sign(
        &self,
        method: &str,
        target: &Iri,
        body: &[u8],
    ) -> Result<Vec<(String, String)>, anyhow::Error> {
        let headers = sign_request(
            method,
            target.as_str(),
            Some(body),
            &self.private_key_pem,
            &self.key_id,
        )?;

        let mut out = vec![
            ("Signature".to_string(), headers.signature),
            ("Date".to_string(), headers.date),
        ];
        if let Some(digest) = headers.digest {
            out.push(("Digest".to_string(), digest));
        }
        Ok(out)
    }
}
