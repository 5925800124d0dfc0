//! Ambient, non-core concerns an integrator needs but the engine itself
//! stays free of (§1 non-goals: no HTTP signing, no key management built
//! in): HTTP Signatures and a TTL cache for remote actor public keys.

pub mod key_cache;
pub mod rsa_signer;
pub mod signature;

pub use key_cache::PublicKeyCache;
pub use rsa_signer::RsaSigner;
