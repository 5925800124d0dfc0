//! ActivityPub federation module
//!
//! Handles:
//! - Inbox/outbox pipelines and verb dispatch (`federator`, `verbs`)
//! - Recipient resolution (`recipients`)
//! - Activity delivery (`delivery`, `token_bucket`)
//! - The integrator-facing contract (`traits`)

pub mod delivery;
pub mod federator;
pub mod recipients;
pub mod token_bucket;
pub mod traits;
pub mod verbs;

pub use delivery::{DeliveryConfig, DeliveryPool, DeliveryTask, NoopSigner, Signer};
pub use federator::{Federator, FederatorBuilder};
pub use recipients::{resolve_recipients, strip_bcc};
pub use token_bucket::{TokenBucket, TokenBucketConfig};
pub use traits::{
    Clock, ClientCallbacks, FederateApp, FollowResponse, NoopCallbacks, ServerCallbacks,
    SocialApp, Store, SystemClock,
};
