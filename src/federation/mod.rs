//! ActivityPub federation module
//!
//! Handles:
//! - Schema validation of outbound and inbound activities
//! - Actor fetching
//! - Activity processing (inbox)
//! - Activity delivery and periodic publishing (outbox)
//! - Outbound follow handshake

mod activity;
mod actor;
mod delivery;
mod follow;
mod publish;
pub mod schema;

pub use activity::{ActivityProcessor, ActivityType};
pub use actor::{ACTIVITY_JSON, Actor, ActorDirectory};
pub use delivery::{ActivityDelivery, DeliveryResult, builder};
pub use follow::{FollowOutcome, FollowRequester};
pub use publish::Publisher;
pub use schema::{SchemaRegistry, SchemaValidator, ValidationError};
