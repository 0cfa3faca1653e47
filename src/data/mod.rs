//! Data layer module
//!
//! In-memory state owned by the node for its lifetime:
//! - Follower registry (volatile)

mod followers;

pub use followers::FollowerRegistry;
