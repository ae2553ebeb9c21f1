//! Authentication Session Module
//!
//! Everything that touches the lifecycle of an editor login handshake.
//!
//! # Modules
//!
//! - [`id`] - Session identifier generation
//! - [`store`] - TTL-aware session storage, the single synchronization point
//! - [`lifecycle`] - Open, poll and complete operations
//! - [`cleanup`] - Background sweep of expired sessions

pub mod cleanup;
pub mod id;
pub mod lifecycle;
pub mod store;

// Re-export commonly used items for convenience
pub use cleanup::CleanupScheduler;
pub use id::{SessionIdGenerator, DEFAULT_ID_PREFIX};
pub use lifecycle::{
    AuthSessionController, ControllerConfig, OpenRequest, OpenedSession, PollOutcome,
    ResolvedIdentity,
};
pub use store::{InMemorySessionStore, SessionStore};
