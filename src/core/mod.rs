//! Core functionality for the messaging hub

pub mod connection;
pub mod hub;
pub mod ip_extractor;
pub mod message;
pub mod message_handler;
pub mod message_types;
pub mod presence;
pub mod rate_limiter;
pub mod registry;
pub mod router;

// Re-export main components for convenience
pub use connection::{Connection, ConnectionState};
pub use hub::{ChatHub, SharedHub};
pub use message::{ChatMessage, LastMessage, MessageId, UserId, UserSummary};
pub use message_handler::{Dispatch, MessageHandler};
pub use message_types::{ClientFrame, ServerFrame};
pub use presence::{PresenceRecord, PresenceStatus};
pub use rate_limiter::{Decision, RateLimitConfig, RateLimiter, SharedRateLimiter};
pub use registry::{ConnectionRegistry, SharedRegistry};
pub use router::{Delivery, MessageRouter};
