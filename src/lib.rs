//! Parlor - real-time presence and direct messaging for a forum backend
//!
//! This library provides the websocket hub: admission control, the
//! connection registry, presence broadcasting and message routing.

pub mod auth;
pub mod config;
pub mod constants;
pub mod core;
pub mod error;
pub mod handlers;
pub mod security;
pub mod storage;

// Re-export main components
pub use config::*;
pub use constants::*;
pub use error::{ParlorError, Result};
