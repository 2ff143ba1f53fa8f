//! Request handlers for different server endpoints

pub mod admission;
pub mod routes;
pub mod websocket;

pub use admission::{handle_rejection, with_rate_limit};
pub use routes::{routes, AppState, SharedAppState};
pub use websocket::handle_ws_client;
