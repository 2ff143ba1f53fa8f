//! Identity resolution for incoming connections

pub mod session;
pub mod token;

pub use session::{SessionResolver, TokenSessionResolver};
pub use token::{Claims, TokenManager};
