//! Message and user persistence

pub mod memory;
pub mod traits;

pub use memory::{MemoryStore, SharedMemoryStore};
pub use traits::{MessageStore, UserDirectory};
