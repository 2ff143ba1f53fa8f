//! Input hardening for user-supplied content

pub mod xss;

pub use xss::sanitize_input;
