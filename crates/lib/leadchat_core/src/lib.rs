//! # leadchat_core
//!
//! Core domain logic for Leadchat: history trimming, the backend relay,
//! pseudo-streaming of replies, the contact-form trigger, and lead intake.

pub mod archive;
pub mod backend;
pub mod history;
pub mod lead;
pub mod message;
pub mod stream;
pub mod trigger;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
