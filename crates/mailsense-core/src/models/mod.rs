//! Data models for Mailsense
//!
//! Core data structures for retrieved messages, conversation groups, and
//! the user profile.

mod conversation;
mod message;
mod profile;

pub use conversation::*;
pub use message::*;
pub use profile::*;
