//! Mailsense Core Library
//!
//! OAuth credential lifecycle, Gmail retrieval and classification pipeline,
//! and conversation grouping for the Mailsense server.

pub mod classifier;
pub mod config;
pub mod conversations;
pub mod credentials;
pub mod error;
pub mod mailbox;
pub mod models;
pub mod oauth;
pub mod pipeline;
pub mod retry;
pub mod session;
pub mod subscriptions;

pub use config::Config;
pub use error::{Error, Result};
pub use models::*;

/// Application name for config paths
pub const APP_NAME: &str = "mailsense";

/// Category assigned when classification is unavailable or out of range
pub const UNCATEGORIZED: &str = "Uncategorized";
