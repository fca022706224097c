//! User profile structures

use serde::{Deserialize, Serialize};

/// Authenticated user's profile as reported by the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Primary email address
    pub email: String,

    /// Display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Avatar URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}
