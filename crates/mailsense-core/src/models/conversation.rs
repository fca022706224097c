//! Conversation grouping structures

use serde::{Deserialize, Serialize};

use super::MessageRecord;

/// Messages bucketed under one correspondent, in arrival order.
///
/// The correspondent key is the raw From header value; no address
/// normalization or display-name stripping is applied, so two formatting
/// variants of the same address form two groups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationGroup {
    /// Raw From header value, or "Unknown" when the header was empty
    pub correspondent: String,

    /// Member records, ordered as they arrived from the pipeline
    pub messages: Vec<MessageRecord>,
}
