//! Message data structures

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Header metadata selected for one retrieved message, before classification.
///
/// All fields carry the raw header values; a header missing upstream is the
/// empty string, never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedMessage {
    /// Subject header
    pub subject: String,

    /// From header, verbatim (display name included if present)
    pub from: String,

    /// Date header, verbatim
    pub date: String,

    /// Preview snippet supplied by the provider
    pub snippet: String,
}

/// One fully processed message as returned by the retrieval pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Provider message id
    pub id: String,

    /// Subject header
    pub subject: String,

    /// From header, verbatim
    pub from: String,

    /// Date header, verbatim
    pub date: String,

    /// Preview snippet
    pub snippet: String,

    /// Assigned category; always present, "Uncategorized" when
    /// classification was unavailable
    pub category: String,
}

impl MessageRecord {
    /// Assemble a record from enriched metadata plus its category
    pub fn from_enriched(id: impl Into<String>, meta: EnrichedMessage, category: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            subject: meta.subject,
            from: meta.from,
            date: meta.date,
            snippet: meta.snippet,
            category: category.into(),
        }
    }
}

/// Request to send an email
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMailRequest {
    /// Recipient email address
    pub to: String,

    /// Email subject
    #[serde(default)]
    pub subject: String,

    /// Plain text body
    pub body: String,
}

impl SendMailRequest {
    /// Reject requests that cannot form a deliverable message.
    pub fn validate(&self) -> Result<()> {
        if self.to.trim().is_empty() {
            return Err(Error::Validation("Recipient is required".to_string()));
        }
        if self.body.trim().is_empty() {
            return Err(Error::Validation("Message body is required".to_string()));
        }
        Ok(())
    }
}

/// One subscription-related message found by the mailbox scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionHit {
    /// Provider message id
    pub id: String,

    /// Subject header
    pub subject: String,

    /// From header, verbatim
    pub from: String,

    /// Date header, verbatim
    pub date: String,
}
