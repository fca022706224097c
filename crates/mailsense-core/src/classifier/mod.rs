//! Email classification and drafting backed by a chat completion model

mod openai;

pub use openai::OpenAiClassifier;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::MessageRecord;

/// The closed set of categories a message can be filed under.
///
/// Anything the model returns outside this set is rejected so callers can
/// fall back to [`crate::UNCATEGORIZED`] instead of surfacing free text.
pub const CATEGORIES: &[&str] = &["Newsletter", "Offer", "Invoice", "Work", "Personal"];

/// Model-backed operations over message content.
#[async_trait]
pub trait ClassificationService: Send + Sync {
    /// Classify a single message into one of [`CATEGORIES`].
    async fn classify(&self, subject: &str, snippet: &str) -> Result<String>;

    /// Produce a short natural-language digest of a batch of records.
    async fn summarize(&self, records: &[MessageRecord]) -> Result<String>;

    /// Draft short reply suggestions for a message, typically three.
    async fn suggest_replies(&self, subject: &str, snippet: &str) -> Result<Vec<String>>;
}

/// Map a model answer onto the canonical category spelling.
///
/// Tolerates surrounding whitespace, a trailing period, and case drift.
/// Returns `None` for anything outside the closed set.
pub fn canonical_category(answer: &str) -> Option<&'static str> {
    let answer = answer.trim().trim_end_matches('.');
    CATEGORIES
        .iter()
        .find(|category| category.eq_ignore_ascii_case(answer))
        .copied()
}
