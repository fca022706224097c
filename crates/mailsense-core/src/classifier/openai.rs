//! OpenAI chat completion implementation of [`ClassificationService`]

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::classifier::{canonical_category, ClassificationService};
use crate::config::ClassifierConfig;
use crate::error::{Error, Result};
use crate::models::MessageRecord;

/// Request body for the chat completions endpoint
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Response body from the chat completions endpoint
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Classifier backed by the OpenAI chat completions API.
///
/// Every failure surfaces as [`Error::ClassificationUnavailable`] so callers
/// can decide whether to degrade or report.
pub struct OpenAiClassifier {
    config: ClassifierConfig,
    client: Client,
}

impl OpenAiClassifier {
    /// Create a classifier from config, with the request timeout applied
    /// to the underlying HTTP client.
    pub fn new(config: ClassifierConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            Error::ClassificationUnavailable(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self { config, client })
    }

    /// Send one user prompt and return the first choice's content.
    async fn complete(&self, prompt: &str) -> Result<String> {
        if self.config.api_key.is_empty() {
            return Err(Error::ClassificationUnavailable(
                "No API key configured".to_string(),
            ));
        }

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self
            .client
            .post(format!(
                "{}/chat/completions",
                self.config.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                Error::ClassificationUnavailable(format!("Chat completion request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ClassificationUnavailable(format!(
                "Chat completion endpoint returned {}: {}",
                status, body
            )));
        }

        let completion: ChatResponse = response.json().await.map_err(|e| {
            Error::ClassificationUnavailable(format!("Failed to parse chat completion: {}", e))
        })?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| {
                Error::ClassificationUnavailable("Completion had no choices".to_string())
            })
    }
}

#[async_trait]
impl ClassificationService for OpenAiClassifier {
    async fn classify(&self, subject: &str, snippet: &str) -> Result<String> {
        let prompt = format!(
            "You are an AI that classifies emails into categories.\n\
             Categories: Newsletter, Offer, Invoice, Work, Personal.\n\n\
             Email:\n\
             Subject: {}\n\
             Snippet: {}\n\n\
             Return ONLY one of these categories.",
            subject, snippet
        );

        let answer = self.complete(&prompt).await?;
        debug!("Classifier answered: {}", answer.trim());

        match canonical_category(&answer) {
            Some(category) => Ok(category.to_string()),
            None => {
                warn!("Classifier returned an unknown category: {}", answer.trim());
                Err(Error::ClassificationUnavailable(format!(
                    "Unknown category: {}",
                    answer.trim()
                )))
            }
        }
    }

    async fn summarize(&self, records: &[MessageRecord]) -> Result<String> {
        let lines: Vec<String> = records
            .iter()
            .map(|record| {
                let from = if record.from.is_empty() {
                    "unknown"
                } else {
                    record.from.as_str()
                };
                format!("- [{}] {} (from {})", record.category, record.subject, from)
            })
            .collect();

        let prompt = format!(
            "You are an AI analyst summarizing mailbox activity.\n\
             You will receive a list of emails with fields: category, subject, and sender.\n\n\
             Summarize this data in a friendly, insightful way, noting how many emails\n\
             fall into each category and which senders stand out.\n\n\
             Now summarize the following emails:\n\n{}",
            lines.join("\n")
        );

        let summary = self.complete(&prompt).await?;
        Ok(summary.trim().to_string())
    }

    async fn suggest_replies(&self, subject: &str, snippet: &str) -> Result<Vec<String>> {
        let prompt = format!(
            "You are a helpful email assistant.\n\
             Generate 3 short, natural reply suggestions to the following email.\n\
             Each reply should be on a new line, friendly and relevant.\n\n\
             Email:\n\
             Subject: {}\n\
             Content: {}\n\n\
             Example format:\n\
             1. Thanks for the update! Really appreciate it.\n\
             2. Got it, I'll review and get back to you soon.\n\
             3. Sounds good! Let's move ahead.",
            subject, snippet
        );

        let answer = self.complete(&prompt).await?;
        Ok(parse_reply_list(&answer))
    }
}

/// Split a numbered-list completion into individual reply strings.
fn parse_reply_list(text: &str) -> Vec<String> {
    let splitter = Regex::new(r"\d+\.\s").unwrap();
    splitter
        .split(text)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}
