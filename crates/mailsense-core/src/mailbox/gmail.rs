//! Gmail REST implementation of the mailbox provider

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::Profile;
use crate::retry::with_retry;
use crate::session::SessionManager;

use super::{MailboxProvider, MessageHeader, MessageMetadata, ProviderRateLimiter};

const GMAIL_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

#[derive(Debug, Deserialize)]
struct ListMessagesResponse {
    messages: Option<Vec<MessageIdEntry>>,
}

#[derive(Debug, Deserialize)]
struct MessageIdEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    snippet: Option<String>,
    payload: Option<MessagePayload>,
}

#[derive(Debug, Deserialize)]
struct MessagePayload {
    headers: Option<Vec<MessageHeader>>,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

/// Gmail REST client bound to the process session.
///
/// Every call obtains a fresh bearer token from the session (so refreshes
/// take effect mid-run), then goes through the global rate limiter.
/// Transient failures are retried with backoff, except sends, which are
/// not idempotent and go out exactly once.
pub struct GmailMailbox {
    session: Arc<SessionManager>,
    client: Client,
    rate_limiter: ProviderRateLimiter,
    max_retries: u32,
}

impl GmailMailbox {
    /// Create a Gmail client over the session
    pub fn new(session: Arc<SessionManager>, rate_limit_per_second: u32, max_retries: u32) -> Self {
        Self {
            session,
            client: Client::new(),
            rate_limiter: ProviderRateLimiter::new(rate_limit_per_second),
            max_retries,
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        Err(Error::Provider { status, message })
    }
}

#[async_trait]
impl MailboxProvider for GmailMailbox {
    async fn list_message_ids(
        &self,
        query: Option<&str>,
        max_results: u32,
    ) -> Result<Vec<String>> {
        let token = self.session.access_token().await?;

        let response = with_retry("list messages", self.max_retries, || {
            let mut request = self
                .client
                .get(format!("{}/messages", GMAIL_BASE_URL))
                .query(&[("maxResults", max_results.to_string())])
                .bearer_auth(&token);
            if let Some(q) = query {
                request = request.query(&[("q", q)]);
            }
            let limiter = self.rate_limiter.clone();
            async move {
                limiter.acquire().await;
                let response = request.send().await?;
                Self::check_status(response).await
            }
        })
        .await?;

        let list: ListMessagesResponse = response.json().await?;
        let ids: Vec<String> = list
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|m| m.id)
            .collect();
        debug!("Listed {} message ids", ids.len());
        Ok(ids)
    }

    async fn get_message_metadata(
        &self,
        id: &str,
        header_names: &[&str],
    ) -> Result<MessageMetadata> {
        let token = self.session.access_token().await?;

        let response = with_retry("get message metadata", self.max_retries, || {
            let mut request = self
                .client
                .get(format!("{}/messages/{}", GMAIL_BASE_URL, id))
                .query(&[("format", "metadata")])
                .bearer_auth(&token);
            for name in header_names {
                request = request.query(&[("metadataHeaders", *name)]);
            }
            let limiter = self.rate_limiter.clone();
            async move {
                limiter.acquire().await;
                let response = request.send().await?;
                Self::check_status(response).await
            }
        })
        .await?;

        let message: MessageResponse = response.json().await?;
        Ok(MessageMetadata {
            headers: message.payload.and_then(|p| p.headers).unwrap_or_default(),
            snippet: message.snippet.unwrap_or_default(),
        })
    }

    async fn send_message(&self, raw_base64url: &str) -> Result<String> {
        let token = self.session.access_token().await?;
        self.rate_limiter.acquire().await;

        let response = self
            .client
            .post(format!("{}/messages/send", GMAIL_BASE_URL))
            .bearer_auth(&token)
            .json(&serde_json::json!({ "raw": raw_base64url }))
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let sent: SendResponse = response.json().await?;
        info!("Message sent: {}", sent.id);
        Ok(sent.id)
    }

    async fn get_profile(&self) -> Result<Profile> {
        self.session.fetch_profile().await
    }
}
