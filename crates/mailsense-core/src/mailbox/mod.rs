//! Mailbox provider abstraction
//!
//! The pipeline and server consume mail through this trait; the Gmail REST
//! implementation lives in [`gmail`]. Tests substitute hand-written fakes.

mod gmail;
mod rate_limiter;

pub use gmail::GmailMailbox;
pub use rate_limiter::ProviderRateLimiter;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::Profile;

/// One raw message header as returned by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    pub name: String,
    pub value: String,
}

/// Metadata-format fetch result: the selected headers plus the snippet
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageMetadata {
    pub headers: Vec<MessageHeader>,
    pub snippet: String,
}

impl MessageMetadata {
    /// Value of the named header, compared case-insensitively; the empty
    /// string when the header is absent
    pub fn header(&self, name: &str) -> String {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.clone())
            .unwrap_or_default()
    }
}

/// External mail service consumed by the pipeline and the server
#[async_trait]
pub trait MailboxProvider: Send + Sync {
    /// List message ids; `query` is a provider-native query string passed
    /// through untouched, `max_results` bounds the count
    async fn list_message_ids(&self, query: Option<&str>, max_results: u32)
        -> Result<Vec<String>>;

    /// Fetch the named headers and the snippet for one message
    async fn get_message_metadata(
        &self,
        id: &str,
        header_names: &[&str],
    ) -> Result<MessageMetadata>;

    /// Send a raw RFC 2822 message (URL-safe base64, no padding); returns
    /// the provider's id for the sent message
    async fn send_message(&self, raw_base64url: &str) -> Result<String>;

    /// Profile of the authenticated user
    async fn get_profile(&self) -> Result<Profile>;
}

/// Assemble a plain-text RFC 2822 message and encode it for the send API
pub fn encode_raw_message(to: &str, subject: &str, body: &str) -> String {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    let mut message = format!("To: {}\r\n", to);
    message.push_str(&format!("Subject: {}\r\n", subject));
    message.push_str("MIME-Version: 1.0\r\n");
    message.push_str("Content-Type: text/plain; charset=utf-8\r\n\r\n");
    message.push_str(body);

    URL_SAFE_NO_PAD.encode(message.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let metadata = MessageMetadata {
            headers: vec![
                MessageHeader {
                    name: "Subject".to_string(),
                    value: "Quarterly report".to_string(),
                },
                MessageHeader {
                    name: "FROM".to_string(),
                    value: "Ana <ana@example.com>".to_string(),
                },
            ],
            snippet: String::new(),
        };

        assert_eq!(metadata.header("subject"), "Quarterly report");
        assert_eq!(metadata.header("From"), "Ana <ana@example.com>");
        assert_eq!(metadata.header("Date"), "");
    }

    #[test]
    fn test_encode_raw_message_layout() {
        let encoded = encode_raw_message("sam@example.com", "Hello", "See you at 4.");
        assert!(!encoded.contains('='));

        let decoded = String::from_utf8(URL_SAFE_NO_PAD.decode(&encoded).unwrap()).unwrap();
        assert!(decoded.starts_with("To: sam@example.com\r\n"));
        assert!(decoded.contains("Subject: Hello\r\n"));
        assert!(decoded.contains("Content-Type: text/plain; charset=utf-8\r\n\r\n"));
        assert!(decoded.ends_with("See you at 4."));
    }
}
