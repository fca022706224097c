//! Scanning the mailbox for subscription and recurring-billing traffic

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use regex::Regex;
use tracing::{debug, warn};

use crate::error::Result;
use crate::mailbox::MailboxProvider;
use crate::models::SubscriptionHit;
use crate::pipeline::ENRICH_HEADERS;

/// Provider query that preselects likely subscription traffic.
pub const SUBSCRIPTION_QUERY: &str = "unsubscribe OR renewal OR subscription OR billing OR trial";

/// Finds messages that look like subscriptions or recurring charges.
pub struct SubscriptionScanner {
    mailbox: Arc<dyn MailboxProvider>,
    max_in_flight: usize,
}

impl SubscriptionScanner {
    pub fn new(mailbox: Arc<dyn MailboxProvider>, max_in_flight: usize) -> Self {
        Self {
            mailbox,
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// Search for subscription-like messages and keep the ones whose subject
    /// or snippet confirms the match.
    ///
    /// The provider query casts a wide net; every candidate is then checked
    /// locally before it is reported. Candidates whose metadata cannot be
    /// fetched are skipped.
    pub async fn scan(&self, max_results: u32) -> Result<Vec<SubscriptionHit>> {
        let ids = self
            .mailbox
            .list_message_ids(Some(SUBSCRIPTION_QUERY), max_results)
            .await?;
        debug!("Scanning {} candidates for subscription traits", ids.len());

        let subject_filter =
            Regex::new(r"(?i)unsubscribe|subscription|renewal|billing|trial").unwrap();
        let snippet_filter = Regex::new(r"(?i)unsubscribe").unwrap();

        // The futures are built eagerly via Iterator::map rather than
        // Stream::map; the latter trips rustc's "Send is not general enough"
        // limitation when this future is awaited inside an axum handler.
        let checks: Vec<_> = ids
            .iter()
            .map(|id| self.check_candidate(id, &subject_filter, &snippet_filter))
            .collect();
        let hits: Vec<Option<SubscriptionHit>> = stream::iter(checks)
            .buffered(self.max_in_flight)
            .collect()
            .await;

        Ok(hits.into_iter().flatten().collect())
    }

    async fn check_candidate(
        &self,
        id: &str,
        subject_filter: &Regex,
        snippet_filter: &Regex,
    ) -> Option<SubscriptionHit> {
        match self.mailbox.get_message_metadata(id, ENRICH_HEADERS).await {
            Ok(metadata) => {
                let subject = metadata.header("Subject");
                if subject_filter.is_match(&subject) || snippet_filter.is_match(&metadata.snippet)
                {
                    Some(SubscriptionHit {
                        id: id.to_string(),
                        subject,
                        from: metadata.header("From"),
                        date: metadata.header("Date"),
                    })
                } else {
                    None
                }
            }
            Err(e) => {
                warn!("Skipping candidate {} in subscription scan: {}", id, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::{HashMap, HashSet};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::error::Error;
    use crate::mailbox::{MessageHeader, MessageMetadata};
    use crate::models::Profile;

    /// Maps id -> (subject, snippet); every message comes from the same sender.
    #[derive(Default)]
    struct FakeMailbox {
        ids: Vec<String>,
        content: HashMap<String, (String, String)>,
        fail_ids: HashSet<String>,
        last_query: Mutex<Option<String>>,
    }

    impl FakeMailbox {
        fn with_messages(entries: &[(&str, &str, &str)]) -> Self {
            let mut fake = Self::default();
            for (id, subject, snippet) in entries {
                fake.ids.push(id.to_string());
                fake.content
                    .insert(id.to_string(), (subject.to_string(), snippet.to_string()));
            }
            fake
        }
    }

    #[async_trait]
    impl MailboxProvider for FakeMailbox {
        async fn list_message_ids(
            &self,
            query: Option<&str>,
            max_results: u32,
        ) -> Result<Vec<String>> {
            *self.last_query.lock() = query.map(str::to_string);
            Ok(self
                .ids
                .iter()
                .take(max_results as usize)
                .cloned()
                .collect())
        }

        async fn get_message_metadata(
            &self,
            id: &str,
            _header_names: &[&str],
        ) -> Result<MessageMetadata> {
            if self.fail_ids.contains(id) {
                return Err(Error::Provider {
                    status: 500,
                    message: format!("metadata fetch failed for {}", id),
                });
            }
            let (subject, snippet) = self.content.get(id).cloned().unwrap_or_default();
            Ok(MessageMetadata {
                headers: vec![
                    MessageHeader {
                        name: "Subject".to_string(),
                        value: subject,
                    },
                    MessageHeader {
                        name: "From".to_string(),
                        value: "billing@service.example".to_string(),
                    },
                ],
                snippet,
            })
        }

        async fn send_message(&self, _raw_base64url: &str) -> Result<String> {
            Ok("sent".to_string())
        }

        async fn get_profile(&self) -> Result<Profile> {
            Ok(Profile {
                email: "fake@example.com".to_string(),
                name: None,
                picture: None,
            })
        }
    }

    #[tokio::test]
    async fn scan_filters_candidates_locally() {
        let mailbox = Arc::new(FakeMailbox::with_messages(&[
            ("s1", "Your subscription renewal is due", "hello"),
            ("s2", "hello there", "Click here to unsubscribe from this list"),
            ("s3", "lunch tomorrow?", "see you at noon"),
        ]));
        let scanner = SubscriptionScanner::new(mailbox.clone(), 4);

        let hits = scanner.scan(50).await.unwrap();

        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2"]);
        assert_eq!(
            mailbox.last_query.lock().as_deref(),
            Some(SUBSCRIPTION_QUERY)
        );
    }

    #[tokio::test]
    async fn scan_matches_case_insensitively() {
        let mailbox = Arc::new(FakeMailbox::with_messages(&[(
            "s1",
            "UNSUBSCRIBE NOW",
            "",
        )]));
        let scanner = SubscriptionScanner::new(mailbox, 4);

        let hits = scanner.scan(50).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].subject, "UNSUBSCRIBE NOW");
        assert_eq!(hits[0].from, "billing@service.example");
    }

    #[tokio::test]
    async fn scan_skips_unfetchable_candidates() {
        let mut fake = FakeMailbox::with_messages(&[
            ("s1", "Trial expiring soon", ""),
            ("s2", "Billing statement", ""),
        ]);
        fake.fail_ids.insert("s2".to_string());
        let scanner = SubscriptionScanner::new(Arc::new(fake), 4);

        let hits = scanner.scan(50).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["s1"]);
    }
}
