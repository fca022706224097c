//! Concurrent retrieval and classification of mailbox messages

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::classifier::ClassificationService;
use crate::error::{Error, Result};
use crate::mailbox::MailboxProvider;
use crate::models::{EnrichedMessage, MessageRecord};
use crate::UNCATEGORIZED;

/// Headers fetched for every message during enrichment.
pub const ENRICH_HEADERS: &[&str] = &["Subject", "From", "Date"];

/// Fans message retrieval out over a bounded set of in-flight requests and
/// joins the results back in input order.
pub struct RetrievalPipeline {
    mailbox: Arc<dyn MailboxProvider>,
    classifier: Arc<dyn ClassificationService>,
    max_in_flight: usize,
}

impl RetrievalPipeline {
    pub fn new(
        mailbox: Arc<dyn MailboxProvider>,
        classifier: Arc<dyn ClassificationService>,
        max_in_flight: usize,
    ) -> Self {
        Self {
            mailbox,
            classifier,
            // buffered(0) would stall the stream forever
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// List candidate message ids. `filter_query` is handed to the provider
    /// untouched.
    pub async fn list(&self, max_results: u32, filter_query: Option<&str>) -> Result<Vec<String>> {
        self.mailbox
            .list_message_ids(filter_query, max_results)
            .await
    }

    /// Fetch subject, sender, date, and snippet for one message. Headers the
    /// provider omits come back as empty strings.
    pub async fn enrich(&self, id: &str) -> Result<EnrichedMessage> {
        let metadata = self.mailbox.get_message_metadata(id, ENRICH_HEADERS).await?;
        Ok(EnrichedMessage {
            subject: metadata.header("Subject"),
            from: metadata.header("From"),
            date: metadata.header("Date"),
            snippet: metadata.snippet,
        })
    }

    /// Classify one message. Never fails: any classifier error degrades to
    /// [`UNCATEGORIZED`].
    pub async fn classify(&self, subject: &str, snippet: &str) -> String {
        match self.classifier.classify(subject, snippet).await {
            Ok(category) => category,
            Err(e) => {
                debug!("Classification degraded to {}: {}", UNCATEGORIZED, e);
                UNCATEGORIZED.to_string()
            }
        }
    }

    /// Enrich and classify every id concurrently, keeping at most
    /// `max_in_flight` requests outstanding.
    ///
    /// The output always has one record per input id, in input order. A
    /// failure on one id degrades that record alone and leaves the rest
    /// untouched.
    pub async fn run(&self, ids: &[String]) -> Vec<MessageRecord> {
        // The futures are built eagerly via Iterator::map rather than
        // Stream::map; the latter trips rustc's "Send is not general enough"
        // limitation when this future is awaited inside an axum handler.
        let fetches: Vec<_> = ids.iter().map(|id| self.build_record(id)).collect();
        stream::iter(fetches)
            .buffered(self.max_in_flight)
            .collect()
            .await
    }

    /// Like [`run`](Self::run), but returns [`Error::Cancelled`] as soon as
    /// `cancel` fires. Records completed before that point are dropped.
    pub async fn run_cancellable(
        &self,
        ids: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<MessageRecord>> {
        let mut records = Vec::with_capacity(ids.len());
        let fetches: Vec<_> = ids.iter().map(|id| self.build_record(id)).collect();
        let mut pending = stream::iter(fetches).buffered(self.max_in_flight);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                next = pending.next() => match next {
                    Some(record) => records.push(record),
                    None => return Ok(records),
                },
            }
        }
    }

    async fn build_record(&self, id: &str) -> MessageRecord {
        match self.enrich(id).await {
            Ok(meta) => {
                let category = self.classify(&meta.subject, &meta.snippet).await;
                MessageRecord::from_enriched(id, meta, category)
            }
            Err(e) => {
                warn!("Failed to enrich message {}: {}", id, e);
                MessageRecord::from_enriched(id, EnrichedMessage::default(), UNCATEGORIZED)
            }
        }
    }
}
