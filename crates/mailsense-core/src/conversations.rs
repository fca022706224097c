//! Grouping classified records into per-correspondent conversations

use std::collections::HashMap;

use crate::models::{ConversationGroup, MessageRecord};

/// Label for records that carry no From header at all.
pub const UNKNOWN_CORRESPONDENT: &str = "Unknown";

/// Partition records by their verbatim From header.
///
/// Every record lands in exactly one group. Groups appear in order of first
/// sighting and messages inside a group keep their arrival order. The raw
/// header value is the key, so "Alice <alice@example.com>" and
/// "alice@example.com" are distinct correspondents.
pub fn group_by_correspondent(records: Vec<MessageRecord>) -> Vec<ConversationGroup> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<ConversationGroup> = Vec::new();

    for record in records {
        let correspondent = if record.from.is_empty() {
            UNKNOWN_CORRESPONDENT.to_string()
        } else {
            record.from.clone()
        };

        let slot = *index.entry(correspondent.clone()).or_insert_with(|| {
            groups.push(ConversationGroup {
                correspondent,
                messages: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].messages.push(record);
    }

    groups
}
