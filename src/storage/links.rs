//! `links.json`: deep-link token → stored message or message range

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Timestamp;
use crate::core::deeplink::LinkPayload;

/// The `"type": "batch"` discriminator of batch records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchMarker {
    Batch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LinkTarget {
    Batch {
        #[serde(rename = "type")]
        kind: BatchMarker,
        chat_id: i64,
        first_message_id: i32,
        last_message_id: i32,
        #[serde(default)]
        total_messages: i32,
        #[serde(default)]
        channel_title: Option<String>,
    },
    Single {
        chat_id: i64,
        message_id: i32,
    },
}

impl LinkTarget {
    pub fn batch(chat_id: i64, first_message_id: i32, last_message_id: i32, channel_title: Option<String>) -> Self {
        Self::Batch {
            kind: BatchMarker::Batch,
            chat_id,
            first_message_id,
            last_message_id,
            total_messages: last_message_id - first_message_id + 1,
            channel_title,
        }
    }

    pub fn payload(&self) -> LinkPayload {
        match self {
            Self::Single { chat_id, message_id } => LinkPayload::Single {
                chat_id: *chat_id,
                message_id: *message_id,
            },
            Self::Batch {
                chat_id,
                first_message_id,
                last_message_id,
                ..
            } => LinkPayload::Batch {
                chat_id: *chat_id,
                first_message_id: *first_message_id,
                last_message_id: *last_message_id,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    #[serde(flatten)]
    pub target: LinkTarget,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    #[serde(default)]
    pub created_by: i64,
}

impl LinkRecord {
    pub fn new(target: LinkTarget, created_by: i64) -> Self {
        Self {
            target,
            created_at: Some(Timestamp::now()),
            created_by,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Links(pub BTreeMap<String, LinkRecord>);

impl Links {
    pub fn get(&self, token: &str) -> Option<&LinkRecord> {
        self.0.get(token)
    }

    pub fn insert(&mut self, token: String, record: LinkRecord) {
        self.0.insert(token, record);
    }

    pub fn contains(&self, token: &str) -> bool {
        self.0.contains_key(token)
    }
}
