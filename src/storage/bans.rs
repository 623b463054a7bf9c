//! `banned.json`

use serde::{Deserialize, Serialize};

use super::Timestamp;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BanRecord {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    pub banned_by: i64,
    pub banned_at: Timestamp,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BannedUsers(pub Vec<BanRecord>);

impl BannedUsers {
    pub fn is_banned(&self, id: i64) -> bool {
        self.0.iter().any(|b| b.id == id)
    }

    pub fn find(&self, id: i64) -> Option<&BanRecord> {
        self.0.iter().find(|b| b.id == id)
    }

    /// Returns `false` (and changes nothing) if the user is already banned.
    pub fn ban(&mut self, record: BanRecord) -> bool {
        if self.is_banned(record.id) {
            return false;
        }
        self.0.push(record);
        true
    }

    pub fn unban(&mut self, id: i64) -> Option<BanRecord> {
        let pos = self.0.iter().position(|b| b.id == id)?;
        Some(self.0.remove(pos))
    }
}
