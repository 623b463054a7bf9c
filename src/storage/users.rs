//! `users.json`: everyone who ever talked to the bot

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::{JsonStore, Timestamp};
use crate::core::error::AppResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub joined_at: Option<Timestamp>,
}

impl UserRecord {
    pub fn new(id: i64, username: Option<String>, first_name: Option<String>, last_name: Option<String>) -> Self {
        Self {
            id,
            username,
            first_name,
            last_name,
            joined_at: Some(Timestamp::now()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Users(pub Vec<UserRecord>);

impl Users {
    pub fn find(&self, id: i64) -> Option<&UserRecord> {
        self.0.iter().find(|u| u.id == id)
    }

    /// Adds the user unless the id is already present. Returns `true` when added.
    pub fn register(&mut self, user: UserRecord) -> bool {
        if self.find(user.id).is_some() {
            return false;
        }
        self.0.push(user);
        true
    }

    pub fn ids(&self) -> Vec<i64> {
        self.0.iter().map(|u| u.id).collect()
    }

    /// `(total, joined within the last 7 days)`.
    ///
    /// Records without `joined_at` count as recent.
    pub fn stats(&self, now: DateTime<Utc>) -> (usize, usize) {
        let week_ago = now - TimeDelta::days(7);
        let recent = self
            .0
            .iter()
            .filter(|u| u.joined_at.is_none_or(|ts| ts.0 > week_ago))
            .count();
        (self.0.len(), recent)
    }
}

impl JsonStore<Users> {
    /// First-contact registration. The existence check and the insert happen
    /// under the store lock, so two updates from a new user add one record.
    pub async fn register(&self, user: UserRecord) -> AppResult<bool> {
        if self.load().await.find(user.id).is_some() {
            return Ok(false);
        }
        self.update(|users| users.register(user)).await
    }
}
