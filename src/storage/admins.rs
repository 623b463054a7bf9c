//! `admins.json`: admin ids and optional role expiry
//!
//! Older files hold a bare list of ids; they are read as permanent admins and
//! rewritten in the object form on the next mutation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{JsonStore, Timestamp};
use crate::core::error::AppResult;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "AdminsRepr")]
pub struct AdminsFile {
    pub admins: Vec<i64>,
    #[serde(default)]
    pub expiry: BTreeMap<i64, Timestamp>,
}

// Untagged content is buffered, and buffered map keys stay strings, so the
// expiry ids are parsed by hand.
#[derive(Deserialize)]
#[serde(untagged)]
enum AdminsRepr {
    Legacy(Vec<i64>),
    Full {
        #[serde(default)]
        admins: Vec<i64>,
        #[serde(default)]
        expiry: BTreeMap<String, Timestamp>,
    },
}

impl From<AdminsRepr> for AdminsFile {
    fn from(repr: AdminsRepr) -> Self {
        match repr {
            AdminsRepr::Legacy(admins) => Self {
                admins,
                expiry: BTreeMap::new(),
            },
            AdminsRepr::Full { admins, expiry } => {
                let expiry = expiry
                    .into_iter()
                    .filter_map(|(key, ts)| match key.trim().parse::<i64>() {
                        Ok(id) => Some((id, ts)),
                        Err(_) => {
                            log::warn!("Dropping expiry with non-numeric admin id {:?}", key);
                            None
                        }
                    })
                    .collect();
                Self { admins, expiry }
            }
        }
    }
}

/// What `/promote` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromoteOutcome {
    Added,
    /// Already an admin; expiry was replaced
    Renewed,
}

impl AdminsFile {
    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admins.contains(&user_id)
    }

    /// Owner or listed admin whose role has not run out yet.
    pub fn is_authorized(&self, user_id: i64, owner_id: i64, now: DateTime<Utc>) -> bool {
        if owner_id != 0 && user_id == owner_id {
            return true;
        }
        self.is_admin(user_id) && self.expiry_of(user_id).is_none_or(|exp| exp > now)
    }

    pub fn expiry_of(&self, user_id: i64) -> Option<DateTime<Utc>> {
        self.expiry.get(&user_id).map(|ts| ts.0)
    }

    /// Adds or renews an admin. `None` makes the role permanent.
    pub fn promote(&mut self, user_id: i64, expires_at: Option<DateTime<Utc>>) -> PromoteOutcome {
        let outcome = if self.is_admin(user_id) {
            PromoteOutcome::Renewed
        } else {
            self.admins.push(user_id);
            PromoteOutcome::Added
        };
        match expires_at {
            Some(at) => {
                self.expiry.insert(user_id, Timestamp(at));
            }
            None => {
                self.expiry.remove(&user_id);
            }
        }
        outcome
    }

    /// Removes an admin and their expiry. Returns `false` if they were not one.
    pub fn demote(&mut self, user_id: i64) -> bool {
        let before = self.admins.len();
        self.admins.retain(|id| *id != user_id);
        self.expiry.remove(&user_id);
        self.admins.len() != before
    }

    /// Drops every admin whose expiry is at or before `now`.
    pub fn cleanup_expired(&mut self, now: DateTime<Utc>) -> Vec<i64> {
        let expired: Vec<i64> = self
            .expiry
            .iter()
            .filter(|(_, ts)| ts.0 <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            self.demote(*id);
        }
        expired
    }

    /// Admins with an expiry, soonest first.
    pub fn with_expiry(&self) -> Vec<(i64, DateTime<Utc>)> {
        let mut list: Vec<(i64, DateTime<Utc>)> = self.expiry.iter().map(|(id, ts)| (*id, ts.0)).collect();
        list.sort_by_key(|(_, at)| *at);
        list
    }
}

impl JsonStore<AdminsFile> {
    pub async fn is_authorized(&self, user_id: i64, owner_id: i64) -> bool {
        self.load().await.is_authorized(user_id, owner_id, Utc::now())
    }

    /// Seeds ids (from `ADMIN_IDS`) as permanent admins; existing entries are kept.
    pub async fn seed(&self, ids: &[i64]) -> AppResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.update(|file| {
            let mut added = 0;
            for id in ids {
                if !file.is_admin(*id) {
                    file.admins.push(*id);
                    added += 1;
                }
            }
            added
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_reads_legacy_list() {
        let file: AdminsFile = serde_json::from_str("[1, 2, 3]").unwrap();
        assert_eq!(file.admins, vec![1, 2, 3]);
        assert!(file.expiry.is_empty());
    }

    #[test]
    fn test_reads_object_form_with_naive_expiry() {
        let file: AdminsFile =
            serde_json::from_str(r#"{"admins": [5], "expiry": {"5": "2025-06-01T10:00:00"}}"#).unwrap();
        assert_eq!(file.expiry_of(5), Some(at(10)));
    }

    #[test]
    fn test_always_writes_object_form() {
        let mut file = AdminsFile::default();
        file.promote(7, Some(at(12)));
        let json = serde_json::to_value(&file).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"admins": [7], "expiry": {"7": "2025-06-01T12:00:00+00:00"}})
        );
    }

    #[test]
    fn test_owner_always_authorized() {
        let file = AdminsFile::default();
        assert!(file.is_authorized(99, 99, at(0)));
        assert!(!file.is_authorized(98, 99, at(0)));
        // owner id 0 means "not configured", never a match
        assert!(!file.is_authorized(0, 0, at(0)));
    }

    #[test]
    fn test_expired_admin_not_authorized() {
        let mut file = AdminsFile::default();
        file.promote(5, Some(at(10)));
        assert!(file.is_authorized(5, 1, at(9)));
        assert!(!file.is_authorized(5, 1, at(10)));
    }

    #[test]
    fn test_repromote_resets_expiry() {
        let mut file = AdminsFile::default();
        assert_eq!(file.promote(5, Some(at(10))), PromoteOutcome::Added);
        assert_eq!(file.promote(5, None), PromoteOutcome::Renewed);
        assert_eq!(file.admins, vec![5]);
        assert_eq!(file.expiry_of(5), None);
    }

    #[test]
    fn test_demote() {
        let mut file = AdminsFile::default();
        file.promote(5, Some(at(10)));
        assert!(file.demote(5));
        assert!(!file.demote(5));
        assert!(file.expiry.is_empty());
    }

    #[test]
    fn test_cleanup_expired() {
        let mut file = AdminsFile::default();
        file.promote(1, Some(at(8)));
        file.promote(2, Some(at(12)));
        file.promote(3, None);

        assert_eq!(file.cleanup_expired(at(10)), vec![1]);
        assert_eq!(file.admins, vec![2, 3]);
        assert_eq!(file.with_expiry(), vec![(2, at(12))]);
    }

    #[test]
    fn test_with_expiry_sorted() {
        let mut file = AdminsFile::default();
        file.promote(1, Some(at(12)));
        file.promote(2, Some(at(8)));
        let ids: Vec<i64> = file.with_expiry().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[tokio::test]
    async fn test_temporary_admin_survives_reload() {
        let dir = TempDir::new().unwrap();
        let store: JsonStore<AdminsFile> = JsonStore::new(dir.path().join("admins.json"));
        store.update(|f| f.promote(6, None)).await.unwrap();
        store.update(|f| f.promote(5, Some(at(18)))).await.unwrap();

        let file = store.load().await;
        assert_eq!(file.admins, vec![6, 5]);
        assert_eq!(file.expiry_of(5), Some(at(18)));

        store.update(|f| f.promote(7, None)).await.unwrap();
        let file = store.load().await;
        assert_eq!(file.admins, vec![6, 5, 7]);
        assert_eq!(file.with_expiry(), vec![(5, at(18))]);
    }

    #[test]
    fn test_skips_non_numeric_expiry_keys() {
        let file: AdminsFile = serde_json::from_str(
            r#"{"admins": [5], "expiry": {"5": "2025-06-01T10:00:00", "x": "2025-06-01T11:00:00"}}"#,
        )
        .unwrap();
        assert_eq!(file.with_expiry(), vec![(5, at(10))]);
    }

    #[tokio::test]
    async fn test_seed_keeps_existing() {
        let dir = TempDir::new().unwrap();
        let store: JsonStore<AdminsFile> = JsonStore::new(dir.path().join("admins.json"));
        store
            .update(|f| f.promote(1, Some(Utc::now() + TimeDelta::hours(1))))
            .await
            .unwrap();

        assert_eq!(store.seed(&[1, 2]).await.unwrap(), 1);
        let file = store.load().await;
        assert_eq!(file.admins, vec![1, 2]);
        assert!(file.expiry_of(1).is_some());
        assert!(store.is_authorized(2, 0).await);
    }
}
