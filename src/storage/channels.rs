//! `force_sub.json`: channels a user must join before files are delivered

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForceSubChannel {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub invite_link: Option<String>,
    /// Reserved for join-request channels; only "direct" is produced today
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub added_by: Option<i64>,
}

impl ForceSubChannel {
    /// Link for the join button: invite link, else `t.me/<username>`,
    /// else `t.me/c/<id without the -100 prefix>`.
    ///
    /// # Example
    ///
    /// ```
    /// use filestore_bot::storage::ForceSubChannel;
    ///
    /// let channel = ForceSubChannel {
    ///     id: -1001234567890,
    ///     title: "Updates".to_string(),
    ///     username: None,
    ///     invite_link: None,
    ///     mode: None,
    ///     added_by: None,
    /// };
    /// assert_eq!(channel.join_url(), "https://t.me/c/1234567890");
    /// ```
    pub fn join_url(&self) -> String {
        if let Some(link) = self.invite_link.as_deref().filter(|l| !l.is_empty()) {
            return link.to_string();
        }
        if let Some(username) = self.username.as_deref().filter(|u| !u.is_empty()) {
            return format!("https://t.me/{}", username.trim_start_matches('@'));
        }
        let id = self.id.to_string();
        let internal = id.strip_prefix("-100").unwrap_or_else(|| id.trim_start_matches('-'));
        format!("https://t.me/c/{}", internal)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ForceSubChannels(pub Vec<ForceSubChannel>);

impl ForceSubChannels {
    pub fn contains(&self, id: i64) -> bool {
        self.0.iter().any(|c| c.id == id)
    }

    /// Returns `false` when the channel is already listed.
    pub fn add(&mut self, channel: ForceSubChannel) -> bool {
        if self.contains(channel.id) {
            return false;
        }
        self.0.push(channel);
        true
    }

    pub fn remove(&mut self, id: i64) -> Option<ForceSubChannel> {
        let pos = self.0.iter().position(|c| c.id == id)?;
        Some(self.0.remove(pos))
    }

    pub fn list(&self) -> &[ForceSubChannel] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn channel(id: i64, username: Option<&str>, invite: Option<&str>) -> ForceSubChannel {
        ForceSubChannel {
            id,
            title: format!("chan{}", id),
            username: username.map(str::to_string),
            invite_link: invite.map(str::to_string),
            mode: None,
            added_by: Some(1),
        }
    }

    #[test]
    fn test_join_url_fallback_chain() {
        assert_eq!(
            channel(-1001, Some("news"), Some("https://t.me/+abc")).join_url(),
            "https://t.me/+abc"
        );
        assert_eq!(channel(-1001, Some("news"), None).join_url(), "https://t.me/news");
        assert_eq!(channel(-1001, Some("news"), Some("")).join_url(), "https://t.me/news");
        assert_eq!(channel(-100777, None, None).join_url(), "https://t.me/c/777");
    }

    #[test]
    fn test_add_rejects_duplicates_and_remove() {
        let mut channels = ForceSubChannels::default();
        assert!(channels.add(channel(-1001, None, None)));
        assert!(!channels.add(channel(-1001, Some("x"), None)));
        assert_eq!(channels.list().len(), 1);

        assert_eq!(channels.remove(-1001).map(|c| c.title), Some("chan-1001".to_string()));
        assert!(channels.remove(-1001).is_none());
        assert!(channels.is_empty());
    }

    #[test]
    fn test_reads_record_without_optional_fields() {
        let channels: ForceSubChannels =
            serde_json::from_str(r#"[{"id": -1005, "title": "T", "invite_link": null, "username": null}]"#).unwrap();
        assert!(channels.contains(-1005));
    }
}
