//! Command handlers against a mocked Bot API
//!
//! Run with: cargo test --test handlers_test

use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::TempDir;
use teloxide::prelude::*;
use teloxide::types::Message;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use filestore_bot::shortener::ShortenerClient;
use filestore_bot::storage::{Storage, UserRecord};
use filestore_bot::telegram::handlers::types::NOT_AUTHORIZED_TEXT;
use filestore_bot::telegram::{admin, ban, users, HandlerDeps};

const OWNER: i64 = 1;
const STRANGER: i64 = 2;

struct Harness {
    _dir: TempDir,
    server: MockServer,
    bot: Bot,
    deps: HandlerDeps,
}

impl Harness {
    async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(dir.path()));
        storage.init_files().await.unwrap();

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"(?i)/bot[^/]+/sendmessage$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {
                    "message_id": 500,
                    "date": 1_700_000_000,
                    "chat": {"id": OWNER, "type": "private", "first_name": "Owner"},
                    "text": "ok"
                }
            })))
            .mount(&server)
            .await;

        let bot = Bot::new("123456:TEST").set_api_url(url::Url::parse(&server.uri()).unwrap());
        let deps = HandlerDeps::new(
            storage,
            Arc::new(ShortenerClient::new().unwrap()),
            "filebot".to_string(),
            UserId(999),
            OWNER,
        );
        Self {
            _dir: dir,
            server,
            bot,
            deps,
        }
    }

    /// Texts of every sendMessage call, in order.
    async fn sent_texts(&self) -> Vec<String> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path().to_lowercase().ends_with("/sendmessage"))
            .filter_map(|r| serde_json::from_slice::<Value>(&r.body).ok())
            .filter_map(|body| body["text"].as_str().map(str::to_string))
            .collect()
    }
}

fn command(from: i64, text: &str) -> Message {
    serde_json::from_value(json!({
        "message_id": 10,
        "date": 1_700_000_000,
        "chat": {"id": from, "type": "private", "first_name": "Someone"},
        "from": {"id": from, "is_bot": false, "first_name": "Someone"},
        "text": text
    }))
    .unwrap()
}

#[tokio::test]
async fn test_users_refuses_non_admin() {
    let h = Harness::new().await;

    users::handle_users(&h.bot, &command(STRANGER, "/users"), &h.deps)
        .await
        .unwrap();

    assert_eq!(h.sent_texts().await, vec![NOT_AUTHORIZED_TEXT.to_string()]);
}

#[tokio::test]
async fn test_users_reports_counts_to_owner() {
    let h = Harness::new().await;
    for id in [10, 11, 12] {
        h.deps
            .storage
            .users
            .register(UserRecord::new(id, None, Some(format!("U{}", id)), None))
            .await
            .unwrap();
    }

    users::handle_users(&h.bot, &command(OWNER, "/users"), &h.deps)
        .await
        .unwrap();

    let texts = h.sent_texts().await;
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("<b>Total Users:</b> <code>3</code>"));
}

#[tokio::test]
async fn test_ban_persists_and_confirms() {
    let h = Harness::new().await;
    h.deps
        .storage
        .users
        .register(UserRecord::new(55, Some("spammer".into()), Some("Spam".into()), None))
        .await
        .unwrap();

    ban::handle_ban(&h.bot, &command(OWNER, "/ban 55"), &h.deps, "55")
        .await
        .unwrap();

    assert!(h.deps.storage.banned.load().await.is_banned(55));
    let texts = h.sent_texts().await;
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("User banned successfully"));
    assert!(texts[0].contains("@spammer"));

    ban::handle_unban(&h.bot, &command(OWNER, "/unban 55"), &h.deps, "55")
        .await
        .unwrap();
    assert!(!h.deps.storage.banned.load().await.is_banned(55));
}

#[tokio::test]
async fn test_admin_cannot_ban_the_owner() {
    let h = Harness::new().await;
    h.deps.storage.admins.seed(&[10]).await.unwrap();

    ban::handle_ban(&h.bot, &command(10, "/ban 1"), &h.deps, "1")
        .await
        .unwrap();

    assert!(!h.deps.storage.banned.load().await.is_banned(OWNER));
    assert_eq!(
        h.sent_texts().await,
        vec!["❌ You cannot ban the bot owner!".to_string()]
    );
}

#[tokio::test]
async fn test_promote_rejects_duration_past_the_calendar() {
    let h = Harness::new().await;

    admin::handle_promote(&h.bot, &command(OWNER, "/promote 42 1000000y"), &h.deps, "42 1000000y")
        .await
        .unwrap();

    let admins = h.deps.storage.admins.load().await;
    assert!(!admins.is_admin(42));
    let texts = h.sent_texts().await;
    assert_eq!(texts.len(), 1);
    assert!(texts[0].starts_with("Invalid duration."));
}

#[tokio::test]
async fn test_temporary_promotion_is_persisted() {
    let h = Harness::new().await;
    h.deps.storage.admins.seed(&[10]).await.unwrap();

    admin::handle_promote(&h.bot, &command(OWNER, "/promote 42 6h"), &h.deps, "42 6h")
        .await
        .unwrap();

    let admins = h.deps.storage.admins.load().await;
    assert_eq!(admins.admins, vec![10, 42]);
    assert!(admins.expiry_of(42).is_some());
    assert!(h.deps.admin_timers.contains(&42));
    assert!(h.sent_texts().await[0].contains("Admin Promoted Successfully"));
    h.deps.shutdown_timers();
}
