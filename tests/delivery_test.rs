//! Deep-link delivery against a mocked Bot API: copy, auto-delete and the
//! force-subscribe gate.
//!
//! Run with: cargo test --test delivery_test

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, Message};
use wiremock::matchers::{body_partial_json, method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use filestore_bot::core::config;
use filestore_bot::core::deeplink::LinkPayload;
use filestore_bot::shortener::ShortenerClient;
use filestore_bot::storage::{ForceSubChannel, LinkRecord, LinkTarget, Storage};
use filestore_bot::telegram::start::DELETED_TEXT;
use filestore_bot::telegram::{force_sub, start, HandlerDeps};

const OWNER: i64 = 1;
const USER: i64 = 42;
const STORE_CHAT: i64 = -1001234;
const WARNING_ID: i32 = 500;

fn ok(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": result}))
}

fn message_json(id: i32) -> Value {
    json!({
        "message_id": id,
        "date": 1_700_000_000,
        "chat": {"id": USER, "type": "private", "first_name": "User"},
        "text": "ok"
    })
}

fn member_json(status: &str) -> Value {
    json!({
        "status": status,
        "user": {"id": USER, "is_bot": false, "first_name": "User"}
    })
}

fn api(name: &str) -> wiremock::matchers::PathRegexMatcher {
    path_regex(format!(r"(?i)/bot[^/]+/{}$", name))
}

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
            .and(api("sendmessage"))
            .respond_with(ok(message_json(WARNING_ID)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(api("editmessagetext"))
            .respond_with(ok(message_json(WARNING_ID)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(api("deletemessage"))
            .respond_with(ok(json!(true)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(api("answercallbackquery"))
            .respond_with(ok(json!(true)))
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

    /// Source messages that can be copied; each copy gets id `100 + source id`.
    async fn copyable(&self, ids: &[i32]) {
        for id in ids {
            Mock::given(method("POST"))
                .and(api("copymessage"))
                .and(body_partial_json(json!({"message_id": id})))
                .respond_with(ok(json!({"message_id": 100 + id})))
                .mount(&self.server)
                .await;
        }
    }

    async fn missing_source(&self, id: i32) {
        Mock::given(method("POST"))
            .and(api("copymessage"))
            .and(body_partial_json(json!({"message_id": id})))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: message to copy not found"
            })))
            .mount(&self.server)
            .await;
    }

    async fn store_link(&self, target: LinkTarget) -> String {
        let token = target.payload().token();
        let record = LinkRecord::new(target, OWNER);
        self.deps
            .storage
            .links
            .update(|links| links.insert(token.clone(), record))
            .await
            .unwrap();
        token
    }

    /// JSON bodies of every call to `name`, in order.
    async fn calls(&self, name: &str) -> Vec<Value> {
        let suffix = format!("/{}", name.to_lowercase());
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path().to_lowercase().ends_with(&suffix))
            .filter_map(|r| serde_json::from_slice::<Value>(&r.body).ok())
            .collect()
    }

    /// Waits (in real time) until `name` was called at least `n` times.
    async fn wait_for(&self, name: &str, n: usize) -> Vec<Value> {
        for _ in 0..300 {
            let calls = self.calls(name).await;
            if calls.len() >= n {
                return calls;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.calls(name).await
    }

    async fn start(&self, token: &str) {
        let msg = command(USER, &format!("/start {}", token));
        start::handle_start(&self.bot, &msg, &self.deps, token).await.unwrap();
    }
}

fn command(from: i64, text: &str) -> Message {
    serde_json::from_value(json!({
        "message_id": 10,
        "date": 1_700_000_000,
        "chat": {"id": from, "type": "private", "first_name": "User"},
        "from": {"id": from, "is_bot": false, "first_name": "User"},
        "text": text
    }))
    .unwrap()
}

fn try_again_query(from: i64, message_id: i32) -> CallbackQuery {
    serde_json::from_value(json!({
        "id": "cb-1",
        "from": {"id": from, "is_bot": false, "first_name": "User"},
        "chat_instance": "ci",
        "data": "fsub_try_again",
        "message": {
            "message_id": message_id,
            "date": 1_700_000_000,
            "chat": {"id": from, "type": "private", "first_name": "User"},
            "text": "join first"
        }
    }))
    .unwrap()
}

/// Fires the auto-delete job without waiting for it in real time.
async fn skip_past_auto_delete(minutes: u64) {
    tokio::time::pause();
    tokio::time::advance(config::auto_delete::delay(minutes) + Duration::from_secs(1)).await;
    tokio::time::resume();
}

fn ids(calls: &[Value], field: &str) -> Vec<i64> {
    calls.iter().filter_map(|c| c[field].as_i64()).collect()
}

#[tokio::test]
async fn test_single_link_is_copied_then_deleted() {
    let h = Harness::new().await;
    h.copyable(&[5]).await;
    h.deps
        .storage
        .settings
        .update(|s| s.protect_content = true)
        .await
        .unwrap();
    let token = h
        .store_link(LinkTarget::Single {
            chat_id: STORE_CHAT,
            message_id: 5,
        })
        .await;

    h.start(&token).await;

    let copies = h.calls("copyMessage").await;
    assert_eq!(copies.len(), 1);
    assert_eq!(copies[0]["chat_id"], json!(USER));
    assert_eq!(copies[0]["from_chat_id"], json!(STORE_CHAT));
    assert_eq!(copies[0]["protect_content"], json!(true));

    let sent = h.calls("sendMessage").await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0]["text"].as_str().unwrap().contains("deleted in <b>10 minutes</b>"));
    assert!(h.calls("deleteMessage").await.is_empty());

    skip_past_auto_delete(10).await;

    let deleted = h.wait_for("deleteMessage", 1).await;
    assert_eq!(ids(&deleted, "message_id"), vec![105]);
    let edits = h.wait_for("editMessageText", 1).await;
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0]["message_id"], json!(WARNING_ID));
    assert_eq!(edits[0]["text"], json!(DELETED_TEXT));
}

#[tokio::test]
async fn test_batch_link_skips_missing_messages() {
    let h = Harness::new().await;
    h.copyable(&[5, 7]).await;
    h.missing_source(6).await;
    let token = h.store_link(LinkTarget::batch(STORE_CHAT, 5, 7, None)).await;

    h.start(&token).await;

    assert_eq!(ids(&h.calls("copyMessage").await, "message_id"), vec![5, 6, 7]);
    assert_eq!(h.calls("sendMessage").await.len(), 1);

    skip_past_auto_delete(10).await;

    let deleted = h.wait_for("deleteMessage", 2).await;
    let mut deleted_ids = ids(&deleted, "message_id");
    deleted_ids.sort();
    assert_eq!(deleted_ids, vec![105, 107]);
}

#[tokio::test]
async fn test_auto_delete_disabled_schedules_nothing() {
    let h = Harness::new().await;
    h.copyable(&[5]).await;
    h.deps
        .storage
        .settings
        .update(|s| s.auto_delete_time = 0)
        .await
        .unwrap();
    let token = h
        .store_link(LinkTarget::Single {
            chat_id: STORE_CHAT,
            message_id: 5,
        })
        .await;

    h.start(&token).await;

    assert_eq!(h.calls("copyMessage").await.len(), 1);
    assert!(h.calls("sendMessage").await.is_empty());

    skip_past_auto_delete(config::auto_delete::DEFAULT_MINUTES).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(h.calls("deleteMessage").await.is_empty());
    assert!(h.calls("editMessageText").await.is_empty());
}

#[tokio::test]
async fn test_unknown_token_reports_missing_link() {
    let h = Harness::new().await;
    let token = LinkPayload::Single {
        chat_id: STORE_CHAT,
        message_id: 9,
    }
    .token();

    h.start(&token).await;

    assert!(h.calls("copyMessage").await.is_empty());
    let sent = h.calls("sendMessage").await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["text"], json!(start::LINK_NOT_FOUND_TEXT));
}

async fn with_force_sub_channel(h: &Harness) {
    let channel = ForceSubChannel {
        id: -1009,
        title: "Vault".to_string(),
        username: None,
        invite_link: Some("https://t.me/+vault".to_string()),
        mode: None,
        added_by: Some(OWNER),
    };
    h.deps
        .storage
        .force_sub
        .update(|c| c.add(channel))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_left_user_gets_join_message() {
    let h = Harness::new().await;
    h.copyable(&[5]).await;
    with_force_sub_channel(&h).await;
    Mock::given(method("POST"))
        .and(api("getchatmember"))
        .respond_with(ok(member_json("left")))
        .mount(&h.server)
        .await;
    let token = h
        .store_link(LinkTarget::Single {
            chat_id: STORE_CHAT,
            message_id: 5,
        })
        .await;

    h.start(&token).await;

    assert!(h.calls("copyMessage").await.is_empty());
    let sent = h.calls("sendMessage").await;
    assert_eq!(sent.len(), 1);
    let text = sent[0]["text"].as_str().unwrap();
    assert!(text.contains("Join Required Channels"));
    assert!(text.contains("• Vault"));
    assert!(sent[0]["reply_markup"].to_string().contains("https://t.me/+vault"));
    assert_eq!(h.deps.conversations.held_link(USER), Some(token));
}

#[tokio::test]
async fn test_try_again_releases_held_link_after_joining() {
    let h = Harness::new().await;
    h.copyable(&[5]).await;
    with_force_sub_channel(&h).await;
    Mock::given(method("POST"))
        .and(api("getchatmember"))
        .respond_with(ok(member_json("left")))
        .up_to_n_times(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(api("getchatmember"))
        .respond_with(ok(member_json("member")))
        .mount(&h.server)
        .await;
    let token = h
        .store_link(LinkTarget::Single {
            chat_id: STORE_CHAT,
            message_id: 5,
        })
        .await;

    h.start(&token).await;
    assert!(h.calls("copyMessage").await.is_empty());

    force_sub::on_try_again(&h.bot, &try_again_query(USER, WARNING_ID), &h.deps)
        .await
        .unwrap();

    assert_eq!(h.deps.conversations.held_link(USER), None);
    let copies = h.calls("copyMessage").await;
    assert_eq!(copies.len(), 1);
    assert_eq!(copies[0]["message_id"], json!(5));
    // the join message goes away once the gate is passed
    assert_eq!(ids(&h.calls("deleteMessage").await, "message_id"), vec![i64::from(WARNING_ID)]);
}
