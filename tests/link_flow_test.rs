//! Deep links end to end: token minted by /genlink or /batchlink, stored,
//! then resolved again from a `/start <token>` payload.
//!
//! Run with: cargo test --test link_flow_test

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use filestore_bot::core::deeplink::{decode_token, parse_message_link, start_url, LinkPayload, MessageLink};
use filestore_bot::storage::{LinkRecord, LinkTarget, Storage};

#[tokio::test]
async fn test_batch_token_resolves_to_stored_range() {
    let dir = TempDir::new().unwrap();
    let storage = Storage::open(dir.path());

    let target = LinkTarget::batch(-1009876543210, 100, 104, Some("Files".into()));
    let token = target.payload().token();
    storage
        .links
        .update(|links| links.insert(token.clone(), LinkRecord::new(target.clone(), 7)))
        .await
        .unwrap();

    let url = start_url("@filebot", &token);
    assert_eq!(url, format!("https://t.me/filebot?start={}", token));

    let payload = decode_token(&token).unwrap();
    assert_eq!(payload, "batch_-1009876543210_100_104");
    assert_eq!(
        LinkPayload::parse(&payload),
        Some(LinkPayload::Batch {
            chat_id: -1009876543210,
            first_message_id: 100,
            last_message_id: 104,
        })
    );

    let record = storage.links.load().await.get(&token).cloned().unwrap();
    assert_eq!(record.target, target);
    assert_eq!(record.created_by, 7);
    assert!(record.created_at.is_some());
}

#[tokio::test]
async fn test_unknown_token_has_no_record() {
    let dir = TempDir::new().unwrap();
    let storage = Storage::open(dir.path());

    let token = LinkPayload::Single {
        chat_id: -1001,
        message_id: 3,
    }
    .token();
    assert!(decode_token(&token).is_some());
    assert!(storage.links.load().await.get(&token).is_none());
}

#[test]
fn test_public_channel_link_keeps_username() {
    assert_eq!(
        parse_message_link("see https://t.me/my_channel/12 for details"),
        Some(MessageLink::Public {
            username: "my_channel".to_string(),
            message_id: 12,
        })
    );
}
