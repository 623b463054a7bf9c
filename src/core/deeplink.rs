//! Deep-link tokens for `/start <token>` links.
//!
//! A token is the URL-safe base64 encoding (padding stripped) of a payload:
//! - single message: `"{chat_id}:{message_id}"`
//! - batch: `"batch_{chat_id}_{first_message_id}_{last_message_id}"`
//!
//! Channel ids are negative (`-100…`), so payload parsing must keep the sign.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use once_cell::sync::Lazy;
use regex::Regex;

/// Encodes a payload into a start token.
///
/// # Example
///
/// ```
/// use filestore_bot::core::deeplink::{decode_token, encode_token};
///
/// let token = encode_token("-1001:42");
/// assert!(!token.contains('='));
/// assert_eq!(decode_token(&token).as_deref(), Some("-1001:42"));
/// ```
pub fn encode_token(payload: &str) -> String {
    URL_SAFE_NO_PAD.encode(payload.as_bytes())
}

/// Decodes a start token back into its payload.
///
/// Padding is optional on input. Returns `None` when the token is not valid
/// base64 or does not decode to UTF-8.
pub fn decode_token(token: &str) -> Option<String> {
    let trimmed = token.trim().trim_end_matches('=');
    if trimmed.is_empty() {
        return None;
    }
    let bytes = URL_SAFE_NO_PAD.decode(trimmed).ok()?;
    String::from_utf8(bytes).ok()
}

/// What a deep link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPayload {
    Single {
        chat_id: i64,
        message_id: i32,
    },
    Batch {
        chat_id: i64,
        first_message_id: i32,
        last_message_id: i32,
    },
}

impl LinkPayload {
    /// Parses a decoded payload string.
    pub fn parse(payload: &str) -> Option<Self> {
        if let Some(rest) = payload.strip_prefix("batch_") {
            // chat ids may start with '-', message ids never contain '_'
            let mut parts = rest.rsplitn(3, '_');
            let last_message_id = parts.next()?.parse().ok()?;
            let first_message_id = parts.next()?.parse().ok()?;
            let chat_id = parts.next()?.parse().ok()?;
            return Some(Self::Batch {
                chat_id,
                first_message_id,
                last_message_id,
            });
        }

        let (chat, message) = payload.rsplit_once(':')?;
        Some(Self::Single {
            chat_id: chat.parse().ok()?,
            message_id: message.parse().ok()?,
        })
    }

    /// Payload string, the inverse of [`LinkPayload::parse`].
    pub fn payload(&self) -> String {
        match self {
            Self::Single { chat_id, message_id } => format!("{}:{}", chat_id, message_id),
            Self::Batch {
                chat_id,
                first_message_id,
                last_message_id,
            } => format!("batch_{}_{}_{}", chat_id, first_message_id, last_message_id),
        }
    }

    pub fn token(&self) -> String {
        encode_token(&self.payload())
    }
}

/// Public start link for a token.
pub fn start_url(bot_username: &str, token: &str) -> String {
    format!("https://t.me/{}?start={}", bot_username.trim_start_matches('@'), token)
}

/// A channel message referenced by a `t.me` link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageLink {
    /// `https://t.me/c/<internal id>/<message>`: private channel, chat id is `-100<internal id>`
    Private { chat_id: i64, message_id: i32 },
    /// `https://t.me/<username>/<message>`: public channel resolved via `@username`
    Public { username: String, message_id: i32 },
}

static PRIVATE_LINK: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?:https?://)?(?:t|telegram)\.me/c/(\d+)/(\d+)").ok());

static PUBLIC_LINK: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?:https?://)?(?:t|telegram)\.me/([A-Za-z][A-Za-z0-9_]{3,})/(\d+)").ok());

/// Extracts a channel message reference from text containing a `t.me` link.
///
/// # Example
///
/// ```
/// use filestore_bot::core::deeplink::{parse_message_link, MessageLink};
///
/// assert_eq!(
///     parse_message_link("https://t.me/c/1234567890/15"),
///     Some(MessageLink::Private { chat_id: -1001234567890, message_id: 15 })
/// );
/// ```
pub fn parse_message_link(text: &str) -> Option<MessageLink> {
    if let Some(caps) = PRIVATE_LINK.as_ref().and_then(|re| re.captures(text)) {
        let internal: i64 = caps.get(1)?.as_str().parse().ok()?;
        let message_id = caps.get(2)?.as_str().parse().ok()?;
        let chat_id = format!("-100{}", internal).parse().ok()?;
        return Some(MessageLink::Private { chat_id, message_id });
    }

    let caps = PUBLIC_LINK.as_ref().and_then(|re| re.captures(text))?;
    let username = caps.get(1)?.as_str().to_string();
    if username == "c" {
        return None;
    }
    let message_id = caps.get(2)?.as_str().parse().ok()?;
    Some(MessageLink::Public { username, message_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_token_has_no_padding() {
        // 1 and 2 byte remainders would produce '=' padding
        for payload in ["a", "ab", "abc", "-1001234:5"] {
            assert!(!encode_token(payload).contains('='), "{}", payload);
        }
    }

    #[test]
    fn test_decode_accepts_padded_tokens() {
        assert_eq!(decode_token("YQ==").as_deref(), Some("a"));
        assert_eq!(decode_token("YQ").as_deref(), Some("a"));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert_eq!(decode_token(""), None);
        assert_eq!(decode_token("!!!"), None);
        assert_eq!(decode_token("a"), None);
        // valid base64 but not UTF-8
        assert_eq!(decode_token(&URL_SAFE_NO_PAD.encode([0xff, 0xfe])), None);
    }

    #[test]
    fn test_token_is_url_safe() {
        // bytes producing '+' and '/' in the standard alphabet
        let token = encode_token("\u{3ff}\u{3ff}?>");
        assert!(!token.contains('+'));
        assert!(!token.contains('/'));
    }

    #[test]
    fn test_parse_single_payload() {
        assert_eq!(
            LinkPayload::parse("-1001234567890:42"),
            Some(LinkPayload::Single {
                chat_id: -1001234567890,
                message_id: 42
            })
        );
        assert_eq!(LinkPayload::parse("123"), None);
        assert_eq!(LinkPayload::parse("x:1"), None);
    }

    #[test]
    fn test_parse_batch_payload_with_negative_chat() {
        assert_eq!(
            LinkPayload::parse("batch_-1001234_10_25"),
            Some(LinkPayload::Batch {
                chat_id: -1001234,
                first_message_id: 10,
                last_message_id: 25
            })
        );
        assert_eq!(LinkPayload::parse("batch_-1001234_10"), None);
    }

    #[test]
    fn test_payload_token_decodes_back() {
        let payload = LinkPayload::Batch {
            chat_id: -100777,
            first_message_id: 1,
            last_message_id: 9,
        };
        let decoded = decode_token(&payload.token()).and_then(|p| LinkPayload::parse(&p));
        assert_eq!(decoded, Some(payload));
    }

    #[test]
    fn test_start_url() {
        assert_eq!(start_url("@store_bot", "abc"), "https://t.me/store_bot?start=abc");
        assert_eq!(start_url("store_bot", "abc"), "https://t.me/store_bot?start=abc");
    }

    #[test]
    fn test_parse_public_message_link() {
        assert_eq!(
            parse_message_link("look: https://t.me/my_channel/77"),
            Some(MessageLink::Public {
                username: "my_channel".to_string(),
                message_id: 77
            })
        );
    }

    #[test]
    fn test_parse_message_link_rejects_other_text() {
        assert_eq!(parse_message_link("hello"), None);
        assert_eq!(parse_message_link("https://t.me/my_channel"), None);
        assert_eq!(parse_message_link("https://t.me/c/abc/1"), None);
    }
}
