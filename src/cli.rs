use clap::{Parser, Subcommand};

use crate::core::deeplink::{decode_token, LinkPayload};

#[derive(Parser)]
#[command(name = "filestore-bot")]
#[command(author, version, about = "Telegram file-store bot with shareable deep links", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Run the bot with long polling (default)
    Run,

    /// Create any missing data files and exit
    Init,

    /// Encode a link payload (`chat:message` or `batch_chat_first_last`) into a start token
    Encode {
        /// Payload to encode
        #[arg(allow_hyphen_values = true)]
        payload: String,
    },

    /// Decode a start token back into its payload
    Decode {
        /// Token from a `?start=` link
        token: String,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Output of `encode`; rejects payloads the bot would not be able to open.
pub fn encode_command(payload: &str) -> Result<String, String> {
    match LinkPayload::parse(payload.trim()) {
        Some(parsed) => Ok(parsed.token()),
        None => Err(format!("Not a link payload: {}", payload)),
    }
}

/// Output of `decode`.
pub fn decode_command(token: &str) -> Result<String, String> {
    let payload = decode_token(token).ok_or_else(|| format!("Invalid token: {}", token))?;
    match LinkPayload::parse(&payload) {
        Some(LinkPayload::Single { chat_id, message_id }) => {
            Ok(format!("{}\nchat: {}\nmessage: {}", payload, chat_id, message_id))
        }
        Some(LinkPayload::Batch {
            chat_id,
            first_message_id,
            last_message_id,
        }) => Ok(format!(
            "{}\nchat: {}\nmessages: {}..={}",
            payload, chat_id, first_message_id, last_message_id
        )),
        None => Ok(payload),
    }
}
