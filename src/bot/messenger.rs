use async_trait::async_trait;
use teloxide::prelude::*;

use crate::error::TransportError;

/// Telegram refuses longer messages.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

/// Outbound side of the Telegram channel.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), TransportError>;
}

pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), TransportError> {
        for chunk in split_message(text, TELEGRAM_MESSAGE_LIMIT) {
            self.bot.send_message(ChatId(chat_id), chunk).await?;
        }
        Ok(())
    }
}

/// Split `text` into pieces of at most `limit` UTF-16 code units (the unit
/// Telegram counts in), preferring line breaks.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = text;

    while utf16_len(rest) > limit {
        let hard = hard_cut(rest, limit);
        let cut = rest[..hard]
            .rfind('\n')
            .filter(|&i| i > 0)
            .map_or(hard, |i| i + 1);
        chunks.push(rest[..cut].to_string());
        rest = &rest[cut..];
    }

    if !rest.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

fn utf16_len(text: &str) -> usize {
    text.chars().map(char::len_utf16).sum()
}

/// Byte offset of the longest prefix that fits in `limit` code units, never empty.
fn hard_cut(text: &str, limit: usize) -> usize {
    let mut units = 0;
    for (i, c) in text.char_indices() {
        units += c.len_utf16();
        if units > limit {
            return if i == 0 { c.len_utf8() } else { i };
        }
    }
    text.len()
}
