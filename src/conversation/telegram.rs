//! Telegram client using teloxide.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{KeyboardButton, KeyboardMarkup, KeyboardRemove, ReplyMarkup};
use tracing::warn;

use crate::conversation::reply::{KeyboardHint, OutgoingReply, ReplySink};

/// Telegram API client.
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ReplySink for TelegramClient {
    async fn send(&self, chat_id: i64, reply: OutgoingReply) -> Result<(), String> {
        let mut request = self.bot.send_message(ChatId(chat_id), reply.text);

        if let Some(markup) = reply_markup(reply.keyboard) {
            request = request.reply_markup(markup);
        }

        request.await.map(|_| ()).map_err(|e| {
            let msg = format!("Failed to send: {e}");
            warn!("{}", msg);
            msg
        })
    }
}

fn reply_markup(hint: KeyboardHint) -> Option<ReplyMarkup> {
    match hint {
        KeyboardHint::Keep => None,
        KeyboardHint::Suggest(labels) => {
            let rows = labels.into_iter().map(|label| vec![KeyboardButton::new(label)]);
            Some(ReplyMarkup::Keyboard(KeyboardMarkup::new(rows).resize_keyboard()))
        }
        KeyboardHint::Remove => Some(ReplyMarkup::KeyboardRemove(KeyboardRemove::new())),
    }
}
