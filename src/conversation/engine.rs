//! Conversation controller - turns one incoming text into replies.
//!
//! There is no stored conversation state besides the saved card. Every turn
//! is classified from the message text and whether a card is saved, in a
//! fixed priority order:
//!
//! 1. `/start` shows the welcome menu. Any other `/command` is ignored.
//! 2. The saved-card button checks the saved card (only if one exists).
//! 3. Anything containing "begin" asks for a card number.
//! 4. Everything else is a candidate card number.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, info, warn};

use crate::balance::BalanceLookup;
use crate::conversation::card::CardNumber;
use crate::conversation::reply::{self, KeyboardHint, OutgoingReply, ReplySink};
use crate::conversation::session::SessionStore;

/// `/start`, optionally addressed (`/start@some_bot`) or with a payload.
static START_COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/start(@\w+)?(\s|$)").expect("start pattern is valid"));

/// A text message from a user.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub user_id: i64,
    pub chat_id: i64,
    pub text: String,
}

/// What a message asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Start,
    /// A slash command other than `/start`; gets no reply.
    UnknownCommand,
    UseSavedCard(CardNumber),
    Begin,
    CandidateCard(String),
}

/// Maps a message to exactly one intent.
pub fn classify(text: &str, saved: Option<&CardNumber>) -> Intent {
    let trimmed = text.trim();

    if START_COMMAND.is_match(trimmed) {
        return Intent::Start;
    }

    if trimmed.starts_with('/') {
        return Intent::UnknownCommand;
    }

    if let Some(card) = saved
        && is_saved_card_phrase(trimmed)
    {
        return Intent::UseSavedCard(card.clone());
    }

    if trimmed.to_lowercase().contains(reply::BEGIN_PHRASE) {
        return Intent::Begin;
    }

    Intent::CandidateCard(text.to_string())
}

fn is_saved_card_phrase(text: &str) -> bool {
    text.starts_with(reply::SAVED_CARD_MARKER)
        || text
            .to_lowercase()
            .starts_with(&reply::SAVED_CARD_PHRASE.to_lowercase())
}

pub struct Controller {
    lookup: Arc<dyn BalanceLookup>,
    sessions: Arc<dyn SessionStore>,
    replies: Arc<dyn ReplySink>,
}

impl Controller {
    pub fn new(
        lookup: Arc<dyn BalanceLookup>,
        sessions: Arc<dyn SessionStore>,
        replies: Arc<dyn ReplySink>,
    ) -> Self {
        Self { lookup, sessions, replies }
    }

    /// Handles one turn. Never fails: every outcome is a reply or silence.
    pub async fn handle(&self, msg: IncomingMessage) {
        let saved = self.sessions.saved_card(msg.user_id).await;

        match classify(&msg.text, saved.as_ref()) {
            Intent::Start => {
                info!("👋 /start from user {}", msg.user_id);
                let menu = KeyboardHint::menu(saved.as_ref());
                self.reply(msg.chat_id, OutgoingReply::with_keyboard(reply::WELCOME, menu))
                    .await;
            }
            Intent::UnknownCommand => {
                debug!("Ignoring command {:?} from user {}", msg.text.trim(), msg.user_id);
            }
            Intent::UseSavedCard(card) => {
                self.reply(msg.chat_id, OutgoingReply::text(reply::checking_saved(&card))).await;
                self.report_balance(msg.chat_id, &card).await;
            }
            Intent::Begin => {
                let ask = OutgoingReply::with_keyboard(reply::ENTER_CARD, KeyboardHint::Remove);
                self.reply(msg.chat_id, ask).await;
            }
            Intent::CandidateCard(text) => match CardNumber::parse(&text) {
                Ok(card) => {
                    info!("💳 User {} saved card {}", msg.user_id, card.masked());
                    self.sessions.save_card(msg.user_id, card.clone()).await;
                    self.reply(msg.chat_id, OutgoingReply::text(reply::CHECKING)).await;
                    self.report_balance(msg.chat_id, &card).await;
                }
                Err(e) => {
                    debug!("Rejected input from user {}: {}", msg.user_id, e);
                    self.reply(msg.chat_id, OutgoingReply::text(reply::INVALID_CARD)).await;
                }
            },
        }
    }

    async fn report_balance(&self, chat_id: i64, card: &CardNumber) {
        let balance = self.lookup.check_balance(card).await;
        let text = reply::balance_report(card, &balance);
        self.reply(chat_id, OutgoingReply::with_keyboard(text, KeyboardHint::menu(Some(card))))
            .await;
    }

    async fn reply(&self, chat_id: i64, reply: OutgoingReply) {
        if let Err(e) = self.replies.send(chat_id, reply).await {
            warn!("Reply to chat {} not delivered: {}", chat_id, e);
        }
    }
}
