//! Outgoing replies and the fixed texts the bot speaks.

use async_trait::async_trait;

use crate::balance::BalanceResult;
use crate::conversation::CardNumber;

pub const WELCOME: &str = "👋 Welcome!\n\
    Press «Begin» to enter a new card, or pick your saved card to see its balance.";
pub const ENTER_CARD: &str = "Enter your 16-digit card number.";
pub const INVALID_CARD: &str = "❌ Please enter a valid 16-digit card number.";
pub const CHECKING: &str = "🔎 Checking, please wait…";

/// Leading marker of the saved-card button.
pub const SAVED_CARD_MARKER: &str = "💳";
pub const SAVED_CARD_PHRASE: &str = "Use saved card";
pub const BEGIN_LABEL: &str = "▶️ Begin";
/// Matched case-insensitively anywhere in the text.
pub const BEGIN_PHRASE: &str = "begin";

pub fn saved_card_label(card: &CardNumber) -> String {
    format!("{SAVED_CARD_MARKER} {SAVED_CARD_PHRASE} ({card})")
}

pub fn checking_saved(card: &CardNumber) -> String {
    format!("🔎 Checking the balance of card {card}…")
}

pub fn balance_report(card: &CardNumber, balance: &BalanceResult) -> String {
    format!("Card: {card}\nBalance: {balance}")
}

/// What should happen to the user's reply keyboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyboardHint {
    /// Leave whatever keyboard the client shows.
    Keep,
    /// Replace it with these buttons, one per row.
    Suggest(Vec<String>),
    /// Hide it so the user types free text.
    Remove,
}

impl KeyboardHint {
    /// Saved-card button (when there is one) above the begin button.
    pub fn menu(saved: Option<&CardNumber>) -> Self {
        let mut labels = Vec::with_capacity(2);
        if let Some(card) = saved {
            labels.push(saved_card_label(card));
        }
        labels.push(BEGIN_LABEL.to_string());
        KeyboardHint::Suggest(labels)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingReply {
    pub text: String,
    pub keyboard: KeyboardHint,
}

impl OutgoingReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), keyboard: KeyboardHint::Keep }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: KeyboardHint) -> Self {
        Self { text: text.into(), keyboard }
    }
}

/// Delivers replies to a chat.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send(&self, chat_id: i64, reply: OutgoingReply) -> Result<(), String>;
}
