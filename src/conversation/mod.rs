//! Conversation module - the card-balance dialogue with a user.

pub mod card;
pub mod engine;
pub mod reply;
pub mod session;
pub mod telegram;


pub use card::CardNumber;
pub use engine::{Controller, IncomingMessage};
pub use session::InMemorySessions;
pub use telegram::TelegramClient;
