//! Per-user session storage.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::conversation::CardNumber;

/// Remembers the last valid card each user entered.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn saved_card(&self, user_id: i64) -> Option<CardNumber>;
    async fn save_card(&self, user_id: i64, card: CardNumber);
}

/// Process-local store. Everything is forgotten on restart.
#[derive(Default)]
pub struct InMemorySessions {
    cards: Mutex<HashMap<i64, CardNumber>>,
}

impl InMemorySessions {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessions {
    async fn saved_card(&self, user_id: i64) -> Option<CardNumber> {
        self.cards.lock().await.get(&user_id).cloned()
    }

    async fn save_card(&self, user_id: i64, card: CardNumber) {
        self.cards.lock().await.insert(user_id, card);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(s: &str) -> CardNumber {
        CardNumber::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_user_has_no_card() {
        let sessions = InMemorySessions::new();
        assert_eq!(sessions.saved_card(1).await, None);
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let sessions = InMemorySessions::new();
        sessions.save_card(1, card("1111111111111111")).await;
        sessions.save_card(1, card("2222222222222222")).await;
        assert_eq!(sessions.saved_card(1).await, Some(card("2222222222222222")));
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let sessions = InMemorySessions::new();
        sessions.save_card(1, card("1111111111111111")).await;
        assert_eq!(sessions.saved_card(2).await, None);
    }
}
