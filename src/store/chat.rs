use chrono::Utc;
use std::sync::atomic::{ AtomicU64, Ordering };
use tokio::sync::RwLock;

use crate::models::{ Author, ChatMessage };

/// Append-only chronological chat log.
pub struct ChatStore {
    messages: RwLock<Vec<ChatMessage>>,
    next_id: AtomicU64,
}

impl ChatStore {
    pub fn new() -> Self {
        Self {
            messages: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn append(&self, author: Author, text: String) -> ChatMessage {
        let mut messages = self.messages.write().await;
        let message = ChatMessage {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            author,
            text,
            sent_at: Utc::now(),
        };
        messages.push(message.clone());
        message
    }

    pub async fn all(&self) -> Vec<ChatMessage> {
        self.messages.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }
}

impl Default for ChatStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn keeps_chronological_order() {
        let store = ChatStore::new();
        assert!(store.is_empty().await);
        store.append(Author::User, "hello".into()).await;
        store.append(Author::Assistant, "hi there".into()).await;

        let all = store.all().await;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].author, Author::User);
        assert_eq!(all[1].author, Author::Assistant);
        assert!(all[0].id < all[1].id);
        assert_eq!(store.all().await, all);
    }
}
