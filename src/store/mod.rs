mod chat;
mod timeline;

pub use chat::ChatStore;
pub use timeline::TimelineStore;

use chrono::{ DateTime, Utc };
use log::debug;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::models::{ Author, ChatMessage, MediaType, Status, TimelineEntry };

const EVENT_CAPACITY: usize = 64;

#[derive(Clone, Debug)]
pub enum SessionEvent {
    TimelineAppended(TimelineEntry),
    ChatAppended(ChatMessage),
    Notice(Option<String>),
    Status(Status),
}

/// Owns the session's timeline and chat log. Mutation is append-only and
/// every append is broadcast to subscribers.
pub struct SessionStore {
    timeline: TimelineStore,
    chat: ChatStore,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionStore {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            timeline: TimelineStore::new(),
            chat: ChatStore::new(),
            events,
        })
    }

    pub fn timeline(&self) -> &TimelineStore {
        &self.timeline
    }

    pub fn chat(&self) -> &ChatStore {
        &self.chat
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn publish(&self, event: SessionEvent) {
        // An error only means nobody is listening right now.
        if self.events.send(event).is_err() {
            debug!("No session subscribers");
        }
    }

    pub async fn append_entry(
        &self,
        captured_at: DateTime<Utc>,
        media_type: MediaType,
        bytes: Arc<[u8]>,
        description: String
    ) -> TimelineEntry {
        let entry = self.timeline.append(captured_at, media_type, bytes, description).await;
        self.publish(SessionEvent::TimelineAppended(entry.clone()));
        entry
    }

    pub async fn append_message(&self, author: Author, text: String) -> ChatMessage {
        let message = self.chat.append(author, text).await;
        self.publish(SessionEvent::ChatAppended(message.clone()));
        message
    }
}
