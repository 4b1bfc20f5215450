use chrono::{ DateTime, Utc };
use std::sync::atomic::{ AtomicU64, Ordering };
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::timeline::image_url;
use crate::models::{ ImageRef, MediaType, TimelineEntry };

/// Append-only, insertion-ordered record of described photos.
pub struct TimelineStore {
    entries: RwLock<Vec<TimelineEntry>>,
    next_id: AtomicU64,
}

impl TimelineStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn append(
        &self,
        captured_at: DateTime<Utc>,
        media_type: MediaType,
        bytes: Arc<[u8]>,
        description: String
    ) -> TimelineEntry {
        let mut entries = self.entries.write().await;
        // Allocated under the write lock so ids follow store order.
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = TimelineEntry {
            id,
            captured_at,
            image: ImageRef {
                media_type,
                url: image_url(id),
                bytes,
            },
            description,
        };
        entries.push(entry.clone());
        entry
    }

    /// Entries in the order they were appended.
    pub async fn all(&self) -> Vec<TimelineEntry> {
        self.entries.read().await.clone()
    }

    /// Entries newest first, the order the feed is displayed in.
    pub async fn feed(&self) -> Vec<TimelineEntry> {
        self.entries.read().await.iter().rev().cloned().collect()
    }

    pub async fn image(&self, id: u64) -> Option<ImageRef> {
        self.entries
            .read().await
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| entry.image.clone())
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for TimelineStore {
    fn default() -> Self {
        Self::new()
    }
}
