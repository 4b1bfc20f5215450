use chrono::{ DateTime, Utc };
use serde::Serialize;
use std::sync::Arc;

use super::media::MediaType;

/// Handle to the bytes of an uploaded photo. The bytes stay in memory and are
/// served back through `url`.
#[derive(Clone, Debug, Serialize)]
pub struct ImageRef {
    pub media_type: MediaType,
    pub url: String,
    #[serde(skip)]
    pub bytes: Arc<[u8]>,
}

#[derive(Clone, Debug, Serialize)]
pub struct TimelineEntry {
    pub id: u64,
    pub captured_at: DateTime<Utc>,
    pub image: ImageRef,
    pub description: String,
}

pub fn image_url(id: u64) -> String {
    format!("/api/images/{}", id)
}
