use serde::{ Serialize, Deserialize };

use super::chat::ChatMessage;
use super::status::Status;
use super::timeline::TimelineEntry;

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "chat")] Chat {
        content: String,
    },
    #[serde(rename = "dismiss_notice")]
    DismissNotice,
}

#[derive(Serialize, Debug)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "snapshot")] Snapshot {
        feed: Vec<TimelineEntry>,
        chat: Vec<ChatMessage>,
        status: Status,
        notice: Option<String>,
    },
    #[serde(rename = "timeline_entry")] TimelineEntry {
        entry: TimelineEntry,
    },
    #[serde(rename = "chat_message")] ChatMessage {
        message: ChatMessage,
    },
    #[serde(rename = "notice")] Notice {
        message: Option<String>,
    },
    #[serde(rename = "status")] Status {
        uploading: bool,
        replying: bool,
    },
    #[serde(rename = "error")] Error {
        message: String,
    },
}
