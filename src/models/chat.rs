use chrono::{ DateTime, Utc };
use serde::{ Serialize, Deserialize };
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    User,
    Assistant,
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Author::User => f.write_str("user"),
            Author::Assistant => f.write_str("assistant"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    pub author: Author,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

/// One user turn and the reply recorded for it.
#[derive(Clone, Debug, Serialize)]
pub struct ChatExchange {
    pub user: ChatMessage,
    pub reply: ChatMessage,
    /// True when `reply` is the canned apology rather than a model answer.
    pub fallback: bool,
}
