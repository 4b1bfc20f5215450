use std::fmt;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Stable failure kinds of the two service clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Description,
    Chat,
}

/// Normalized service failure. Only the kind is part of the contract; the
/// underlying fault is kept in the `source()` chain for diagnostics.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("description generation failed")]
    DescriptionFailed(#[source] Option<BoxError>),

    #[error("chat response failed")]
    ChatFailed(#[source] Option<BoxError>),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::DescriptionFailed(_) => ErrorKind::Description,
            ServiceError::ChatFailed(_) => ErrorKind::Chat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Upload,
    Chat,
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activity::Upload => write!(f, "image upload"),
            Activity::Chat => write!(f, "chat reply"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("failed to read the image file")]
    FileRead(#[source] BoxError),

    #[error("unsupported image type: {0}")]
    UnsupportedMediaType(String),

    #[error("{0} already in progress")]
    Busy(Activity),

    #[error(transparent)]
    Service(#[from] ServiceError),
}
