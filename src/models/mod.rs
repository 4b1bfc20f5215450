pub mod chat;
pub mod media;
pub mod status;
pub mod timeline;
pub mod websocket;

pub use chat::{ Author, ChatExchange, ChatMessage };
pub use media::MediaType;
pub use status::Status;
pub use timeline::{ ImageRef, TimelineEntry };
