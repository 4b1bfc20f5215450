pub mod chat;
pub mod description;

pub use chat::ChatService;
pub use description::DescriptionService;
