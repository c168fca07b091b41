//! Route handlers, one module per resource.

pub mod bookmarks;
pub mod chats;
pub mod likes;
pub mod messages;
pub mod poll;
