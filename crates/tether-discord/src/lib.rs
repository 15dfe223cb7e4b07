pub mod adapter;
pub mod error;
pub mod handler;
pub mod queue;
pub mod registry;
pub mod render;
pub mod reply_context;
pub mod segment;
pub mod send;
pub mod surface;
pub mod turn;

pub use adapter::DiscordAdapter;
pub use error::DiscordError;
pub use registry::{ChatRegistry, Session};
