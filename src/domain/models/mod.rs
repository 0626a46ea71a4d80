mod backend;
mod event;
mod message;
mod session;
mod slash_commands;
mod store;

pub use backend::*;
pub use event::*;
pub use message::*;
pub use session::*;
pub use slash_commands::*;
pub use store::*;
