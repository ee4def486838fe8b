pub mod messages;
pub mod broadcaster;
pub mod handler;

pub use messages::{ClientMessage, WsMessage};
pub use broadcaster::Broadcaster;
pub use handler::{websocket_handler, WsState};
