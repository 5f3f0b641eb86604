//! WebSocket endpoint: connection sessions and wire messages

mod handler;
mod message;
mod session;

pub use handler::ws_handler;
pub use message::{ClientMessage, OutboundMessage, ServerMessage};
pub use session::{CloseReason, Session, SessionState};
