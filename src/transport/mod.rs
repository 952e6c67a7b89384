pub mod link;
pub mod messages;
pub mod websocket_server;

pub use link::{ClientLink, LinkReply};
pub use messages::{IncomingMessage, OutgoingMessage};
