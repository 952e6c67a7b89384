pub mod errors;
pub mod logger;
pub mod reply;
pub mod types;

pub use errors::*;
pub use reply::{ReplyChannel, ReplySink};
pub use types::*;
