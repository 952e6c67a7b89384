//! Per-guild playback sessions and the registry that owns them.

pub mod preferences;
pub mod registry;
pub mod session;
pub mod shuffle;

pub use preferences::VoicePreferences;
pub use registry::SessionRegistry;
pub use session::{Advance, Enqueued, LoopStart, Session, SessionState};
pub use shuffle::shuffle;
