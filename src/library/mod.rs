//! Locally cached tracks: the filename codec and the persistent index.

pub mod cache;
pub mod codec;
pub mod track;

pub use cache::{CacheContainer, INDEX_VERSION, TrackCache};
pub use track::Track;
