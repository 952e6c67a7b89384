//! External metadata, download and playlist collaborators.

use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{common::ToolError, feeder::PlaylistEntry};

pub mod binaries;
pub mod ytdlp;

pub use ytdlp::YtDlp;

/// Upstream identity of a single track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub id: String,
    pub title: String,
    pub url: String,
}

#[async_trait]
pub trait MetadataResolver: Send + Sync {
    /// Resolves a direct URL/id, or a `ytsearch1:` query to its first hit.
    async fn resolve(&self, input: &str) -> Result<Metadata, ToolError>;
}

#[async_trait]
pub trait Downloader: Send + Sync {
    /// Produces an audio file at `dest`.
    async fn download(&self, source: &str, dest: &Path) -> Result<(), ToolError>;
}

#[async_trait]
pub trait PlaylistResolver: Send + Sync {
    async fn entries(&self, url: &str) -> Result<Vec<PlaylistEntry>, ToolError>;

    /// True when `url` expands to more than one entry.
    async fn is_playlist(&self, url: &str) -> Result<bool, ToolError>;
}

/// Canonical watch URL for an upstream id.
pub fn watch_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={id}")
}

/// The three tool collaborators the command layer depends on.
#[derive(Clone)]
pub struct Toolset {
    pub resolver: Arc<dyn MetadataResolver>,
    pub downloader: Arc<dyn Downloader>,
    pub playlists: Arc<dyn PlaylistResolver>,
}

impl Toolset {
    /// Uses one value for every role.
    pub fn shared<T>(tools: Arc<T>) -> Self
    where
        T: MetadataResolver + Downloader + PlaylistResolver + 'static,
    {
        Self {
            resolver: tools.clone(),
            downloader: tools.clone(),
            playlists: tools,
        }
    }
}
