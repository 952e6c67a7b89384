use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where downloaded tracks and their index live.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LibraryConfig {
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
    #[serde(default = "default_index_file")]
    pub index_file: String,
    /// Extension (and yt-dlp `--audio-format`) of cached files.
    #[serde(default = "default_audio_format")]
    pub audio_format: String,
}

impl LibraryConfig {
    pub fn index_path(&self) -> PathBuf {
        PathBuf::from(&self.cache_dir).join(&self.index_file)
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            index_file: default_index_file(),
            audio_format: default_audio_format(),
        }
    }
}

fn default_cache_dir() -> String {
    "downloadedMusic".to_string()
}

fn default_index_file() -> String {
    "index.json".to_string()
}

fn default_audio_format() -> String {
    "mp3".to_string()
}
