use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ToolsConfig {
    /// Searched before `PATH` when locating yt-dlp, ffmpeg and aria2c.
    #[serde(default = "default_bin_dir")]
    pub bin_dir: String,
    #[serde(default = "default_cookies_file")]
    pub cookies_file: String,
    /// Proof-of-origin token; the `YT_PO_TOKEN` environment variable wins.
    #[serde(default)]
    pub po_token: Option<String>,
    #[serde(default = "default_true")]
    pub use_aria2c: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            bin_dir: default_bin_dir(),
            cookies_file: default_cookies_file(),
            po_token: None,
            use_aria2c: true,
        }
    }
}

fn default_bin_dir() -> String {
    "bin".to_string()
}

fn default_cookies_file() -> String {
    "cookies.txt".to_string()
}

fn default_true() -> bool {
    true
}
