use std::{
    path::{Path, PathBuf},
    process::Stdio,
};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error, warn};

use super::{Downloader, Metadata, MetadataResolver, PlaylistResolver, binaries, watch_url};
use crate::{
    common::ToolError,
    configs::{LibraryConfig, ToolsConfig},
    feeder::PlaylistEntry,
};

const PROGRAM: &str = "yt-dlp";

/// One line per video: id, a tab, then the title.
const METADATA_TEMPLATE: &str = "%(id)s\t%(title)s";

/// `yt-dlp` backed implementation of every tool collaborator.
pub struct YtDlp {
    program: PathBuf,
    ffmpeg: Option<PathBuf>,
    aria2c: Option<PathBuf>,
    cookies_file: PathBuf,
    po_token: Option<String>,
    audio_format: String,
}

impl YtDlp {
    /// Locates yt-dlp (required), ffmpeg and aria2c (optional).
    pub fn discover(tools: &ToolsConfig, library: &LibraryConfig) -> Result<Self, ToolError> {
        let bin_dir = Path::new(&tools.bin_dir);
        let program = binaries::resolve_binary("yt-dlp", bin_dir)
            .or_else(|| binaries::resolve_binary("yt_dlp", bin_dir))
            .ok_or_else(|| ToolError::Spawn {
                program: PROGRAM.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("add it to PATH or place it in {}", bin_dir.display()),
                ),
            })?;

        let ffmpeg = binaries::resolve_binary("ffmpeg", bin_dir);
        if ffmpeg.is_none() {
            warn!("ffmpeg not found; audio extraction may fail");
        }
        let aria2c = tools
            .use_aria2c
            .then(|| binaries::resolve_binary("aria2c", bin_dir))
            .flatten();

        let po_token = std::env::var("YT_PO_TOKEN")
            .ok()
            .or_else(|| tools.po_token.clone())
            .filter(|t| !t.is_empty());

        Ok(Self {
            program,
            ffmpeg,
            aria2c,
            cookies_file: PathBuf::from(&tools.cookies_file),
            po_token,
            audio_format: library.audio_format.clone(),
        })
    }

    fn has_cookies(&self) -> bool {
        std::fs::metadata(&self.cookies_file)
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false)
    }

    fn download_args(&self, source: &str, dest: &Path, has_cookies: bool) -> Vec<String> {
        let mut args = vec!["--newline".to_string()];

        if let Some(aria2c) = &self.aria2c {
            debug!("using aria2c at {}", aria2c.display());
            args.extend([
                "--downloader".into(),
                "aria2c".into(),
                "--downloader-args".into(),
                "aria2c:-x 16 -k 1M".into(),
            ]);
        }
        if let Some(ffmpeg) = &self.ffmpeg {
            let location = ffmpeg.parent().unwrap_or(ffmpeg.as_path());
            args.extend(["--ffmpeg-location".into(), location.display().to_string()]);
        }

        let client = if has_cookies { "mweb" } else { "ios" };
        let extractor = match (&self.po_token, has_cookies) {
            (Some(token), true) => {
                format!("youtube:player_client={client};po_token={client}.gvs+{token}")
            }
            _ => format!("youtube:player_client={client}"),
        };

        args.extend([
            "--no-playlist".into(),
            "--force-ipv4".into(),
            "--js-runtimes".into(),
            "node".into(),
            "--extractor-args".into(),
            extractor,
            "-f".into(),
            "ba/bestaudio/best".into(),
            "-x".into(),
            "--audio-format".into(),
            self.audio_format.clone(),
            "-o".into(),
            dest.display().to_string(),
            source.to_string(),
        ]);

        if has_cookies {
            args.extend(["--cookies".into(), self.cookies_file.display().to_string()]);
        }
        args
    }

    /// Runs yt-dlp to completion and returns stdout. Non-zero exit is an error
    /// carrying both captured streams.
    async fn run(&self, args: &[String]) -> Result<String, ToolError> {
        debug!("{} {}", self.program.display(), args.join(" "));
        let output = Command::new(&self.program)
            .args(args)
            .env("PYTHONIOENCODING", "utf-8")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| ToolError::Spawn {
                program: PROGRAM.to_string(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            Ok(stdout)
        } else {
            Err(ToolError::Exit {
                program: PROGRAM.to_string(),
                code: output.status.code(),
                stdout,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }
}

/// Parses the `id<TAB>title` line printed by [`METADATA_TEMPLATE`].
fn parse_metadata(stdout: &str) -> Result<Metadata, ToolError> {
    let line = stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default();
    let (id, title) = line.split_once('\t').unwrap_or((line, ""));
    let (id, title) = (id.trim().to_string(), title.trim().to_string());

    if id.is_empty() {
        return Err(ToolError::Output {
            program: PROGRAM.to_string(),
            detail: "no id printed".to_string(),
        });
    }
    Ok(Metadata {
        url: watch_url(&id),
        title: if title.is_empty() { id.clone() } else { title },
        id,
    })
}

/// One `id<TAB>title` line per entry.
fn parse_playlist(stdout: &str) -> Vec<PlaylistEntry> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let (id, title) = line.split_once('\t').unwrap_or((line, ""));
            let id = id.trim().to_string();
            PlaylistEntry {
                url: watch_url(&id),
                title: title.trim().to_string(),
                id,
            }
        })
        .collect()
}

#[async_trait]
impl MetadataResolver for YtDlp {
    async fn resolve(&self, input: &str) -> Result<Metadata, ToolError> {
        let args = [
            "--no-playlist",
            "--flat-playlist",
            "--print",
            METADATA_TEMPLATE,
            "--encoding",
            "utf-8",
            input,
        ]
        .map(String::from);
        parse_metadata(&self.run(&args).await?)
    }
}

#[async_trait]
impl Downloader for YtDlp {
    async fn download(&self, source: &str, dest: &Path) -> Result<(), ToolError> {
        let args = self.download_args(source, dest, self.has_cookies());
        match self.run(&args).await {
            Ok(_) => Ok(()),
            Err(e) => {
                if let ToolError::Exit { stdout, stderr, .. } = &e {
                    error!(
                        "Download of {source} failed: {e}\n----- STDERR -----\n{}\n----- STDOUT -----\n{}",
                        stderr.trim(),
                        stdout.trim()
                    );
                } else {
                    error!("Download of {source} failed: {e}");
                }
                Err(e)
            }
        }
    }
}

#[async_trait]
impl PlaylistResolver for YtDlp {
    async fn entries(&self, url: &str) -> Result<Vec<PlaylistEntry>, ToolError> {
        let args = [
            "--flat-playlist",
            "--encoding",
            "utf-8",
            "--print",
            METADATA_TEMPLATE,
            url,
        ]
        .map(String::from);
        Ok(parse_playlist(&self.run(&args).await?))
    }

    async fn is_playlist(&self, url: &str) -> Result<bool, ToolError> {
        let args = ["--flat-playlist", "--print", "%(id)s", url].map(String::from);
        match self.run(&args).await {
            Ok(stdout) => Ok(stdout.lines().filter(|l| !l.trim().is_empty()).count() > 1),
            Err(ToolError::Exit { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
