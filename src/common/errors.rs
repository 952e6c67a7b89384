use thiserror::Error;

use crate::common::types::VoiceTarget;

/// Upper bound for diagnostic output echoed back to a reply channel.
pub const DIAGNOSTIC_EXCERPT_LIMIT: usize = 1800;

/// Failure of an external tool process (yt-dlp and friends).
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with code {}", display_code(.code))]
    Exit {
        program: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    #[error("unexpected output from {program}: {detail}")]
    Output { program: String, detail: String },
}

impl ToolError {
    /// Process exit code, if the process ran and exited normally.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Exit { code, .. } => *code,
            _ => None,
        }
    }

    /// Captured stderr, empty for failures that never produced output.
    pub fn stderr(&self) -> &str {
        match self {
            Self::Exit { stderr, .. } => stderr,
            _ => "",
        }
    }
}

fn display_code(code: &Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "unknown (terminated by signal)".to_string())
}

fn tool_code(err: &ToolError) -> String {
    display_code(&err.exit_code())
}

/// Truncates `text` to at most `limit` bytes without splitting a character.
pub fn bounded_excerpt(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("voice connection to {target} failed: {reason}")]
    Failed { target: VoiceTarget, reason: String },
}

#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("reply channel is closed")]
    Closed,
}

/// Persistence failures of the track index. Logged, never surfaced.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("index I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("index is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// User-facing command failures. The `Display` text is what the requester sees.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("⚠️ Metadata error: {0}")]
    Resolution(#[source] ToolError),
    #[error("❌ **Download failed.** (code {})", tool_code(.0))]
    Download(#[source] ToolError),
    #[error("❌ There has been an error while fetching the playlist.")]
    Playlist(#[source] ToolError),
    #[error(
        "⚠️ No voice channel is connected yet. Join a voice channel on a server and run !bind there, \
         or run this command there. (Alternative: !use <guildId> <channelId> in DM)"
    )]
    NoTargetChannel,
    #[error("⚠️ Join a voice channel first.")]
    NotInVoice,
    #[error("⚠️ Run this command while in a voice channel of a server.")]
    BindOutsideGuild,
    #[error("❌ Server or voice channel not found (the bot must be on that server).")]
    UnknownTarget,
    #[error("❌ Could not join the voice channel: {0}")]
    Connect(#[from] ConnectError),
    #[error("⚠️ There are no sessions.")]
    NoSession,
    #[error("⚠️ Nothing to skip.")]
    NothingToSkip,
    #[error("ℹ️ There are no songs in the cache to play. Play some songs first to fill it.")]
    EmptyCache,
    #[error("Error! Unknown format.\nExpected format: {0}")]
    Usage(&'static str),
}

impl CommandError {
    /// Extra diagnostic lines sent after the headline, if any.
    pub fn diagnostic(&self) -> Option<String> {
        match self {
            Self::Download(err) if !err.stderr().is_empty() => Some(format!(
                "```{}```",
                bounded_excerpt(err.stderr(), DIAGNOSTIC_EXCERPT_LIMIT)
            )),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_respects_char_boundaries() {
        let text = "ééééé";
        assert_eq!(bounded_excerpt(text, 3), "é");
        assert_eq!(bounded_excerpt(text, 100), text);
    }

    #[test]
    fn download_error_carries_code_and_bounded_stderr() {
        let err = CommandError::Download(ToolError::Exit {
            program: "yt-dlp".into(),
            code: Some(1),
            stdout: String::new(),
            stderr: "x".repeat(5000),
        });
        assert_eq!(err.to_string(), "❌ **Download failed.** (code 1)");
        let diag = err.diagnostic().expect("stderr should produce a diagnostic");
        assert_eq!(diag.len(), DIAGNOSTIC_EXCERPT_LIMIT + 6);
    }

    #[test]
    fn download_error_without_stderr_has_no_diagnostic() {
        let err = CommandError::Download(ToolError::Exit {
            program: "yt-dlp".into(),
            code: None,
            stdout: "partial".into(),
            stderr: String::new(),
        });
        assert!(err.diagnostic().is_none());
        assert!(err.to_string().contains("unknown"));
    }
}
