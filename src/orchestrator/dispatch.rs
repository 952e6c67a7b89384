//! Text command parsing and the top-level handler.

use std::sync::Arc;

use tracing::{Instrument, debug, error, info_span, warn};

use super::{CommandContext, Orchestrator, report};
use crate::common::{ChannelId, CommandError, GuildId};

const UNEXPECTED: &str = "⚠️ An unexpected error occurred.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Play(String),
    Cache { enable: bool },
    Playlist(String),
    Queue,
    NowPlaying,
    Skip,
    Stop,
    Pause,
    Resume,
    Bind,
    Unbind,
    Use { guild_id: GuildId, channel_id: ChannelId },
}

impl Command {
    /// `None` for text that is not addressed to the bot.
    pub fn parse(content: &str) -> Option<Result<Self, CommandError>> {
        let content = content.trim();
        let (head, rest) = content
            .split_once(char::is_whitespace)
            .map(|(h, r)| (h, r.trim()))
            .unwrap_or((content, ""));

        let command = match head {
            "!play" if rest.is_empty() => Err(CommandError::Usage("!play <song or URL>")),
            "!play" => Ok(Self::Play(rest.to_string())),
            "!cache" => Ok(Self::Cache {
                enable: !rest
                    .split_whitespace()
                    .next()
                    .is_some_and(|arg| arg.eq_ignore_ascii_case("off")),
            }),
            "!playlist" if rest.is_empty() => Err(CommandError::Usage("!playlist <url>")),
            "!playlist" => Ok(Self::Playlist(rest.to_string())),
            "!queue" => Ok(Self::Queue),
            "!np" | "!nowplaying" => Ok(Self::NowPlaying),
            "!skip" => Ok(Self::Skip),
            "!stop" => Ok(Self::Stop),
            "!pause" => Ok(Self::Pause),
            "!resume" => Ok(Self::Resume),
            "!bind" => Ok(Self::Bind),
            "!unbind" => Ok(Self::Unbind),
            "!use" => match rest.split_whitespace().collect::<Vec<_>>()[..] {
                [guild_id, channel_id] => Ok(Self::Use {
                    guild_id: guild_id.into(),
                    channel_id: channel_id.into(),
                }),
                _ => Err(CommandError::Usage("!use <guildId> <channelId>")),
            },
            _ => return None,
        };
        Some(command)
    }
}

impl Orchestrator {
    pub async fn execute(self: &Arc<Self>, ctx: &CommandContext, command: Command) -> Result<(), CommandError> {
        match command {
            Command::Play(query) => self.play(ctx, &query).await,
            Command::Cache { enable } => self.cache_loop(ctx, enable).await,
            Command::Playlist(url) => self.playlist(ctx, &url).await,
            Command::Queue => {
                self.queue(ctx).await;
                Ok(())
            }
            Command::NowPlaying => {
                self.now_playing(ctx).await;
                Ok(())
            }
            Command::Skip => self.skip(ctx).await,
            Command::Stop => self.stop(ctx).await,
            Command::Pause => self.pause(ctx).await,
            Command::Resume => self.resume(ctx).await,
            Command::Bind => self.bind(ctx),
            Command::Unbind => {
                self.unbind(ctx);
                Ok(())
            }
            Command::Use {
                guild_id,
                channel_id,
            } => self.use_target(ctx, guild_id, channel_id),
        }
    }

    /// Parses and runs one chat message in its own task. Failures are
    /// reported on the reply channel; a panicking handler is logged and
    /// answered with a generic notice.
    pub async fn handle(self: &Arc<Self>, ctx: CommandContext, content: String) {
        let command = match Command::parse(&content) {
            None => return,
            Some(Err(e)) => {
                report(&ctx.reply, &e);
                return;
            }
            Some(Ok(command)) => command,
        };
        debug!("{} -> {command:?}", ctx.user_id);

        let span = info_span!("command", user = %ctx.user_id);
        let this = Arc::clone(self);
        let reply = ctx.reply.clone();
        let task = tokio::spawn(
            async move {
                if let Err(e) = this.execute(&ctx, command).await {
                    warn!("command failed: {e}");
                    report(&ctx.reply, &e);
                }
            }
            .instrument(span),
        );

        if let Err(e) = task.await {
            if e.is_panic() {
                error!("Command handler panicked: {e}");
                reply.notify(UNEXPECTED);
            }
        }
    }
}
