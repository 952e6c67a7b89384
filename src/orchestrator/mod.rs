//! Command-driven logic on top of the cache, the session registry and the
//! playlist feeder. One async entry point per chat command.

use std::{sync::Arc, time::Duration};

use crate::{
    common::{ChannelId, CommandError, GuildId, ReplyChannel, UserId, VoiceTarget},
    feeder::PlaylistFeeder,
    library::TrackCache,
    session::{SessionRegistry, VoicePreferences},
    tools::Toolset,
};

mod binding;
mod controls;
pub mod dispatch;
mod play;

pub use dispatch::Command;

/// Where a command came from and where its replies go.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub user_id: UserId,
    /// `None` for direct messages.
    pub guild_id: Option<GuildId>,
    /// The author's current voice channel in `guild_id`.
    pub voice_channel: Option<ChannelId>,
    pub reply: ReplyChannel,
}

pub struct Orchestrator {
    cache: Arc<TrackCache>,
    sessions: Arc<SessionRegistry>,
    feeder: Arc<PlaylistFeeder>,
    preferences: VoicePreferences,
    tools: Toolset,
    feed_interval: Duration,
}

impl Orchestrator {
    pub fn new(
        cache: Arc<TrackCache>,
        sessions: Arc<SessionRegistry>,
        feeder: Arc<PlaylistFeeder>,
        tools: Toolset,
        feed_interval: Duration,
    ) -> Self {
        Self {
            cache,
            sessions,
            feeder,
            preferences: VoicePreferences::new(),
            tools,
            feed_interval,
        }
    }

    pub fn preferences(&self) -> &VoicePreferences {
        &self.preferences
    }

    /// Voice destination for a play-like command. In a guild the author
    /// must be in voice, and that channel becomes their default; from a DM
    /// the stored default is used.
    fn resolve_target(&self, ctx: &CommandContext) -> Result<VoiceTarget, CommandError> {
        match &ctx.guild_id {
            Some(guild_id) => {
                let channel_id = ctx.voice_channel.clone().ok_or(CommandError::NotInVoice)?;
                let target = VoiceTarget::new(guild_id.clone(), channel_id);
                self.preferences.bind(ctx.user_id.clone(), target.clone());
                Ok(target)
            }
            None => self
                .preferences
                .get(&ctx.user_id)
                .ok_or(CommandError::NoTargetChannel),
        }
    }

    /// Guild a view or transport command applies to.
    fn command_guild(&self, ctx: &CommandContext) -> Option<GuildId> {
        ctx.guild_id
            .clone()
            .or_else(|| self.preferences.get(&ctx.user_id).map(|t| t.guild_id))
    }
}

/// Sends the failure headline and its diagnostic, if any.
pub(crate) fn report(reply: &ReplyChannel, err: &CommandError) {
    reply.notify(err.to_string());
    if let Some(diagnostic) = err.diagnostic() {
        reply.notify(diagnostic);
    }
}
