use tracing::debug;

use super::{CommandContext, Orchestrator};
use crate::common::{ChannelId, CommandError, GuildId, VoiceTarget};

impl Orchestrator {
    /// `!bind`: the author's current voice channel becomes their DM target.
    pub fn bind(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let guild_id = ctx.guild_id.clone().ok_or(CommandError::BindOutsideGuild)?;
        let channel_id = ctx.voice_channel.clone().ok_or(CommandError::NotInVoice)?;
        let target = VoiceTarget::new(guild_id, channel_id);

        self.preferences.bind(ctx.user_id.clone(), target.clone());
        ctx.reply.notify(format!(
            "🔗 DM commands are connected to channel **{} › {}**.",
            target.guild_id, target.channel_id
        ));
        Ok(())
    }

    /// `!unbind`
    pub fn unbind(&self, ctx: &CommandContext) {
        if let Some(old) = self.preferences.unbind(&ctx.user_id) {
            debug!("{} unbound from {old}", ctx.user_id);
        }
        ctx.reply.notify("🔓 Your DM link has been cleared.");
    }

    /// `!use <guildId> <channelId>`
    pub fn use_target(
        &self,
        ctx: &CommandContext,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<(), CommandError> {
        let target = VoiceTarget::new(guild_id, channel_id);
        if !self.sessions.connector().knows_channel(&target) {
            return Err(CommandError::UnknownTarget);
        }

        self.preferences.bind(ctx.user_id.clone(), target.clone());
        ctx.reply.notify(format!(
            "🔗 DM commands are linked to channel **{} › {}**.",
            target.guild_id, target.channel_id
        ));
        Ok(())
    }
}
