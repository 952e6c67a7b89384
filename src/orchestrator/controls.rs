use super::{CommandContext, Orchestrator};
use crate::common::CommandError;

impl Orchestrator {
    /// `!queue`
    pub async fn queue(&self, ctx: &CommandContext) {
        let Some(guild_id) = self.command_guild(ctx) else {
            ctx.reply.notify("ℹ️ No queue (no connected voice channel found).");
            return;
        };
        let Some(session) = self.sessions.get(&guild_id) else {
            ctx.reply.notify("ℹ️ Queue is empty.");
            return;
        };

        let session = session.lock().await;
        if session.current().is_none() && session.queue().is_empty() {
            ctx.reply.notify("ℹ️ Queue is empty.");
            return;
        }

        let now = session
            .current()
            .map(|t| format!("Now: **{}**\n", t.title))
            .unwrap_or_default();
        let list = session
            .queue()
            .iter()
            .enumerate()
            .map(|(i, t)| format!("{}. {}", i + 1, t.title))
            .collect::<Vec<_>>()
            .join("\n");
        let list = if list.is_empty() { "(empty)".to_string() } else { list };
        ctx.reply.notify(format!("🎶 {now}Queue:\n{list}"));
    }

    /// `!np`
    pub async fn now_playing(&self, ctx: &CommandContext) {
        let current = match self.command_guild(ctx).and_then(|g| self.sessions.get(&g)) {
            Some(session) => session.lock().await.current().cloned(),
            None => None,
        };
        match current {
            Some(track) => ctx.reply.notify(format!(
                "▶️ Now playing: **{}**\n🔗 {}",
                track.title,
                track.url.as_deref().unwrap_or("URL unknown")
            )),
            None => ctx.reply.notify("ℹ️ No track currently playing."),
        }
    }

    /// `!skip`: the engine's finished event moves the queue on.
    pub async fn skip(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let guild_id = self.command_guild(ctx).ok_or(CommandError::NoSession)?;
        let session = self.sessions.get(&guild_id).ok_or(CommandError::NothingToSkip)?;
        let session = session.lock().await;
        let skipped = session.skip().ok_or(CommandError::NothingToSkip)?;
        ctx.reply.notify(format!("⏭ Skipped **{}**", skipped.title));
        Ok(())
    }

    /// `!stop`: clears queue and loop mode and cancels the playlist feeder.
    pub async fn stop(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let guild_id = self.command_guild(ctx).ok_or(CommandError::NoSession)?;
        self.feeder.stop(&guild_id);

        let session = self.sessions.get(&guild_id).ok_or(CommandError::NoSession)?;
        session.lock().await.stop();
        ctx.reply.notify("⏹ Stopped playback, cleared queue and stopped playlist feeder.");
        Ok(())
    }

    /// `!pause`
    pub async fn pause(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let guild_id = self.command_guild(ctx).ok_or(CommandError::NoSession)?;
        let session = self.sessions.get(&guild_id).ok_or(CommandError::NoSession)?;
        if session.lock().await.pause() {
            ctx.reply.notify("⏸ Paused playback.");
        } else {
            ctx.reply.notify("ℹ️ Nothing to pause.");
        }
        Ok(())
    }

    /// `!resume`
    pub async fn resume(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        let guild_id = self.command_guild(ctx).ok_or(CommandError::NoSession)?;
        let session = self.sessions.get(&guild_id).ok_or(CommandError::NoSession)?;
        if session.lock().await.resume() {
            ctx.reply.notify("▶️ Resumed playback.");
        } else {
            ctx.reply.notify("ℹ️ Nothing to resume.");
        }
        Ok(())
    }
}
