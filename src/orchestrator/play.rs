use std::sync::Arc;

use futures::FutureExt;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{CommandContext, Orchestrator, report};
use crate::{
    common::{CommandError, GuildId, ReplyChannel, VoiceTarget},
    feeder::{IntakeFn, PlaylistEntry},
    library::{Track, codec},
    session::{Enqueued, LoopStart, SessionState},
};

/// Direct URLs pass through; anything else becomes a first-hit search.
pub(crate) fn lookup_input(query: &str) -> String {
    let lower = query.to_ascii_lowercase();
    if ["http://", "https://", "www."]
        .iter()
        .any(|prefix| lower.starts_with(prefix))
    {
        query.to_string()
    } else {
        format!("ytsearch1:{query}")
    }
}

fn is_youtube(query: &str) -> bool {
    query.contains("youtube.com") || query.contains("youtu.be")
}

fn millis(from: Instant, to: Instant) -> u128 {
    to.duration_since(from).as_millis()
}

impl Orchestrator {
    /// `!play <query>`.
    pub async fn play(self: &Arc<Self>, ctx: &CommandContext, query: &str) -> Result<(), CommandError> {
        ctx.reply.notify(format!("🎵 Request: {query}"));

        if is_youtube(query) {
            match self.tools.playlists.is_playlist(query).await {
                Ok(true) => {
                    ctx.reply.notify("📃 Playlist detected. Switching to playlist mode...");
                    return self.playlist(ctx, query).await;
                }
                Ok(false) => {}
                Err(e) => warn!("Playlist detection failed for {query}: {e}"),
            }
        }

        let target = self.resolve_target(ctx)?;
        self.play_track(&target, query, &ctx.reply).await
    }

    /// Resolves `query`, serves it from the cache or downloads it, and
    /// enqueues the result on `target`'s session.
    pub(crate) async fn play_track(
        &self,
        target: &VoiceTarget,
        query: &str,
        reply: &ReplyChannel,
    ) -> Result<(), CommandError> {
        let session = self.sessions.ensure(target).await?;
        session.lock().await.set_last_channel(reply.clone());

        let t0 = Instant::now();
        let meta = self
            .tools
            .resolver
            .resolve(&lookup_input(query))
            .await
            .map_err(CommandError::Resolution)?;
        let t1 = Instant::now();

        let title_san = codec::sanitize(&meta.title);
        let file_path = self.cache.canonical_path(&meta.id, &title_san);
        let t2 = Instant::now();

        if let Some(track) = self.cache.lookup(Some(&meta.id), Some(&title_san)) {
            debug!("cache hit for {} -> {}", meta.id, track.file_path.display());
            let mut session = session.lock().await;
            if session.state() == SessionState::Idle {
                reply.notify(format!("▶️ Playing from cache: **{}**", track.title));
            } else {
                reply.notify(format!("🔄 Queued from cache: **{}**", track.title));
            }
            session.enqueue(track);
            drop(session);

            reply.notify(format!(
                "⏱ meta {}ms, prep {}ms, cache 0ms",
                millis(t0, t1),
                millis(t1, t2)
            ));
            return Ok(());
        }

        reply.notify(format!("⬇️ Downloading **{}**\n🔗 {}", meta.title, meta.url));
        let download_start = Instant::now();
        self.tools
            .downloader
            .download(&meta.url, &file_path)
            .await
            .map_err(CommandError::Download)?;
        let download_end = Instant::now();

        let track = Track {
            id: Some(meta.id),
            title: meta.title,
            title_san,
            file_path,
            url: Some(meta.url),
        };
        info!("Downloaded {} to {}", track.title, track.file_path.display());
        self.cache.upsert(track.clone());

        let title = track.title.clone();
        if let Enqueued::Queued(_) = session.lock().await.enqueue(track) {
            reply.notify(format!("🔄 Queued: **{title}**"));
        }

        reply.notify(format!(
            "⏱ meta {}ms, prep {}ms, download {}ms, total {}ms",
            millis(t0, t1),
            millis(t1, t2),
            millis(download_start, download_end),
            millis(t0, Instant::now())
        ));
        Ok(())
    }

    /// `!cache` / `!cache off`.
    pub async fn cache_loop(&self, ctx: &CommandContext, enable: bool) -> Result<(), CommandError> {
        let target = self.resolve_target(ctx)?;
        let session = self.sessions.ensure(&target).await?;
        let mut session = session.lock().await;
        session.set_last_channel(ctx.reply.clone());

        if !enable {
            session.disable_cache_loop();
            ctx.reply.notify("🛑 Cache loop disabled. (Queue remains the same)");
            return Ok(());
        }

        let pool = self.cache.list_all_unique();
        if pool.is_empty() {
            return Err(CommandError::EmptyCache);
        }
        let count = pool.len();
        match session.enable_cache_loop(pool) {
            LoopStart::Started(_) => {
                ctx.reply.notify(format!("🔁 Cache initialized. Number of tracks: **{count}**"));
            }
            LoopStart::Queued(_) => ctx.reply.notify(format!(
                "🔁 Cache (∞) is enabled. **{count}** tracks have been added to the queue and looping is on."
            )),
        }
        Ok(())
    }

    /// `!playlist <url>`: resolves the entries and hands them to the
    /// guild's feeder, replacing any playlist already being fed.
    pub async fn playlist(self: &Arc<Self>, ctx: &CommandContext, url: &str) -> Result<(), CommandError> {
        let target = self.resolve_target(ctx)?;
        let session = self.sessions.ensure(&target).await?;
        session.lock().await.set_last_channel(ctx.reply.clone());

        ctx.reply.notify("⏳ Fetching playlist...");
        let list = self
            .tools
            .playlists
            .entries(url)
            .await
            .map_err(CommandError::Playlist)?;
        ctx.reply.notify(format!(
            "📜 Playlist found. Tracks: **{}**\nStarting...",
            list.len()
        ));

        self.feeder.start(
            target.guild_id.clone(),
            ctx.reply.clone(),
            list,
            self.intake(target),
            self.feed_interval,
        );
        Ok(())
    }

    /// Feeder callback: runs one playlist entry through the play path.
    fn intake(self: &Arc<Self>, target: VoiceTarget) -> IntakeFn {
        let this = Arc::clone(self);
        Arc::new(move |entry: PlaylistEntry, guild_id: GuildId, channel: ReplyChannel| {
            let this = this.clone();
            let target = target.clone();
            async move {
                channel.notify(format!("➕ Queue: **{}**", entry.title));
                if let Err(e) = this.play_track(&target, &entry.url, &channel).await {
                    warn!("[{guild_id}] playlist entry {} failed: {e}", entry.id);
                    report(&channel, &e);
                }
            }
            .boxed()
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        feeder::PlaylistEntry,
        orchestrator::fixture::Fixture,
        testing::{RecordingSink, settle},
        tools::watch_url,
    };

    #[test]
    fn queries_are_classified() {
        assert_eq!(lookup_input("https://youtu.be/abc"), "https://youtu.be/abc");
        assert_eq!(lookup_input("WWW.youtube.com/watch?v=x"), "WWW.youtube.com/watch?v=x");
        assert_eq!(lookup_input("never gonna"), "ytsearch1:never gonna");
    }

    #[tokio::test]
    async fn second_play_is_served_from_cache() {
        let fx = Fixture::new();
        let sink = RecordingSink::new();
        let ctx = fx.in_voice(&sink);
        let url = "https://example.com/watch?v=video123";

        fx.orchestrator.play(&ctx, url).await.unwrap();
        let tracks = fx.cache.list_all_unique();
        assert_eq!(tracks.len(), 1);
        assert_eq!(
            tracks[0].file_path,
            fx.cache.canonical_path("video123", &codec::sanitize("Song video123"))
        );
        assert!(tracks[0].file_path.exists());
        assert_eq!(fx.tools.downloads(), 1);
        assert!(sink.contains("⬇️ Downloading **Song video123**"));

        fx.orchestrator.play(&ctx, url).await.unwrap();
        assert_eq!(fx.tools.downloads(), 1);
        assert_eq!(fx.cache.list_all_unique().len(), 1);
        assert!(sink.contains("🔄 Queued from cache: **Song video123**"));
        assert!(sink.contains("cache 0ms"));

        let session = fx.sessions.get(&"g1".into()).unwrap();
        let session = session.lock().await;
        assert_eq!(session.current().map(|t| t.title.as_str()), Some("Song video123"));
        assert_eq!(session.queue().len(), 1);
    }

    #[tokio::test]
    async fn failed_download_leaves_cache_and_queue_alone() {
        let fx = Fixture::new();
        let sink = RecordingSink::new();
        fx.tools.fail_downloads(true);

        let err = fx
            .orchestrator
            .play(&fx.in_voice(&sink), "https://example.com/watch?v=broken")
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Download(_)));
        assert_eq!(err.to_string(), "❌ **Download failed.** (code 1)");
        assert!(err.diagnostic().unwrap().contains("Video unavailable"));

        assert!(fx.cache.list_all_unique().is_empty());
        let session = fx.sessions.get(&"g1".into()).unwrap();
        assert_eq!(session.lock().await.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn unresolvable_query_reports_metadata_error() {
        let fx = Fixture::new();
        let sink = RecordingSink::new();
        let err = fx
            .orchestrator
            .play(&fx.in_voice(&sink), "nothing matches this")
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Resolution(_)));
        assert_eq!(fx.tools.downloads(), 0);
    }

    #[tokio::test]
    async fn direct_message_without_target_has_no_side_effects() {
        let fx = Fixture::new();
        let sink = RecordingSink::new();
        let err = fx
            .orchestrator
            .play(&fx.direct(&sink), "https://example.com/watch?v=x")
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::NoTargetChannel));
        assert!(fx.sessions.is_empty());
        assert!(fx.connector.connects().is_empty());
    }

    #[tokio::test]
    async fn cache_loop_needs_cached_tracks() {
        let fx = Fixture::new();
        let sink = RecordingSink::new();
        let ctx = fx.in_voice(&sink);
        assert!(matches!(
            fx.orchestrator.cache_loop(&ctx, true).await,
            Err(CommandError::EmptyCache)
        ));

        fx.orchestrator.play(&ctx, "https://example.com/watch?v=a").await.unwrap();
        fx.orchestrator.cache_loop(&ctx, true).await.unwrap();
        assert!(sink.contains("**1** tracks have been added"));

        let session = fx.sessions.get(&"g1".into()).unwrap();
        assert!(session.lock().await.repeat_cache());

        fx.orchestrator.cache_loop(&ctx, false).await.unwrap();
        let session = session.lock().await;
        assert!(!session.repeat_cache());
        assert_eq!(session.queue().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn youtube_playlist_is_fed_over_time() {
        let fx = Fixture::new();
        let sink = RecordingSink::new();
        let url = "https://www.youtube.com/playlist?list=PL1";
        let entries: Vec<PlaylistEntry> = ["p1", "p2"]
            .into_iter()
            .map(|id| PlaylistEntry {
                id: id.to_string(),
                title: format!("Song {id}"),
                url: watch_url(id),
            })
            .collect();
        fx.tools.add_playlist(url, entries);

        fx.orchestrator.play(&fx.in_voice(&sink), url).await.unwrap();
        assert!(sink.contains("Playlist detected"));
        assert!(fx.feeder.is_active(&"g1".into()));

        settle().await;
        assert!(sink.contains("➕ Queue: **Song p1**"));
        assert_eq!(fx.tools.downloads(), 1);

        tokio::time::sleep(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(fx.tools.downloads(), 2);

        tokio::time::sleep(Duration::from_secs(30)).await;
        settle().await;
        assert!(sink.contains("Playlist finished"));
        assert!(!fx.feeder.is_active(&"g1".into()));
        assert_eq!(fx.cache.list_all_unique().len(), 2);
    }
}
