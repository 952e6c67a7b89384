//! Timed drip-feed of playlist entries into a guild's intake pipeline.
//!
//! One feeder per guild. Entry 0 is dispatched immediately, each following
//! entry one interval after the previous dispatch. The feeder knows nothing
//! about tracks or sessions; it only invokes the intake callback.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use dashmap::DashMap;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::{sync::oneshot, task::JoinHandle};
use tracing::{Instrument, debug, info, info_span};

use crate::common::{GuildId, ReplyChannel};

/// One item of a resolved playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub id: String,
    pub title: String,
    pub url: String,
}

/// Performs the actual intake of one entry.
pub type IntakeFn =
    Arc<dyn Fn(PlaylistEntry, GuildId, ReplyChannel) -> BoxFuture<'static, ()> + Send + Sync>;

struct FeederState {
    generation: u64,
    total: usize,
    task: JoinHandle<()>,
}

pub struct PlaylistFeeder {
    feeders: Arc<DashMap<GuildId, FeederState>>,
    generations: AtomicU64,
}

impl Default for PlaylistFeeder {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaylistFeeder {
    pub fn new() -> Self {
        Self {
            feeders: Arc::new(DashMap::new()),
            generations: AtomicU64::new(0),
        }
    }

    /// Replaces any feeder running for `guild_id` and starts feeding `list`.
    pub fn start(
        &self,
        guild_id: GuildId,
        channel: ReplyChannel,
        list: Vec<PlaylistEntry>,
        intake: IntakeFn,
        interval: Duration,
    ) {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let total = list.len();
        let (armed_tx, armed_rx) = oneshot::channel::<()>();
        let feeders = self.feeders.clone();
        let span = info_span!("feeder", guild = %guild_id, generation);

        let task_guild = guild_id.clone();
        let task = tokio::spawn(
            async move {
                // wait until our state is registered so completion can remove it
                if armed_rx.await.is_err() {
                    return;
                }

                for (index, entry) in list.into_iter().enumerate() {
                    if index > 0 {
                        tokio::time::sleep(interval).await;
                    }
                    debug!("dispatching entry {}/{total}: {}", index + 1, entry.title);
                    tokio::spawn(intake(entry, task_guild.clone(), channel.clone()));
                }

                if total > 0 {
                    tokio::time::sleep(interval).await;
                }
                channel.notify("🎵 Playlist finished.");
                feeders.remove_if(&task_guild, |_, state| state.generation == generation);
                info!("playlist finished");
            }
            .instrument(span),
        );

        // at most one feeder per guild, even when starts race
        let replaced = self.feeders.insert(
            guild_id.clone(),
            FeederState {
                generation,
                total,
                task,
            },
        );
        if let Some(old) = replaced {
            old.task.abort();
            debug!(
                "replaced feeder for guild {guild_id} ({} entries)",
                old.total
            );
        }
        let _ = armed_tx.send(());
    }

    /// Cancels the guild's feeder, if any. Entries already dispatched keep
    /// running.
    pub fn stop(&self, guild_id: &GuildId) -> bool {
        match self.feeders.remove(guild_id) {
            Some((_, state)) => {
                state.task.abort();
                debug!(
                    "stopped feeder for guild {guild_id} ({} entries)",
                    state.total
                );
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, guild_id: &GuildId) -> bool {
        self.feeders.contains_key(guild_id)
    }

    pub fn stop_all(&self) {
        let guilds: Vec<GuildId> = self.feeders.iter().map(|e| e.key().clone()).collect();
        for guild_id in guilds {
            self.stop(&guild_id);
        }
    }
}
