use std::{collections::VecDeque, sync::Arc};

use tracing::{debug, info, warn};

use super::shuffle::shuffle;
use crate::{
    common::{GuildId, ReplyChannel, VoiceTarget},
    library::Track,
    voice::{PlaybackEngine, VoiceConnection},
};

/// Logical playback state. Pause is an engine attribute and is not tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Playing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enqueued {
    /// The session was idle; the track went straight to the engine.
    Started,
    /// Appended to the queue at this 1-based position.
    Queued(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    Idle,
    Playing(Track),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopStart {
    Started(Track),
    Queued(usize),
}

/// Playback state of one guild.
///
/// Callers serialize access through the registry's per-guild mutex.
pub struct Session {
    guild_id: GuildId,
    connection: Box<dyn VoiceConnection>,
    engine: Arc<dyn PlaybackEngine>,
    queue: VecDeque<Track>,
    current: Option<Track>,
    last_channel: Option<ReplyChannel>,
    repeat_cache: bool,
    cache_pool: Vec<Track>,
    /// Consecutive tracks that ended with an error.
    failed_streak: usize,
}

impl Session {
    pub fn new(
        guild_id: GuildId,
        connection: Box<dyn VoiceConnection>,
        engine: Arc<dyn PlaybackEngine>,
    ) -> Self {
        connection.subscribe(engine.clone());
        Self {
            guild_id,
            connection,
            engine,
            queue: VecDeque::new(),
            current: None,
            last_channel: None,
            repeat_cache: false,
            cache_pool: Vec::new(),
            failed_streak: 0,
        }
    }

    pub fn guild_id(&self) -> &GuildId {
        &self.guild_id
    }

    pub fn target(&self) -> &VoiceTarget {
        self.connection.target()
    }

    pub fn state(&self) -> SessionState {
        if self.current.is_some() {
            SessionState::Playing
        } else {
            SessionState::Idle
        }
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn queue(&self) -> &VecDeque<Track> {
        &self.queue
    }

    pub fn repeat_cache(&self) -> bool {
        self.repeat_cache
    }

    pub fn cache_pool(&self) -> &[Track] {
        &self.cache_pool
    }

    pub fn last_channel(&self) -> Option<&ReplyChannel> {
        self.last_channel.as_ref()
    }

    /// Last writer wins.
    pub fn set_last_channel(&mut self, channel: ReplyChannel) {
        self.last_channel = Some(channel);
    }

    /// Moves the session to a new channel, keeping engine, queue and track.
    pub fn replace_connection(&mut self, connection: Box<dyn VoiceConnection>) {
        info!(
            "Moving guild {} from {} to {}",
            self.guild_id,
            self.connection.target(),
            connection.target()
        );
        self.connection.destroy();
        connection.subscribe(self.engine.clone());
        self.connection = connection;
    }

    pub fn enqueue(&mut self, track: Track) -> Enqueued {
        if self.current.is_none() {
            self.start(track);
            Enqueued::Started
        } else {
            self.queue.push_back(track);
            Enqueued::Queued(self.queue.len())
        }
    }

    /// Handles the engine's "finished" notification. Never call this from
    /// a command: commands stop the engine and let the event arrive.
    ///
    /// Loop mode ends once a whole pass over the pool has failed, so a dead
    /// engine drains the queue instead of cycling forever.
    pub fn advance(&mut self, error: Option<&str>) -> Advance {
        match (error, &self.current) {
            (Some(error), Some(track)) => {
                warn!("[{}] playback of {} failed: {error}", self.guild_id, track.title);
                self.notify(format!("⚠️ Could not play **{}**: {error}", track.title));
                self.failed_streak += 1;
            }
            _ => self.failed_streak = 0,
        }

        if self.repeat_cache && self.failed_streak >= self.cache_pool.len().max(1) {
            warn!(
                "[{}] {} tracks failed in a row, leaving cache loop",
                self.guild_id, self.failed_streak
            );
            self.disable_cache_loop();
            self.notify("⚠️ Cache loop stopped: none of the cached tracks could be played.");
        }

        if self.queue.is_empty() && self.repeat_cache && !self.cache_pool.is_empty() {
            let mut refill = self.cache_pool.clone();
            shuffle(&mut refill, &mut rand::thread_rng());
            debug!("[{}] refilled queue from loop pool ({})", self.guild_id, refill.len());
            self.queue = refill.into();
        }

        match self.queue.pop_front() {
            Some(track) => {
                self.start(track.clone());
                Advance::Playing(track)
            }
            None => {
                self.current = None;
                self.notify("🛑 Queue is empty. Add more with !play <song or URL>");
                Advance::Idle
            }
        }
    }

    /// Stops the engine; the resulting "finished" event advances the queue.
    pub fn skip(&self) -> Option<&Track> {
        let track = self.current.as_ref()?;
        self.engine.stop();
        Some(track)
    }

    /// Clears the queue and loop mode, then stops the engine.
    pub fn stop(&mut self) {
        self.queue.clear();
        self.repeat_cache = false;
        self.cache_pool.clear();
        self.failed_streak = 0;
        self.engine.stop();
    }

    pub fn pause(&self) -> bool {
        self.engine.pause()
    }

    pub fn resume(&self) -> bool {
        self.engine.resume()
    }

    /// Enables looping over `pool` and replaces the queue with a shuffled
    /// copy of it. Starts playback when idle.
    pub fn enable_cache_loop(&mut self, pool: Vec<Track>) -> LoopStart {
        let mut queue = pool.clone();
        shuffle(&mut queue, &mut rand::thread_rng());
        self.cache_pool = pool;
        self.repeat_cache = true;
        self.failed_streak = 0;
        self.queue = queue.into();

        if self.current.is_some() {
            return LoopStart::Queued(self.queue.len());
        }
        match self.queue.pop_front() {
            Some(track) => {
                self.start(track.clone());
                LoopStart::Started(track)
            }
            None => LoopStart::Queued(0),
        }
    }

    /// Leaves the queue untouched.
    pub fn disable_cache_loop(&mut self) {
        self.repeat_cache = false;
        self.cache_pool.clear();
    }

    pub fn shutdown(&self) {
        self.engine.stop();
        self.connection.destroy();
    }

    fn start(&mut self, track: Track) {
        self.notify(format!("▶️ Now playing: {}", track.describe()));
        self.engine.play(&track.file_path);
        self.current = Some(track);
    }

    fn notify(&self, text: impl Into<String>) {
        if let Some(channel) = &self.last_channel {
            channel.notify(text);
        }
    }
}
