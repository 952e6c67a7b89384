//! Engine and connector backed by the linked bot client, which owns the
//! real voice connection and audio pipeline.

use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{EngineEvent, EngineFactory, PlaybackEngine, VoiceConnection, VoiceConnector};
use crate::{
    common::{ConnectError, GuildId, VoiceTarget},
    transport::{ClientLink, OutgoingMessage},
};

const NO_CLIENT: &str = "no bot client connected";
const CLIENT_LOST: &str = "bot client disconnected";

#[derive(Debug, Clone, Copy)]
struct ActivePlay {
    play_id: u64,
    paused: bool,
}

/// Per-guild engine. Owns the exactly-once `Finished` contract: whichever
/// of `stop`, a matching `trackFinished` or a client loss comes first
/// takes the active play and emits the event.
pub struct RemoteEngine {
    guild_id: GuildId,
    link: Arc<ClientLink>,
    events: flume::Sender<EngineEvent>,
    play_ids: Arc<AtomicU64>,
    active: Mutex<Option<ActivePlay>>,
}

impl RemoteEngine {
    fn finish(&self, error: Option<String>) {
        if self.events.send(EngineEvent::Finished { error }).is_err() {
            debug!("[{}] event listener gone", self.guild_id);
        }
    }

    /// Client report for `play_id`. Stale ids are dropped.
    pub fn track_finished(&self, play_id: u64, error: Option<String>) {
        let mut active = self.active.lock();
        match *active {
            Some(play) if play.play_id == play_id => {
                *active = None;
                drop(active);
                self.finish(error);
            }
            _ => debug!("[{}] ignoring stale finish for play {play_id}", self.guild_id),
        }
    }

    fn client_lost(&self) {
        if self.active.lock().take().is_some() {
            self.finish(Some(CLIENT_LOST.to_string()));
        }
    }
}

impl PlaybackEngine for RemoteEngine {
    fn play(&self, path: &Path) {
        let play_id = self.play_ids.fetch_add(1, Ordering::Relaxed) + 1;
        let replaced = self.active.lock().replace(ActivePlay {
            play_id,
            paused: false,
        });
        if let Some(old) = replaced {
            debug!("[{}] play {} superseded by {play_id}", self.guild_id, old.play_id);
        }

        let sent = self.link.send(OutgoingMessage::Play {
            guild_id: self.guild_id.clone(),
            play_id,
            path: path.to_path_buf(),
        });
        if sent.is_err() {
            warn!("[{}] cannot play {}: {NO_CLIENT}", self.guild_id, path.display());
            self.track_finished(play_id, Some(NO_CLIENT.to_string()));
        }
    }

    fn pause(&self) -> bool {
        let mut active = self.active.lock();
        let Some(play) = active.as_mut().filter(|p| !p.paused) else {
            return false;
        };
        let sent = self.link.send(OutgoingMessage::Pause {
            guild_id: self.guild_id.clone(),
        });
        play.paused = sent.is_ok();
        play.paused
    }

    fn resume(&self) -> bool {
        let mut active = self.active.lock();
        let Some(play) = active.as_mut().filter(|p| p.paused) else {
            return false;
        };
        let sent = self.link.send(OutgoingMessage::Resume {
            guild_id: self.guild_id.clone(),
        });
        play.paused = sent.is_err();
        !play.paused
    }

    fn stop(&self) -> bool {
        if self.active.lock().take().is_none() {
            return false;
        }
        let _ = self.link.send(OutgoingMessage::Stop {
            guild_id: self.guild_id.clone(),
        });
        self.finish(None);
        true
    }
}

/// Creates [`RemoteEngine`]s and routes client reports to them.
pub struct RemoteEngineFactory {
    link: Arc<ClientLink>,
    engines: DashMap<GuildId, Arc<RemoteEngine>>,
    play_ids: Arc<AtomicU64>,
}

impl RemoteEngineFactory {
    pub fn new(link: Arc<ClientLink>) -> Self {
        Self {
            link,
            engines: DashMap::new(),
            play_ids: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn track_finished(&self, guild_id: &GuildId, play_id: u64, error: Option<String>) {
        match self.engines.get(guild_id) {
            Some(engine) => engine.track_finished(play_id, error),
            None => debug!("trackFinished for unknown guild {guild_id}"),
        }
    }

    /// Ends every active play; the client that was playing them is gone.
    pub fn client_lost(&self) {
        let engines: Vec<Arc<RemoteEngine>> =
            self.engines.iter().map(|e| e.value().clone()).collect();
        for engine in engines {
            engine.client_lost();
        }
    }
}

impl EngineFactory for RemoteEngineFactory {
    fn create(
        &self,
        guild_id: &GuildId,
        events: flume::Sender<EngineEvent>,
    ) -> Arc<dyn PlaybackEngine> {
        let engine = Arc::new(RemoteEngine {
            guild_id: guild_id.clone(),
            link: self.link.clone(),
            events,
            play_ids: self.play_ids.clone(),
            active: Mutex::new(None),
        });
        self.engines.insert(guild_id.clone(), engine.clone());
        engine
    }
}

struct ClientVoiceConnection {
    target: VoiceTarget,
    link: Arc<ClientLink>,
}

impl VoiceConnection for ClientVoiceConnection {
    fn target(&self) -> &VoiceTarget {
        &self.target
    }

    // The client routes audio by guild, so there is nothing to bind here.
    fn subscribe(&self, _engine: Arc<dyn PlaybackEngine>) {}

    fn destroy(&self) {
        let _ = self.link.send(OutgoingMessage::VoiceDisconnect {
            guild_id: self.target.guild_id.clone(),
            channel_id: self.target.channel_id.clone(),
        });
    }
}

/// Asks the linked client to join voice channels.
pub struct ClientVoiceConnector {
    link: Arc<ClientLink>,
}

impl ClientVoiceConnector {
    pub fn new(link: Arc<ClientLink>) -> Self {
        Self { link }
    }
}

#[async_trait]
impl VoiceConnector for ClientVoiceConnector {
    async fn connect(&self, target: &VoiceTarget) -> Result<Box<dyn VoiceConnection>, ConnectError> {
        self.link
            .send(OutgoingMessage::VoiceConnect {
                guild_id: target.guild_id.clone(),
                channel_id: target.channel_id.clone(),
            })
            .map_err(|_| ConnectError::Failed {
                target: target.clone(),
                reason: NO_CLIENT.to_string(),
            })?;

        Ok(Box::new(ClientVoiceConnection {
            target: target.clone(),
            link: self.link.clone(),
        }))
    }

    fn knows_channel(&self, target: &VoiceTarget) -> bool {
        self.link.knows_channel(target)
    }
}
