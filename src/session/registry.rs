use std::sync::Arc;

use dashmap::DashMap;
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{Instrument, debug, info, info_span};

use super::session::Session;
use crate::{
    common::{ConnectError, GuildId, Shared, VoiceTarget},
    voice::{EngineEvent, EngineFactory, VoiceConnector},
};

struct SessionEntry {
    session: Shared<Session>,
    listener: JoinHandle<()>,
}

/// Process-wide map from guild to its playback session.
pub struct SessionRegistry {
    sessions: DashMap<GuildId, SessionEntry>,
    /// Serializes creation and channel moves per guild.
    gates: DashMap<GuildId, Arc<Mutex<()>>>,
    connector: Arc<dyn VoiceConnector>,
    engines: Arc<dyn EngineFactory>,
}

impl SessionRegistry {
    pub fn new(connector: Arc<dyn VoiceConnector>, engines: Arc<dyn EngineFactory>) -> Self {
        Self {
            sessions: DashMap::new(),
            gates: DashMap::new(),
            connector,
            engines,
        }
    }

    pub fn connector(&self) -> &Arc<dyn VoiceConnector> {
        &self.connector
    }

    pub fn get(&self, guild_id: &GuildId) -> Option<Shared<Session>> {
        self.sessions.get(guild_id).map(|e| e.session.clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Returns the guild's session connected to `target`, creating it or
    /// moving it to another channel of the same guild as needed.
    pub async fn ensure(&self, target: &VoiceTarget) -> Result<Shared<Session>, ConnectError> {
        let gate = self
            .gates
            .entry(target.guild_id.clone())
            .or_default()
            .clone();
        let _gate = gate.lock().await;

        if let Some(existing) = self.get(&target.guild_id) {
            let mut session = existing.lock().await;
            if session.target() != target {
                let connection = self.connector.connect(target).await?;
                session.replace_connection(connection);
            }
            drop(session);
            return Ok(existing);
        }

        let (events_tx, events_rx) = flume::unbounded();
        let engine = self.engines.create(&target.guild_id, events_tx);
        let connection = self.connector.connect(target).await?;
        let session = Arc::new(Mutex::new(Session::new(
            target.guild_id.clone(),
            connection,
            engine,
        )));

        let listener = spawn_listener(target.guild_id.clone(), session.clone(), events_rx);
        self.sessions.insert(
            target.guild_id.clone(),
            SessionEntry {
                session: session.clone(),
                listener,
            },
        );
        info!("Created session for guild {} in {}", target.guild_id, target);
        Ok(session)
    }

    /// Destroys every connection and stops all event listeners.
    pub async fn shutdown(&self) {
        let guilds: Vec<GuildId> = self.sessions.iter().map(|e| e.key().clone()).collect();
        for guild_id in guilds {
            if let Some((_, entry)) = self.sessions.remove(&guild_id) {
                entry.listener.abort();
                entry.session.lock().await.shutdown();
            }
        }
    }
}

/// Feeds engine notifications into `Session::advance`, one at a time.
fn spawn_listener(
    guild_id: GuildId,
    session: Shared<Session>,
    events: flume::Receiver<EngineEvent>,
) -> JoinHandle<()> {
    let span = info_span!("guild", id = %guild_id);
    tokio::spawn(
        async move {
            while let Ok(event) = events.recv_async().await {
                match event {
                    EngineEvent::Finished { error } => {
                        let outcome = session.lock().await.advance(error.as_deref());
                        debug!("advanced: {outcome:?}");
                    }
                }
            }
            debug!("engine event channel closed");
        }
        .instrument(span),
    )
}
