//! Seams to the external voice transport and playback engine.

use std::{path::Path, sync::Arc};

use async_trait::async_trait;

use crate::common::{ConnectError, GuildId, VoiceTarget};

pub mod remote;

pub use remote::{ClientVoiceConnector, RemoteEngineFactory};

/// Notification raised by a playback engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The dispatched track ended, naturally, by `stop()`, or because it
    /// could not be played (`error` set). Raised exactly once per `play`.
    Finished { error: Option<String> },
}

/// One long-lived engine per guild session.
pub trait PlaybackEngine: Send + Sync {
    /// Starts `path`. Failures surface later as `Finished { error }`.
    fn play(&self, path: &Path);
    fn pause(&self) -> bool;
    fn resume(&self) -> bool;
    /// Forces the current track to end. Returns false when nothing was
    /// playing, in which case no `Finished` event follows.
    fn stop(&self) -> bool;
}

/// Builds engines wired to a guild's event channel.
pub trait EngineFactory: Send + Sync {
    fn create(
        &self,
        guild_id: &GuildId,
        events: flume::Sender<EngineEvent>,
    ) -> Arc<dyn PlaybackEngine>;
}

/// A live connection to one voice channel.
pub trait VoiceConnection: Send + Sync {
    fn target(&self) -> &VoiceTarget;
    fn subscribe(&self, engine: Arc<dyn PlaybackEngine>);
    fn destroy(&self);
}

#[async_trait]
pub trait VoiceConnector: Send + Sync {
    async fn connect(&self, target: &VoiceTarget) -> Result<Box<dyn VoiceConnection>, ConnectError>;

    /// Whether `target` names a voice channel the bot can reach.
    fn knows_channel(&self, _target: &VoiceTarget) -> bool {
        true
    }
}
