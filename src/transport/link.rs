use std::{
    collections::HashSet,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info};

use super::messages::OutgoingMessage;
use crate::common::{ChannelId, GuildId, ReplyError, ReplySink, VoiceTarget};

struct Attached {
    token: u64,
    outbox: flume::Sender<OutgoingMessage>,
}

/// The single bot client currently linked to this server.
///
/// A newer client replaces the older one; the older socket loop ends once
/// its outbox sender is dropped.
#[derive(Default)]
pub struct ClientLink {
    attached: RwLock<Option<Attached>>,
    tokens: AtomicU64,
    /// Voice channels announced per guild by the client.
    directory: DashMap<GuildId, HashSet<ChannelId>>,
}

impl ClientLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self) -> (u64, flume::Receiver<OutgoingMessage>) {
        let token = self.tokens.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = flume::unbounded();
        if self.attached.write().replace(Attached { token, outbox: tx }).is_some() {
            info!("Bot client replaced by a newer connection");
        }
        self.directory.clear();
        (token, rx)
    }

    /// Returns false when `token` was already superseded.
    pub fn detach(&self, token: u64) -> bool {
        let mut attached = self.attached.write();
        if attached.as_ref().is_some_and(|a| a.token == token) {
            *attached = None;
            self.directory.clear();
            true
        } else {
            false
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached.read().is_some()
    }

    pub fn send(&self, message: OutgoingMessage) -> Result<(), ReplyError> {
        let attached = self.attached.read();
        let attached = attached.as_ref().ok_or(ReplyError::Closed)?;
        attached.outbox.send(message).map_err(|_| ReplyError::Closed)
    }

    pub fn update_guild(&self, guild_id: GuildId, channels: Vec<ChannelId>) {
        debug!("guild {guild_id} announced {} voice channels", channels.len());
        self.directory.insert(guild_id, channels.into_iter().collect());
    }

    pub fn knows_channel(&self, target: &VoiceTarget) -> bool {
        self.directory
            .get(&target.guild_id)
            .is_some_and(|channels| channels.contains(&target.channel_id))
    }
}

/// Reply address on the linked client.
pub struct LinkReply {
    link: Arc<ClientLink>,
    reply_to: String,
}

impl LinkReply {
    pub fn new(link: Arc<ClientLink>, reply_to: impl Into<String>) -> Self {
        Self {
            link,
            reply_to: reply_to.into(),
        }
    }
}

impl ReplySink for LinkReply {
    fn send(&self, text: String) -> Result<(), ReplyError> {
        self.link.send(OutgoingMessage::Reply {
            reply_to: self.reply_to.clone(),
            text,
        })
    }
}
