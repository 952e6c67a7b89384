use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::common::{ChannelId, GuildId, UserId};

/// Messages sent by the bot client.
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum IncomingMessage {
    /// A chat message addressed to the bot.
    #[serde(rename_all = "camelCase")]
    Command {
        user_id: UserId,
        /// Absent for direct messages.
        #[serde(default)]
        guild_id: Option<GuildId>,
        /// Opaque reply address, echoed back on every `reply`.
        reply_to: String,
        /// The author's current voice channel in `guild_id`, if any.
        #[serde(default)]
        voice_channel_id: Option<ChannelId>,
        content: String,
    },
    #[serde(rename_all = "camelCase")]
    TrackFinished {
        guild_id: GuildId,
        play_id: u64,
        #[serde(default)]
        error: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    GuildAvailable {
        guild_id: GuildId,
        voice_channel_ids: Vec<ChannelId>,
    },
}

/// Messages sent to the bot client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum OutgoingMessage {
    Ready,
    #[serde(rename_all = "camelCase")]
    Reply { reply_to: String, text: String },
    #[serde(rename_all = "camelCase")]
    VoiceConnect {
        guild_id: GuildId,
        channel_id: ChannelId,
    },
    /// Leave `channel_id`; ignored by the client when it already moved on.
    #[serde(rename_all = "camelCase")]
    VoiceDisconnect {
        guild_id: GuildId,
        channel_id: ChannelId,
    },
    #[serde(rename_all = "camelCase")]
    Play {
        guild_id: GuildId,
        play_id: u64,
        path: PathBuf,
    },
    #[serde(rename_all = "camelCase")]
    Pause { guild_id: GuildId },
    #[serde(rename_all = "camelCase")]
    Resume { guild_id: GuildId },
    #[serde(rename_all = "camelCase")]
    Stop { guild_id: GuildId },
}
