//! JSON wire format shared by the relay server and the game client
//!
//! Every message is a single WebSocket text frame holding one JSON object.
//! The three channel kinds map to fixed endpoint paths; the server only
//! decodes position traffic and relays the other two verbatim.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::MAX_HEALTH;

/// The three independent logical connections a client holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelKind {
    Position,
    Projectile,
    State,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 3] = [
        ChannelKind::Position,
        ChannelKind::Projectile,
        ChannelKind::State,
    ];

    /// Endpoint path served by the relay for this kind
    pub fn path(&self) -> &'static str {
        match self {
            ChannelKind::Position => "/ws/game/position/",
            ChannelKind::Projectile => "/ws/game/bullets/",
            ChannelKind::State => "/ws/game/state/",
        }
    }

    /// Maps a request path back to a channel kind, ignoring any query string
    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.split('?').next().unwrap_or(path);
        Self::ALL.into_iter().find(|kind| kind.path() == path)
    }

    /// Minimum spacing between two outbound sends on this channel
    pub fn default_send_interval(&self) -> Duration {
        match self {
            ChannelKind::Position => Duration::from_millis(30),
            ChannelKind::Projectile => Duration::from_millis(10),
            ChannelKind::State => Duration::from_millis(250),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChannelKind::Position => "position",
            ChannelKind::Projectile => "projectile",
            ChannelKind::State => "state",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn full_health() -> u32 {
    MAX_HEALTH
}

/// One player's replicated state as carried on the position channel
///
/// Clients that only send `{player_id, x, y}` are still accepted; the
/// missing fields fall back to a healthy, idle player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub player_id: String,
    pub x: f32,
    pub y: f32,
    #[serde(default = "full_health")]
    pub health: u32,
    #[serde(default)]
    pub is_flying: bool,
    #[serde(default)]
    pub is_running: bool,
    #[serde(default)]
    pub facing_left: bool,
    #[serde(default)]
    pub is_dead: bool,
}

/// Full roster the server pushes after every position update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterBroadcast {
    pub players: Vec<PlayerSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_left: Option<String>,
}

/// Messages carried on the projectile channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BulletMessage {
    BulletSpawn {
        player_id: String,
        spawn_x: f32,
        spawn_y: f32,
        angle: f32,
        timestamp: u64,
    },
}

#[derive(Debug, Error)]
#[error("malformed {kind} message: {source}")]
pub struct MessageDecodeError {
    pub kind: &'static str,
    #[source]
    pub source: serde_json::Error,
}

pub fn encode<T: Serialize>(message: &T) -> serde_json::Result<String> {
    serde_json::to_string(message)
}

/// Decodes one text frame, tagging failures with the expected message kind
pub fn decode<T: DeserializeOwned>(kind: &'static str, text: &str) -> Result<T, MessageDecodeError> {
    serde_json::from_str(text).map_err(|source| MessageDecodeError { kind, source })
}

/// Normalizes a client-supplied player id into the roster key
///
/// Keeps the text after the last `!`, then the text after the last `.` of
/// that, so `"abc!123.456"` becomes `"456"` and plain ids pass unchanged.
pub fn sanitize_player_id(raw: &str) -> String {
    let after_bang = raw.rsplit('!').next().unwrap_or(raw);
    after_bang
        .rsplit('.')
        .next()
        .unwrap_or(after_bang)
        .to_string()
}
