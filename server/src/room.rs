//! Broadcast rooms and their lifecycle on the relay server
//!
//! This module owns all shared server state:
//! - One `BroadcastRoom` per channel kind, holding the connections attached to it
//! - The position room's table of last-known player snapshots
//! - Room creation on first join and destruction once the last member leaves
//!
//! The server never simulates anything. Position updates are stored and the
//! full roster is pushed back out; every other channel is relayed verbatim.

use log::{debug, info, trace, warn};
use shared::protocol::{
    decode, encode, sanitize_player_id, ChannelKind, MessageDecodeError, PlayerSnapshot, RosterBroadcast,
};
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_tungstenite::tungstenite::Message;

/// Server-assigned identifier of one WebSocket connection
pub type ConnectionId = u64;

/// A connection attached to a room
#[derive(Debug)]
pub struct Member {
    /// Peer address, used for logging only
    pub addr: SocketAddr,
    /// Outbound queue drained by the connection's writer task
    pub sender: mpsc::Sender<Message>,
    /// Sanitized id from the first position update on this connection
    pub player_id: Option<String>,
}

/// Group of connections sharing one channel kind
///
/// Every member receives every broadcast, including the member whose
/// message caused it. Sends never block: a member whose queue is full
/// simply misses that frame, which the latest-state-wins protocol tolerates.
pub struct BroadcastRoom {
    kind: ChannelKind,
    members: HashMap<ConnectionId, Member>,
    /// Last-known snapshot per sanitized player id (position room only)
    active_players: BTreeMap<String, PlayerSnapshot>,
}

impl BroadcastRoom {
    pub fn new(kind: ChannelKind) -> Self {
        Self {
            kind,
            members: HashMap::new(),
            active_players: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    /// Adds a connection to the room
    pub fn join(&mut self, connection: ConnectionId, addr: SocketAddr, sender: mpsc::Sender<Message>) {
        self.members.insert(
            connection,
            Member {
                addr,
                sender,
                player_id: None,
            },
        );
        debug!("{} room: connection {} from {} joined", self.kind, connection, addr);
    }

    /// Removes a connection and, for the position room, its roster entry
    ///
    /// When the departing connection had reported a player id, the remaining
    /// members receive the updated roster with `player_left` set. Returns the
    /// departed player id, if any.
    pub fn leave(&mut self, connection: ConnectionId) -> Option<String> {
        let member = self.members.remove(&connection)?;
        debug!("{} room: connection {} from {} left", self.kind, connection, member.addr);

        let player_id = member.player_id?;
        if self.kind == ChannelKind::Position {
            self.active_players.remove(&player_id);
            info!("Player {} left", player_id);
            self.broadcast_roster(Some(player_id.clone()));
        }
        Some(player_id)
    }

    /// Dispatches one inbound text frame according to the room kind
    pub fn handle_text(&mut self, connection: ConnectionId, text: &str) -> Result<(), MessageDecodeError> {
        match self.kind {
            ChannelKind::Position => self.handle_position(connection, text),
            ChannelKind::Projectile | ChannelKind::State => {
                self.relay_verbatim(text);
                Ok(())
            }
        }
    }

    /// Stores a position update and rebroadcasts the full roster
    ///
    /// Each update overwrites the previous entry for that id wholesale.
    pub fn handle_position(&mut self, connection: ConnectionId, text: &str) -> Result<(), MessageDecodeError> {
        let mut snapshot: PlayerSnapshot = decode("position", text)?;
        snapshot.player_id = sanitize_player_id(&snapshot.player_id);

        if let Some(member) = self.members.get_mut(&connection) {
            if member.player_id.as_deref() != Some(snapshot.player_id.as_str()) {
                debug!("Connection {} reports player {}", connection, snapshot.player_id);
                member.player_id = Some(snapshot.player_id.clone());
            }
        }

        self.active_players
            .insert(snapshot.player_id.clone(), snapshot);
        self.broadcast_roster(None);
        Ok(())
    }

    /// Forwards a frame unchanged to every member, sender included
    pub fn relay_verbatim(&self, text: &str) {
        self.broadcast(text.to_string());
    }

    /// Current roster in id order
    pub fn roster(&self, player_left: Option<String>) -> RosterBroadcast {
        RosterBroadcast {
            players: self.active_players.values().cloned().collect(),
            player_left,
        }
    }

    pub fn active_player(&self, player_id: &str) -> Option<&PlayerSnapshot> {
        self.active_players.get(player_id)
    }

    fn broadcast_roster(&self, player_left: Option<String>) {
        match encode(&self.roster(player_left)) {
            Ok(text) => self.broadcast(text),
            Err(e) => warn!("Failed to encode roster: {}", e),
        }
    }

    fn broadcast(&self, text: String) {
        for (connection, member) in &self.members {
            match member.sender.try_send(Message::Text(text.clone())) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    trace!("{} room: dropped frame for slow connection {}", self.kind, connection);
                }
                Err(TrySendError::Closed(_)) => {
                    trace!("{} room: connection {} already closing", self.kind, connection);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Owns the rooms for all channel kinds and enforces the connection cap
///
/// A room exists only while it has members: it is created by the first
/// join for its kind and dropped, roster and all, when the last member
/// leaves. Shared between connection tasks behind an async `RwLock`.
pub struct RoomRegistry {
    rooms: HashMap<ChannelKind, BroadcastRoom>,
    next_connection_id: ConnectionId,
    max_connections: usize,
}

impl RoomRegistry {
    /// Creates an empty registry with the given connection limit
    pub fn new(max_connections: usize) -> Self {
        Self {
            rooms: HashMap::new(),
            next_connection_id: 1,
            max_connections,
        }
    }

    /// Attaches a new connection to the room for `kind`
    ///
    /// Returns None when the server is at capacity across all rooms.
    pub fn join(
        &mut self,
        kind: ChannelKind,
        addr: SocketAddr,
        sender: mpsc::Sender<Message>,
    ) -> Option<ConnectionId> {
        if self.connection_count() >= self.max_connections {
            warn!("Connection limit reached, rejecting {} on {}", addr, kind);
            return None;
        }

        let connection = self.next_connection_id;
        self.next_connection_id += 1;

        let room = self.rooms.entry(kind).or_insert_with(|| {
            info!("{} room created", kind);
            BroadcastRoom::new(kind)
        });
        room.join(connection, addr, sender);
        Some(connection)
    }

    /// Detaches a connection, destroying its room if it was the last member
    pub fn leave(&mut self, kind: ChannelKind, connection: ConnectionId) -> Option<String> {
        let room = self.rooms.get_mut(&kind)?;
        let departed = room.leave(connection);

        if room.is_empty() {
            self.rooms.remove(&kind);
            info!("{} room destroyed", kind);
        }
        departed
    }

    pub fn handle_text(
        &mut self,
        kind: ChannelKind,
        connection: ConnectionId,
        text: &str,
    ) -> Result<(), MessageDecodeError> {
        match self.rooms.get_mut(&kind) {
            Some(room) => room.handle_text(connection, text),
            None => Ok(()),
        }
    }

    pub fn room(&self, kind: ChannelKind) -> Option<&BroadcastRoom> {
        self.rooms.get(&kind)
    }

    pub fn connection_count(&self) -> usize {
        self.rooms.values().map(BroadcastRoom::len).sum()
    }
}
