//! Client-side cache of remote players and inbound projectile spawns
//!
//! Written from the network runtime by the channel handlers and read by the
//! simulation/render thread. Everything sits behind one `std::sync::Mutex`
//! that is held only for short copies, never across an await.

use crate::channel::MessageHandler;
use log::{debug, trace, warn};
use shared::protocol::{decode, sanitize_player_id};
use shared::{get_timestamp, BulletMessage, PlayerState, RosterBroadcast};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// A projectile announced by a peer, waiting for the next tick
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteSpawn {
    pub owner_id: String,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
}

#[derive(Default)]
struct RosterInner {
    remotes: HashMap<String, PlayerState>,
    pending_spawns: Vec<RemoteSpawn>,
}

/// Shared roster of remote players keyed by player id
#[derive(Clone)]
pub struct RosterSync {
    local_id: Arc<str>,
    inner: Arc<Mutex<RosterInner>>,
}

impl RosterSync {
    /// `local_id` is reduced to the key the server files it under
    pub fn new(local_id: &str) -> Self {
        Self {
            local_id: Arc::from(sanitize_player_id(local_id)),
            inner: Arc::new(Mutex::new(RosterInner::default())),
        }
    }

    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    fn lock(&self) -> MutexGuard<'_, RosterInner> {
        // A panic while holding the lock leaves plain data behind; keep using it
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Applies a full roster broadcast
    ///
    /// Every listed player other than the local one is overwritten wholesale
    /// with its snapshot; new ids are added on first sight. `player_left`
    /// removes that id. Players missing from the list are kept as they were.
    pub fn apply_roster(&self, roster: &RosterBroadcast, now: u64) {
        let mut inner = self.lock();

        for snapshot in &roster.players {
            if snapshot.player_id == *self.local_id {
                continue;
            }
            let replica = inner
                .remotes
                .entry(snapshot.player_id.clone())
                .or_insert_with(|| {
                    debug!("Player {} joined", snapshot.player_id);
                    PlayerState::new_remote(snapshot.player_id.clone(), snapshot.x, snapshot.y)
                });
            replica.apply_remote_snapshot(snapshot, now);
        }

        if let Some(left) = &roster.player_left {
            if inner.remotes.remove(left).is_some() {
                debug!("Player {} left", left);
            }
        }

        debug_assert!(
            !inner.remotes.contains_key(&*self.local_id),
            "local player present in remote roster"
        );
    }

    /// Queues a peer's projectile; echoes of our own shots are ignored
    pub fn apply_bullet(&self, message: &BulletMessage) {
        match message {
            BulletMessage::BulletSpawn {
                player_id,
                spawn_x,
                spawn_y,
                angle,
                ..
            } => {
                if sanitize_player_id(player_id) == *self.local_id {
                    return;
                }
                self.lock().pending_spawns.push(RemoteSpawn {
                    owner_id: player_id.clone(),
                    x: *spawn_x,
                    y: *spawn_y,
                    angle: *angle,
                });
            }
        }
    }

    pub fn drain_spawns(&self) -> Vec<RemoteSpawn> {
        std::mem::take(&mut self.lock().pending_spawns)
    }

    /// Runs `f` with mutable access to every remote replica
    pub fn with_remotes_mut<R>(&self, f: impl FnOnce(&mut HashMap<String, PlayerState>) -> R) -> R {
        f(&mut self.lock().remotes)
    }

    /// Copy of the current remote players, sorted by id
    pub fn snapshot(&self) -> Vec<PlayerState> {
        let mut players: Vec<PlayerState> = self.lock().remotes.values().cloned().collect();
        players.sort_by(|a, b| a.id.cmp(&b.id));
        players
    }

    pub fn get(&self, player_id: &str) -> Option<PlayerState> {
        self.lock().remotes.get(player_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().remotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Position channel handler: decodes roster broadcasts
pub struct PositionHandler {
    roster: RosterSync,
}

impl PositionHandler {
    pub fn new(roster: RosterSync) -> Self {
        Self { roster }
    }
}

impl MessageHandler for PositionHandler {
    fn handle(&self, text: &str) {
        match decode::<RosterBroadcast>("roster", text) {
            Ok(roster) => self.roster.apply_roster(&roster, get_timestamp()),
            Err(e) => warn!("{}", e),
        }
    }
}

/// Projectile channel handler: queues peers' bullet spawns
pub struct ProjectileHandler {
    roster: RosterSync,
}

impl ProjectileHandler {
    pub fn new(roster: RosterSync) -> Self {
        Self { roster }
    }
}

impl MessageHandler for ProjectileHandler {
    fn handle(&self, text: &str) {
        match decode::<BulletMessage>("bullet", text) {
            Ok(message) => self.roster.apply_bullet(&message),
            Err(e) => warn!("{}", e),
        }
    }
}

/// Generic state channel handler; payloads are only logged
pub struct StateHandler;

impl MessageHandler for StateHandler {
    fn handle(&self, text: &str) {
        trace!("state message: {}", text);
    }
}
