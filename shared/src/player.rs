//! Player state shared by the local simulation and remote replicas
//!
//! One `PlayerState` type serves both roles; `is_local` marks the player the
//! client simulates. Remote replicas are overwritten from `PlayerSnapshot`s.

use crate::geometry::{Rect, Vector2};
use crate::protocol::PlayerSnapshot;
use crate::{MAGAZINE_SIZE, MAX_HEALTH, PLAYER_SIZE};

/// Animation and replication flags mirrored on the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerFlags {
    pub is_flying: bool,
    pub is_running: bool,
    pub facing_left: bool,
    pub is_dead: bool,
}

/// Ammo and reload bookkeeping for one player
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeaponState {
    pub ammo: u32,
    pub magazine: u32,
    pub reloading: bool,
    pub reload_started_at: u64,
    pub last_shot_at: Option<u64>,
}

impl WeaponState {
    pub fn new(magazine: u32) -> Self {
        Self {
            ammo: magazine,
            magazine,
            reloading: false,
            reload_started_at: 0,
            last_shot_at: None,
        }
    }

    pub fn refill(&mut self) {
        self.ammo = self.magazine;
        self.reloading = false;
        self.reload_started_at = 0;
    }
}

/// State of a single player, local or remote
///
/// The local player is driven by `physics::simulate_local` every tick.
/// Remote players are replicas overwritten by `apply_remote_snapshot`
/// whenever a roster arrives; their velocity and weapon fields are unused.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub id: String,
    pub is_local: bool,
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub health: u32,
    pub flags: PlayerFlags,
    pub death_time: Option<u64>,
    pub on_ground: bool,
    /// Up held together with a horizontal key on the previous tick
    pub was_flying: bool,
    pub inertia_active: bool,
    pub inertia_velocity_x: f32,
    pub weapon: WeaponState,
}

impl PlayerState {
    pub fn new_local(id: impl Into<String>, x: f32, y: f32) -> Self {
        Self::new(id.into(), true, x, y)
    }

    pub fn new_remote(id: impl Into<String>, x: f32, y: f32) -> Self {
        Self::new(id.into(), false, x, y)
    }

    fn new(id: String, is_local: bool, x: f32, y: f32) -> Self {
        Self {
            id,
            is_local,
            x,
            y,
            vel_x: 0.0,
            vel_y: 0.0,
            health: MAX_HEALTH,
            flags: PlayerFlags::default(),
            death_time: None,
            on_ground: false,
            was_flying: false,
            inertia_active: false,
            inertia_velocity_x: 0.0,
            weapon: WeaponState::new(MAGAZINE_SIZE),
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, PLAYER_SIZE, PLAYER_SIZE)
    }

    pub fn center(&self) -> Vector2 {
        self.rect().center()
    }

    pub fn is_alive(&self) -> bool {
        !self.flags.is_dead
    }

    /// Builds the position-channel payload for this player
    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            player_id: self.id.clone(),
            x: self.x,
            y: self.y,
            health: self.health,
            is_flying: self.flags.is_flying,
            is_running: self.flags.is_running,
            facing_left: self.flags.facing_left,
            is_dead: self.flags.is_dead,
        }
    }

    /// Overwrites a remote replica with the latest snapshot for it
    ///
    /// No merge happens: whatever arrived last wins. A replica that flips
    /// to dead records `now` as its death time so its respawn can be timed
    /// locally; flipping back to alive clears it.
    pub fn apply_remote_snapshot(&mut self, snapshot: &PlayerSnapshot, now: u64) {
        debug_assert!(!self.is_local, "snapshot applied to the local player");

        let was_dead = self.flags.is_dead;
        let is_dead = snapshot.is_dead || snapshot.health == 0;
        self.x = snapshot.x;
        self.y = snapshot.y;
        self.health = snapshot.health.min(MAX_HEALTH);
        self.flags = PlayerFlags {
            is_flying: snapshot.is_flying,
            is_running: snapshot.is_running,
            facing_left: snapshot.facing_left,
            is_dead,
        };

        if is_dead && !was_dead {
            self.death_time = Some(now);
        } else if !is_dead {
            self.death_time = None;
        }
    }
}
