//! # Shared Simulation Library
//!
//! Types and pure simulation code used by both the relay server and the game
//! client. Nothing here touches sockets, and apart from `get_timestamp` no code
//! reads the clock: callers pass `now` in milliseconds.
//!
//! ## Modules
//!
//! - `geometry`: vectors, rectangles and the static collision world
//! - `player`: the single `PlayerState` used for local and remote players
//! - `physics`: fixed-step movement of the local player
//! - `combat`: projectiles, ammo, reload and hit resolution
//! - `lifecycle`: the alive/dead state machine and timed respawn
//! - `spawn`: grid-based spawn point generation
//! - `protocol`: JSON messages and the three channel kinds

pub mod combat;
pub mod geometry;
pub mod lifecycle;
pub mod physics;
pub mod player;
pub mod protocol;
pub mod spawn;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub use combat::{CombatConfig, CombatSim, FireOutcome, Projectile, ProjectileEvent, ProjectileOutcome};
pub use geometry::{Rect, StaticGeometry, Vector2};
pub use lifecycle::{LifeState, LifecycleConfig};
pub use physics::{InputFrame, PhysicsConfig};
pub use player::{PlayerFlags, PlayerState, WeaponState};
pub use protocol::{
    sanitize_player_id, BulletMessage, ChannelKind, MessageDecodeError, PlayerSnapshot, RosterBroadcast,
};
pub use spawn::{PlacementError, SpawnConfig, SpawnPoints, SpawnSelector};

/// Fixed simulation rate of the client tick loop
pub const TICK_RATE: u32 = 60;

pub const PLAYER_SIZE: f32 = 20.0;
pub const PLAYER_SPEED: f32 = 5.0;
pub const PLAYER_ACCELERATION: f32 = 0.5;
pub const GRAVITY: f32 = 0.5;
pub const JETPACK_FORCE: f32 = 4.0;
pub const INERTIA_DECAY: f32 = 0.05;
pub const INERTIA_EPSILON: f32 = 0.1;

pub const MAX_HEALTH: u32 = 100;
pub const RESPAWN_DELAY_MS: u64 = 3_000;

pub const BULLET_SPEED: f32 = 20.0;
pub const BULLET_MAX_RANGE: f32 = 500.0;
pub const BULLET_SIZE: f32 = 6.0;
pub const BULLET_DAMAGE: u32 = 10;
pub const MUZZLE_OFFSET: f32 = 10.0;
pub const SHOOT_COOLDOWN_MS: u64 = 100;
pub const MAGAZINE_SIZE: u32 = 25;
pub const RELOAD_TIME_MS: u64 = 2_000;

/// Current wall-clock time in milliseconds
pub fn get_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}
