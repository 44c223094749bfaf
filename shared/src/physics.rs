//! Fixed-step movement for the locally controlled player
//!
//! All quantities are per tick: velocities are in units per tick and the
//! tick loop is expected to call `simulate_local` at a fixed rate. Remote
//! players are never simulated here; they only move when a snapshot arrives.

use crate::geometry::{StaticGeometry, Vector2};
use crate::player::PlayerState;
use crate::{
    GRAVITY, INERTIA_DECAY, INERTIA_EPSILON, JETPACK_FORCE, PLAYER_ACCELERATION, PLAYER_SIZE,
    PLAYER_SPEED,
};

/// Movement tunables
#[derive(Debug, Clone)]
pub struct PhysicsConfig {
    pub player_size: f32,
    pub max_speed: f32,
    pub acceleration: f32,
    pub gravity: f32,
    pub jetpack_force: f32,
    pub down_bias: f32,
    pub inertia_decay: f32,
    pub inertia_epsilon: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            player_size: PLAYER_SIZE,
            max_speed: PLAYER_SPEED,
            acceleration: PLAYER_ACCELERATION,
            gravity: GRAVITY,
            jetpack_force: JETPACK_FORCE,
            down_bias: 0.1 * PLAYER_SPEED,
            inertia_decay: INERTIA_DECAY,
            inertia_epsilon: INERTIA_EPSILON,
        }
    }
}

/// One tick worth of player intent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputFrame {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    pub fire: bool,
    pub reload: bool,
    /// Aim point in world coordinates
    pub aim: Vector2,
}

impl InputFrame {
    pub fn horizontal(&self) -> bool {
        self.left || self.right
    }

    /// Jetpack held while steering sideways; arms inertia when released
    pub fn is_flying(&self) -> bool {
        self.up && self.horizontal()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisOutcome {
    Committed,
    Rejected,
}

/// Per-axis result of one collision resolution pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepReport {
    pub x: AxisOutcome,
    pub y: AxisOutcome,
}

/// Advances the local player by one tick
///
/// Updates velocity from input and gravity, then moves the player through
/// `integrate`. Dead players are left untouched.
pub fn simulate_local(
    player: &mut PlayerState,
    input: &InputFrame,
    geometry: &StaticGeometry,
    config: &PhysicsConfig,
) -> Option<StepReport> {
    if !player.is_alive() {
        return None;
    }

    update_horizontal(player, input, config);
    update_vertical(player, input, config);

    player.flags.is_flying = input.up;
    player.flags.is_running = input.horizontal() && !input.up;

    Some(integrate(player, geometry, config))
}

fn update_horizontal(player: &mut PlayerState, input: &InputFrame, config: &PhysicsConfig) {
    let flying_now = input.is_flying();
    if player.was_flying && !flying_now {
        player.inertia_active = true;
        player.inertia_velocity_x = player.vel_x;
    }
    player.was_flying = flying_now;

    if input.left {
        player.vel_x = (player.vel_x - config.acceleration).max(-config.max_speed);
        player.flags.facing_left = true;
        player.inertia_active = false;
    } else if input.right {
        player.vel_x = (player.vel_x + config.acceleration).min(config.max_speed);
        player.flags.facing_left = false;
        player.inertia_active = false;
    } else if player.inertia_active {
        player.inertia_velocity_x *= 1.0 - config.inertia_decay;
        player.vel_x = player.inertia_velocity_x;
        if player.vel_x.abs() < config.inertia_epsilon {
            player.vel_x = 0.0;
            player.inertia_active = false;
        }
    } else {
        player.vel_x *= 1.0 - config.inertia_decay;
        if player.vel_x.abs() < config.inertia_epsilon {
            player.vel_x = 0.0;
        }
    }
}

fn update_vertical(player: &mut PlayerState, input: &InputFrame, config: &PhysicsConfig) {
    player.vel_y += config.gravity;
    if input.up {
        player.vel_y = -config.jetpack_force;
    }
    if input.down {
        player.vel_y += config.down_bias;
    }
}

/// Moves the player by its current velocity against static geometry
///
/// X is tested and committed before Y, each on its own candidate rectangle.
/// A rejected axis keeps its position and has its velocity zeroed; a
/// rejected fall lands the player. The result is clamped to the map and
/// `on_ground` is finally confirmed by probing one unit below.
pub fn integrate(
    player: &mut PlayerState,
    geometry: &StaticGeometry,
    config: &PhysicsConfig,
) -> StepReport {
    let size = config.player_size;

    let candidate_x = player.rect().translated(player.vel_x, 0.0);
    let x = if geometry.overlaps(&candidate_x) {
        player.vel_x = 0.0;
        AxisOutcome::Rejected
    } else {
        player.x += player.vel_x;
        AxisOutcome::Committed
    };

    let candidate_y = player.rect().translated(0.0, player.vel_y);
    let y = if geometry.overlaps(&candidate_y) {
        if player.vel_y > 0.0 {
            player.on_ground = true;
        }
        player.vel_y = 0.0;
        AxisOutcome::Rejected
    } else {
        player.y += player.vel_y;
        player.on_ground = false;
        AxisOutcome::Committed
    };

    player.x = player.x.clamp(0.0, (geometry.width() - size).max(0.0));
    player.y = player.y.clamp(0.0, (geometry.height() - size).max(0.0));

    let below = player.rect().translated(0.0, 1.0);
    player.on_ground = geometry.overlaps(&below) || player.y + size >= geometry.height();

    StepReport { x, y }
}
