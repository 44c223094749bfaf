//! Alive/dead state machine shared by local and remote players
//!
//! Respawn is not a state of its own: it is the timed exit from `Dead`
//! back to `Alive`, fired by `respawn_if_due` once the delay has passed.

use log::debug;
use rand::Rng;

use crate::player::PlayerState;
use crate::spawn::{PlacementError, SpawnPoints};
use crate::{MAX_HEALTH, RESPAWN_DELAY_MS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifeState {
    Alive,
    Dead,
}

#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    pub respawn_delay_ms: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            respawn_delay_ms: RESPAWN_DELAY_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageOutcome {
    /// Target was already dead; nothing applied
    Ignored,
    Wounded { remaining: u32 },
    Killed,
}

pub fn life_state(player: &PlayerState) -> LifeState {
    if player.flags.is_dead {
        LifeState::Dead
    } else {
        LifeState::Alive
    }
}

/// Subtracts `damage` from a living player, killing it at zero health
pub fn apply_damage(player: &mut PlayerState, damage: u32, now: u64) -> DamageOutcome {
    if !player.is_alive() {
        return DamageOutcome::Ignored;
    }

    player.health = player.health.saturating_sub(damage);
    if player.health == 0 {
        mark_dead(player, now);
        DamageOutcome::Killed
    } else {
        DamageOutcome::Wounded {
            remaining: player.health,
        }
    }
}

/// Alive -> Dead entry action
pub fn mark_dead(player: &mut PlayerState, now: u64) {
    if player.flags.is_dead {
        return;
    }
    debug!("Player {} died at {}", player.id, now);
    player.health = 0;
    player.flags.is_dead = true;
    player.death_time = Some(now);
    player.vel_x = 0.0;
    player.vel_y = 0.0;
    player.inertia_active = false;
    player.was_flying = false;
    player.flags.is_flying = false;
    player.flags.is_running = false;
}

/// Dead -> Alive transition, a no-op until the respawn delay has elapsed
///
/// Returns `Ok(true)` when the player was respawned. A dead player without
/// a recorded death time is treated as having died at `now`.
pub fn respawn_if_due<R: Rng>(
    player: &mut PlayerState,
    now: u64,
    config: &LifecycleConfig,
    spawn_points: &SpawnPoints,
    rng: &mut R,
) -> Result<bool, PlacementError> {
    if player.is_alive() {
        return Ok(false);
    }

    let death_time = *player.death_time.get_or_insert(now);
    if now.saturating_sub(death_time) < config.respawn_delay_ms {
        return Ok(false);
    }

    let point = spawn_points.choose(rng)?;
    player.x = point.x;
    player.y = point.y;
    player.vel_x = 0.0;
    player.vel_y = 0.0;
    player.health = MAX_HEALTH;
    player.weapon.refill();
    player.weapon.last_shot_at = None;
    player.death_time = None;
    player.flags.is_dead = false;
    player.on_ground = false;

    debug!("Player {} respawned at ({:.1}, {:.1})", player.id, point.x, point.y);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vector2;
    use rand::{rngs::StdRng, SeedableRng};

    fn points() -> SpawnPoints {
        SpawnPoints::from_points(vec![Vector2::new(40.0, 80.0)])
    }

    #[test]
    fn test_damage_then_death() {
        let mut player = PlayerState::new_local("a", 0.0, 0.0);
        assert_eq!(life_state(&player), LifeState::Alive);

        assert_eq!(apply_damage(&mut player, 30, 10), DamageOutcome::Wounded { remaining: 70 });
        assert_eq!(apply_damage(&mut player, 500, 20), DamageOutcome::Killed);
        assert_eq!(player.health, 0);
        assert!(player.flags.is_dead);
        assert_eq!(player.death_time, Some(20));
        assert_eq!(life_state(&player), LifeState::Dead);

        assert_eq!(apply_damage(&mut player, 10, 30), DamageOutcome::Ignored);
        assert_eq!(player.death_time, Some(20));
    }

    #[test]
    fn test_respawn_before_delay_is_noop() {
        let config = LifecycleConfig::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut player = PlayerState::new_local("a", 5.0, 5.0);
        player.weapon.ammo = 3;
        mark_dead(&mut player, 1_000);
        let before = player.clone();

        for now in [1_000, 1_500, 1_000 + config.respawn_delay_ms - 1] {
            assert!(!respawn_if_due(&mut player, now, &config, &points(), &mut rng).unwrap());
            assert_eq!(player, before);
        }
    }

    #[test]
    fn test_respawn_after_delay_resets_player() {
        let config = LifecycleConfig::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut player = PlayerState::new_local("a", 5.0, 5.0);
        player.weapon.ammo = 3;
        player.weapon.reloading = true;
        mark_dead(&mut player, 1_000);

        let respawned =
            respawn_if_due(&mut player, 1_000 + config.respawn_delay_ms, &config, &points(), &mut rng)
                .unwrap();

        assert!(respawned);
        assert_eq!(player.health, 100);
        assert!(!player.flags.is_dead);
        assert!(player.death_time.is_none());
        assert_eq!(player.weapon.ammo, player.weapon.magazine);
        assert!(!player.weapon.reloading);
        assert_eq!((player.x, player.y), (40.0, 80.0));

        // A second call on a living player changes nothing
        assert!(!respawn_if_due(&mut player, 99_999, &config, &points(), &mut rng).unwrap());
    }

    #[test]
    fn test_respawn_surfaces_empty_spawn_list() {
        let config = LifecycleConfig::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut player = PlayerState::new_local("a", 5.0, 5.0);
        mark_dead(&mut player, 0);

        let result = respawn_if_due(
            &mut player,
            config.respawn_delay_ms,
            &config,
            &SpawnPoints::from_points(Vec::new()),
            &mut rng,
        );
        assert!(matches!(result, Err(PlacementError::EmptyGrid)));
        assert!(player.flags.is_dead);
    }
}
