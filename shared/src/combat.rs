//! Projectiles, ammo and hit resolution
//!
//! A `CombatSim` owns a list of projectiles and steps them one tick at a
//! time. The client keeps two of them: one for its own shots, hit-tested
//! against remote replicas, and one for shots received from peers,
//! hit-tested against the local player only.

use log::{debug, trace};

use crate::geometry::{Rect, StaticGeometry, Vector2};
use crate::lifecycle::{apply_damage, DamageOutcome};
use crate::player::PlayerState;
use crate::{
    BULLET_DAMAGE, BULLET_MAX_RANGE, BULLET_SIZE, BULLET_SPEED, MAGAZINE_SIZE, MUZZLE_OFFSET,
    RELOAD_TIME_MS, SHOOT_COOLDOWN_MS,
};

#[derive(Debug, Clone)]
pub struct CombatConfig {
    pub speed: f32,
    pub max_range: f32,
    pub cooldown_ms: u64,
    pub magazine_size: u32,
    pub reload_time_ms: u64,
    pub damage: u32,
    pub muzzle_offset: f32,
    pub projectile_size: f32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            speed: BULLET_SPEED,
            max_range: BULLET_MAX_RANGE,
            cooldown_ms: SHOOT_COOLDOWN_MS,
            magazine_size: MAGAZINE_SIZE,
            reload_time_ms: RELOAD_TIME_MS,
            damage: BULLET_DAMAGE,
            muzzle_offset: MUZZLE_OFFSET,
            projectile_size: BULLET_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projectile {
    pub x: f32,
    pub y: f32,
    pub spawn_x: f32,
    pub spawn_y: f32,
    pub angle: f32,
    pub speed: f32,
    pub owner_id: String,
    pub destroyed: bool,
}

impl Projectile {
    pub fn new(owner_id: impl Into<String>, spawn_x: f32, spawn_y: f32, angle: f32, speed: f32) -> Self {
        Self {
            x: spawn_x,
            y: spawn_y,
            spawn_x,
            spawn_y,
            angle,
            speed,
            owner_id: owner_id.into(),
            destroyed: false,
        }
    }

    pub fn rect(&self, size: f32) -> Rect {
        Rect::centered(self.x, self.y, size)
    }

    pub fn distance_travelled(&self) -> f32 {
        Vector2::new(self.spawn_x, self.spawn_y).distance(&Vector2::new(self.x, self.y))
    }

    fn step(&mut self) {
        let heading = Vector2::from_angle(self.angle).scale(self.speed);
        self.x += heading.x;
        self.y += heading.y;
    }
}

/// Result of a fire attempt
#[derive(Debug, Clone, PartialEq)]
pub enum FireOutcome {
    /// A projectile left the muzzle at this point and heading
    Fired {
        spawn_x: f32,
        spawn_y: f32,
        angle: f32,
    },
    CoolingDown,
    Reloading,
    /// Magazine was empty, so the attempt started a reload instead
    ReloadStarted,
    /// Dead players cannot fire
    Suppressed,
}

/// What happened to one projectile during one tick
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectileOutcome {
    MapCollision,
    PlayerHit { target_id: String, killed: bool },
    RangeExpired,
    InFlight,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectileEvent {
    pub owner_id: String,
    pub x: f32,
    pub y: f32,
    pub outcome: ProjectileOutcome,
}

pub struct CombatSim {
    config: CombatConfig,
    projectiles: Vec<Projectile>,
}

impl CombatSim {
    pub fn new(config: CombatConfig) -> Self {
        Self {
            config,
            projectiles: Vec::new(),
        }
    }

    pub fn config(&self) -> &CombatConfig {
        &self.config
    }

    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    /// Attempts a shot from `shooter` toward `aim` (world coordinates)
    ///
    /// Checks run in order: dead, reloading, empty magazine (auto-reload),
    /// cooldown. A successful shot spends one round and spawns a projectile
    /// pushed out from the shooter's center along the aim vector.
    pub fn fire(&mut self, shooter: &mut PlayerState, aim: Vector2, now: u64) -> FireOutcome {
        if !shooter.is_alive() {
            return FireOutcome::Suppressed;
        }
        if shooter.weapon.reloading {
            return FireOutcome::Reloading;
        }
        if shooter.weapon.ammo == 0 {
            self.start_reload(shooter, now);
            return FireOutcome::ReloadStarted;
        }
        if let Some(last) = shooter.weapon.last_shot_at {
            if now.saturating_sub(last) < self.config.cooldown_ms {
                return FireOutcome::CoolingDown;
            }
        }

        let center = shooter.center();
        let angle = center.angle_to(&aim);
        let muzzle = center.add(&Vector2::from_angle(angle).scale(self.config.muzzle_offset));

        shooter.weapon.ammo -= 1;
        shooter.weapon.last_shot_at = Some(now);
        self.projectiles.push(Projectile::new(
            shooter.id.clone(),
            muzzle.x,
            muzzle.y,
            angle,
            self.config.speed,
        ));
        trace!("{} fired, {} rounds left", shooter.id, shooter.weapon.ammo);

        FireOutcome::Fired {
            spawn_x: muzzle.x,
            spawn_y: muzzle.y,
            angle,
        }
    }

    /// Begins a reload unless one is running or the magazine is full
    pub fn start_reload(&self, shooter: &mut PlayerState, now: u64) -> bool {
        if shooter.weapon.reloading || shooter.weapon.ammo >= shooter.weapon.magazine {
            return false;
        }
        shooter.weapon.reloading = true;
        shooter.weapon.reload_started_at = now;
        debug!("{} reloading", shooter.id);
        true
    }

    /// Finishes a running reload once its duration has elapsed
    pub fn update_reload(&self, shooter: &mut PlayerState, now: u64) -> bool {
        if !shooter.weapon.reloading {
            return false;
        }
        if now.saturating_sub(shooter.weapon.reload_started_at) < self.config.reload_time_ms {
            return false;
        }
        shooter.weapon.refill();
        debug!("{} reload complete", shooter.id);
        true
    }

    /// Adds a projectile announced by a peer; it is driven purely by physics
    pub fn receive_remote_spawn(&mut self, owner_id: impl Into<String>, x: f32, y: f32, angle: f32) {
        self.projectiles
            .push(Projectile::new(owner_id, x, y, angle, self.config.speed));
    }

    /// Steps every projectile one tick and prunes the destroyed ones
    ///
    /// Per projectile the checks run in a fixed order and stop at the first
    /// that applies: already destroyed, map collision, player hit, range
    /// expiry. A hit damages only the first overlapping living target that
    /// is not the projectile's owner. Returns one event per projectile that
    /// was alive at the start of the tick.
    pub fn advance(
        &mut self,
        geometry: &StaticGeometry,
        targets: &mut [&mut PlayerState],
        now: u64,
    ) -> Vec<ProjectileEvent> {
        let size = self.config.projectile_size;
        let damage = self.config.damage;
        let max_range = self.config.max_range;
        let mut events = Vec::with_capacity(self.projectiles.len());

        for projectile in self.projectiles.iter_mut() {
            if projectile.destroyed {
                continue;
            }

            projectile.step();
            let rect = projectile.rect(size);

            let outcome = if geometry.overlaps(&rect) {
                ProjectileOutcome::MapCollision
            } else if let Some(target) = targets.iter_mut().find(|t| {
                t.is_alive() && t.id != projectile.owner_id && t.rect().intersects(&rect)
            }) {
                let killed = apply_damage(target, damage, now) == DamageOutcome::Killed;
                ProjectileOutcome::PlayerHit {
                    target_id: target.id.clone(),
                    killed,
                }
            } else if projectile.distance_travelled() >= max_range {
                ProjectileOutcome::RangeExpired
            } else {
                ProjectileOutcome::InFlight
            };

            if outcome != ProjectileOutcome::InFlight {
                projectile.destroyed = true;
            }
            events.push(ProjectileEvent {
                owner_id: projectile.owner_id.clone(),
                x: projectile.x,
                y: projectile.y,
                outcome,
            });
        }

        self.projectiles.retain(|p| !p.destroyed);
        events
    }

    pub fn clear(&mut self) {
        self.projectiles.clear();
    }
}
