//! Fixed-step client simulation
//!
//! `ClientGame` owns the local player and both projectile simulations. One
//! call to `tick` runs a whole simulation step and hands back what the
//! caller should publish and play.

use crate::presentation::{proximity_volume, SoundCue};
use crate::roster::RosterSync;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::lifecycle::respawn_if_due;
use shared::physics::simulate_local;
use shared::{
    BulletMessage, CombatConfig, CombatSim, FireOutcome, InputFrame, LifecycleConfig,
    PhysicsConfig, PlacementError, PlayerSnapshot, PlayerState, Projectile, ProjectileEvent,
    ProjectileOutcome, SpawnConfig, SpawnPoints, SpawnSelector, StaticGeometry, Vector2, MAX_HEALTH,
};

#[derive(Debug, Clone, Default)]
pub struct GameConfig {
    pub physics: PhysicsConfig,
    pub combat: CombatConfig,
    pub lifecycle: LifecycleConfig,
    pub spawn: SpawnConfig,
}

/// Gameplay notifications surfaced to the HUD and logs
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    Respawned { x: f32, y: f32 },
    ReloadStarted,
    ReloadFinished,
    /// One of our projectiles hit a remote replica
    Hit { target_id: String, killed: bool },
    /// A peer's projectile hit the local player
    HitBy { owner_id: String, killed: bool },
}

/// Everything one tick produced for the outside world
#[derive(Debug, Clone)]
pub struct TickOutput {
    pub position: PlayerSnapshot,
    pub bullet: Option<BulletMessage>,
    pub sounds: Vec<SoundCue>,
    pub events: Vec<GameEvent>,
}

pub struct ClientGame {
    local: PlayerState,
    geometry: StaticGeometry,
    spawn_points: SpawnPoints,
    own_shots: CombatSim,
    incoming_shots: CombatSim,
    config: GameConfig,
    rng: StdRng,
    was_jetpacking: bool,
}

impl ClientGame {
    /// Generates spawn points for `geometry` and places the local player on one
    pub fn new(
        local_id: &str,
        geometry: StaticGeometry,
        config: GameConfig,
        mut rng: StdRng,
    ) -> Result<Self, PlacementError> {
        let spawn_points = SpawnSelector::new(config.spawn.clone()).generate(&geometry, &mut rng)?;
        let start = spawn_points.choose(&mut rng)?;
        info!(
            "Generated {} spawn points, starting at ({:.0}, {:.0})",
            spawn_points.len(),
            start.x,
            start.y
        );

        Ok(Self {
            local: PlayerState::new_local(local_id, start.x, start.y),
            geometry,
            spawn_points,
            own_shots: CombatSim::new(config.combat.clone()),
            incoming_shots: CombatSim::new(config.combat.clone()),
            config,
            rng,
            was_jetpacking: false,
        })
    }

    pub fn with_seed(
        local_id: &str,
        geometry: StaticGeometry,
        config: GameConfig,
        seed: u64,
    ) -> Result<Self, PlacementError> {
        Self::new(local_id, geometry, config, StdRng::seed_from_u64(seed))
    }

    /// Runs one simulation step
    ///
    /// Order: respawn, movement, weapon, inbound spawns, our projectiles
    /// against remote replicas, peer projectiles against the local player,
    /// audio cues.
    pub fn tick(
        &mut self,
        input: &InputFrame,
        roster: &RosterSync,
        now: u64,
    ) -> Result<TickOutput, PlacementError> {
        let mut sounds = Vec::new();
        let mut events = Vec::new();

        if respawn_if_due(
            &mut self.local,
            now,
            &self.config.lifecycle,
            &self.spawn_points,
            &mut self.rng,
        )? {
            events.push(GameEvent::Respawned {
                x: self.local.x,
                y: self.local.y,
            });
        }

        simulate_local(&mut self.local, input, &self.geometry, &self.config.physics);

        let bullet = self.update_weapon(input, now, &mut sounds, &mut events);

        let listener = self.local.center();
        for spawn in roster.drain_spawns() {
            sounds.push(SoundCue::RemoteFire {
                owner_id: spawn.owner_id.clone(),
                volume: proximity_volume(listener, Vector2::new(spawn.x, spawn.y)),
            });
            self.incoming_shots
                .receive_remote_spawn(spawn.owner_id, spawn.x, spawn.y, spawn.angle);
        }

        let own_shots = &mut self.own_shots;
        let geometry = &self.geometry;
        let own_events = roster.with_remotes_mut(|remotes| {
            let mut targets: Vec<&mut PlayerState> = remotes.values_mut().collect();
            own_shots.advance(geometry, &mut targets, now)
        });
        for event in own_events {
            if let ProjectileOutcome::PlayerHit { target_id, killed } = event.outcome {
                debug!("Hit {} (killed: {})", target_id, killed);
                events.push(GameEvent::Hit { target_id, killed });
            }
        }

        let incoming_events = self
            .incoming_shots
            .advance(&self.geometry, &mut [&mut self.local], now);
        events.extend(incoming_events.into_iter().filter_map(Self::hit_by));

        let jetpacking = self.local.is_alive() && self.local.flags.is_flying;
        if jetpacking && !self.was_jetpacking {
            sounds.push(SoundCue::JetpackStart);
        } else if !jetpacking && self.was_jetpacking {
            sounds.push(SoundCue::JetpackStop);
        }
        self.was_jetpacking = jetpacking;

        debug_assert!(self.local.health <= MAX_HEALTH);
        debug_assert_eq!(self.local.flags.is_dead, self.local.health == 0);
        debug_assert!(self.local.weapon.ammo <= self.local.weapon.magazine);

        Ok(TickOutput {
            position: self.local.snapshot(),
            bullet,
            sounds,
            events,
        })
    }

    fn update_weapon(
        &mut self,
        input: &InputFrame,
        now: u64,
        sounds: &mut Vec<SoundCue>,
        events: &mut Vec<GameEvent>,
    ) -> Option<BulletMessage> {
        if self.own_shots.update_reload(&mut self.local, now) {
            events.push(GameEvent::ReloadFinished);
        }
        if input.reload && self.local.is_alive() && self.own_shots.start_reload(&mut self.local, now) {
            events.push(GameEvent::ReloadStarted);
        }
        if !input.fire {
            return None;
        }

        match self.own_shots.fire(&mut self.local, input.aim, now) {
            FireOutcome::Fired {
                spawn_x,
                spawn_y,
                angle,
            } => {
                sounds.push(SoundCue::Fire);
                Some(BulletMessage::BulletSpawn {
                    player_id: self.local.id.clone(),
                    spawn_x,
                    spawn_y,
                    angle,
                    timestamp: now,
                })
            }
            FireOutcome::ReloadStarted => {
                events.push(GameEvent::ReloadStarted);
                None
            }
            _ => None,
        }
    }

    fn hit_by(event: ProjectileEvent) -> Option<GameEvent> {
        match event.outcome {
            ProjectileOutcome::PlayerHit { killed, .. } => Some(GameEvent::HitBy {
                owner_id: event.owner_id,
                killed,
            }),
            _ => None,
        }
    }

    pub fn local(&self) -> &PlayerState {
        &self.local
    }

    pub fn local_mut(&mut self) -> &mut PlayerState {
        &mut self.local
    }

    pub fn geometry(&self) -> &StaticGeometry {
        &self.geometry
    }

    pub fn spawn_points(&self) -> &SpawnPoints {
        &self.spawn_points
    }

    /// Own and peer projectiles, for drawing
    pub fn projectiles(&self) -> impl Iterator<Item = &Projectile> {
        self.own_shots
            .projectiles()
            .iter()
            .chain(self.incoming_shots.projectiles())
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }
}
