//! Collision-free spawn point generation over a grid of map regions

use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

use crate::geometry::{Rect, StaticGeometry, Vector2};
use crate::PLAYER_SIZE;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlacementError {
    #[error("no free spot found in region ({region_x}, {region_y}) after {attempts} attempts")]
    RegionBlocked {
        region_x: usize,
        region_y: usize,
        attempts: u32,
    },
    #[error("region ({region_x}, {region_y}) is smaller than a player")]
    RegionTooSmall { region_x: usize, region_y: usize },
    #[error("spawn grid has no regions")]
    EmptyGrid,
}

#[derive(Debug, Clone)]
pub struct SpawnConfig {
    pub regions_x: usize,
    pub regions_y: usize,
    pub points_per_region: usize,
    pub max_attempts: u32,
    pub player_size: f32,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            regions_x: 3,
            regions_y: 3,
            points_per_region: 1,
            max_attempts: 1_000,
            player_size: PLAYER_SIZE,
        }
    }
}

/// Spawn candidates generated once per map load
#[derive(Debug, Clone, Default)]
pub struct SpawnPoints {
    points: Vec<Vector2>,
}

impl SpawnPoints {
    pub fn from_points(points: Vec<Vector2>) -> Self {
        Self { points }
    }

    /// Uniform random pick, used for the first spawn and every respawn
    pub fn choose<R: Rng>(&self, rng: &mut R) -> Result<Vector2, PlacementError> {
        self.points
            .choose(rng)
            .copied()
            .ok_or(PlacementError::EmptyGrid)
    }

    pub fn points(&self) -> &[Vector2] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

pub struct SpawnSelector {
    config: SpawnConfig,
}

impl SpawnSelector {
    pub fn new(config: SpawnConfig) -> Self {
        Self { config }
    }

    /// Generates `points_per_region` free points in every grid region
    ///
    /// Candidates are whole-unit positions chosen so the player's box stays
    /// inside its region. A candidate overlapping geometry is redrawn, up to
    /// `max_attempts` times per point before the region is reported blocked.
    pub fn generate<R: Rng>(
        &self,
        geometry: &StaticGeometry,
        rng: &mut R,
    ) -> Result<SpawnPoints, PlacementError> {
        let cfg = &self.config;
        if cfg.regions_x == 0 || cfg.regions_y == 0 || cfg.points_per_region == 0 {
            return Err(PlacementError::EmptyGrid);
        }

        let region_w = geometry.width() / cfg.regions_x as f32;
        let region_h = geometry.height() / cfg.regions_y as f32;
        let size = cfg.player_size;
        let mut points = Vec::with_capacity(cfg.regions_x * cfg.regions_y * cfg.points_per_region);

        for region_x in 0..cfg.regions_x {
            for region_y in 0..cfg.regions_y {
                let min_x = (region_x as f32 * region_w).ceil() as i64;
                let max_x = ((region_x + 1) as f32 * region_w - size).floor() as i64;
                let min_y = (region_y as f32 * region_h).ceil() as i64;
                let max_y = ((region_y + 1) as f32 * region_h - size).floor() as i64;
                if max_x < min_x || max_y < min_y {
                    return Err(PlacementError::RegionTooSmall { region_x, region_y });
                }

                for _ in 0..cfg.points_per_region {
                    let point = (0..cfg.max_attempts)
                        .map(|_| {
                            Vector2::new(
                                rng.gen_range(min_x..=max_x) as f32,
                                rng.gen_range(min_y..=max_y) as f32,
                            )
                        })
                        .find(|p| !geometry.overlaps(&Rect::new(p.x, p.y, size, size)))
                        .ok_or(PlacementError::RegionBlocked {
                            region_x,
                            region_y,
                            attempts: cfg.max_attempts,
                        })?;
                    points.push(point);
                }
            }
        }

        debug!("Generated {} spawn points", points.len());
        Ok(SpawnPoints { points })
    }
}
