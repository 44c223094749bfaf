//! macroquad drawing of the world, players, projectiles and HUD
//!
//! Everything here is immediate-mode and runs on the main thread. Per-player
//! animation clocks are the only state kept between frames.

use crate::channel::ChannelState;
use crate::presentation::{AnimationKind, Camera, FrameClock};
use macroquad::prelude::*;
use shared::{ChannelKind, PlayerState, Projectile, Rect, StaticGeometry, MAX_HEALTH};
use std::collections::HashMap;

const ANIMATION_FRAMES: usize = 4;
const ANIMATION_FRAME_SECONDS: f32 = 0.1;
const NAME_FONT_SIZE: u16 = 14;

/// Text drawn above a player; the local player is not labelled
pub fn name_label(player: &PlayerState) -> Option<&str> {
    (!player.is_local).then_some(player.id.as_str())
}

/// Values shown in the heads-up display
#[derive(Debug, Clone)]
pub struct HudState {
    pub health: u32,
    pub ammo: u32,
    pub magazine: u32,
    pub reloading: bool,
    pub player_count: usize,
    pub channels: Vec<(ChannelKind, ChannelState)>,
}

impl HudState {
    pub fn ammo_label(&self) -> String {
        if self.reloading {
            "Reloading...".to_string()
        } else {
            format!("x {}", self.ammo)
        }
    }
}

pub struct Renderer {
    camera: Camera,
    clocks: HashMap<String, (AnimationKind, FrameClock)>,
}

impl Renderer {
    pub fn new(width: usize, height: usize) -> Self {
        Renderer {
            camera: Camera::new(width as f32, height as f32),
            clocks: HashMap::new(),
        }
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Re-centres the camera on the local player
    pub fn follow(&mut self, local: &PlayerState, geometry: &StaticGeometry) {
        self.camera
            .follow(local.center(), geometry.width(), geometry.height());
    }

    pub fn render<'a>(
        &mut self,
        geometry: &StaticGeometry,
        players: impl Iterator<Item = &'a PlayerState>,
        projectiles: impl Iterator<Item = &'a Projectile>,
        hud: &HudState,
        dt: f32,
    ) {
        clear_background(Color::from_rgba(26, 26, 26, 255));

        for solid in geometry.solids() {
            self.fill(solid, Color::from_rgba(68, 68, 68, 255));
        }

        for player in players {
            // Dead players are not drawn until they respawn
            if !player.is_alive() {
                continue;
            }
            let frame = self.advance_animation(player, dt);
            self.draw_player(player, frame);
        }

        for projectile in projectiles {
            self.fill(&projectile.rect(shared::BULLET_SIZE), YELLOW);
        }

        self.draw_hud(hud);
    }

    fn advance_animation(&mut self, player: &PlayerState, dt: f32) -> (AnimationKind, usize) {
        let kind = AnimationKind::select(&player.flags);
        let entry = self
            .clocks
            .entry(player.id.clone())
            .or_insert_with(|| (kind, FrameClock::new(ANIMATION_FRAMES, ANIMATION_FRAME_SECONDS)));
        if entry.0 != kind {
            entry.0 = kind;
            entry.1.reset();
        }
        (kind, entry.1.advance(dt))
    }

    fn draw_player(&self, player: &PlayerState, (kind, frame): (AnimationKind, usize)) {
        let rect = self.camera.apply(&player.rect());
        let color = if player.is_local {
            GREEN
        } else {
            Color::from_rgba(255, 68, 68, 255)
        };

        draw_rectangle(rect.x, rect.y, rect.w, rect.h, color);
        draw_rectangle_lines(rect.x, rect.y, rect.w, rect.h, 2.0, WHITE);

        let eye_x = if player.flags.facing_left {
            rect.x + 3.0
        } else {
            rect.x + rect.w - 7.0
        };
        draw_rectangle(eye_x, rect.y + 4.0, 4.0, 4.0, WHITE);

        match kind {
            AnimationKind::Fly => {
                let flame = 4.0 + frame as f32 * 2.0;
                draw_rectangle(rect.x + rect.w / 2.0 - 3.0, rect.y + rect.h, 6.0, flame, ORANGE);
            }
            AnimationKind::Run => {
                let stride = if frame % 2 == 0 { 2.0 } else { rect.w - 6.0 };
                draw_rectangle(rect.x + stride, rect.y + rect.h - 2.0, 4.0, 4.0, WHITE);
            }
            AnimationKind::Idle => {}
        }

        self.draw_health_bar(&rect, player.health);

        if let Some(name) = name_label(player) {
            let size = measure_text(name, None, NAME_FONT_SIZE, 1.0);
            let x = rect.x + (rect.w - size.width) / 2.0;
            draw_text(name, x, rect.y - 12.0, NAME_FONT_SIZE as f32, WHITE);
        }
    }

    fn draw_health_bar(&self, rect: &Rect, health: u32) {
        let ratio = health as f32 / MAX_HEALTH as f32;
        draw_rectangle(rect.x, rect.y - 8.0, rect.w, 4.0, Color::from_rgba(51, 51, 51, 255));
        draw_rectangle(rect.x, rect.y - 8.0, rect.w * ratio, 4.0, GREEN);
    }

    fn fill(&self, world: &Rect, color: Color) {
        let rect = self.camera.apply(world);
        draw_rectangle(rect.x, rect.y, rect.w, rect.h, color);
    }

    fn draw_hud(&self, hud: &HudState) {
        let ratio = hud.health as f32 / MAX_HEALTH as f32;
        draw_rectangle(10.0, 10.0, 200.0, 12.0, Color::from_rgba(51, 51, 51, 255));
        draw_rectangle(10.0, 10.0, 200.0 * ratio, 12.0, RED);
        draw_rectangle_lines(10.0, 10.0, 200.0, 12.0, 1.0, WHITE);

        draw_text(&hud.ammo_label(), 10.0, 40.0, 20.0, WHITE);

        let y = 55.0;
        for (i, (kind, state)) in hud.channels.iter().enumerate() {
            let color = match state {
                ChannelState::Connected => GREEN,
                ChannelState::Connecting => YELLOW,
                ChannelState::Closing | ChannelState::Disconnected => RED,
            };
            let x = 10.0 + i as f32 * 70.0;
            draw_rectangle(x, y, 8.0, 8.0, color);
            draw_text(kind.name(), x + 10.0, y + 8.0, 12.0, WHITE);
        }

        let player_text = format!("{} players", hud.player_count);
        draw_text(&player_text, 10.0, y + 25.0, 12.0, WHITE);
    }
}
