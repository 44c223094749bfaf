//! Presentation contracts consumed by the renderer and audio backend
//!
//! These are deliberately small: pick an animation from player flags,
//! advance a frame index by delta-time, follow the player with a clamped
//! camera, and play or stop named sounds.

use log::trace;
use shared::{PlayerFlags, Rect, Vector2};

/// Beyond this distance remote gunfire is inaudible
pub const MAX_HEARING_DISTANCE: f32 = 900.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationKind {
    Idle,
    Run,
    Fly,
}

impl AnimationKind {
    /// Flying beats running, running beats idling
    pub fn select(flags: &PlayerFlags) -> Self {
        if flags.is_flying {
            AnimationKind::Fly
        } else if flags.is_running {
            AnimationKind::Run
        } else {
            AnimationKind::Idle
        }
    }
}

/// Cycles a frame index at a fixed frame duration
#[derive(Debug, Clone)]
pub struct FrameClock {
    frame_count: usize,
    frame_duration: f32,
    accumulator: f32,
    frame: usize,
}

impl FrameClock {
    pub fn new(frame_count: usize, frame_duration: f32) -> Self {
        Self {
            frame_count: frame_count.max(1),
            frame_duration,
            accumulator: 0.0,
            frame: 0,
        }
    }

    /// Adds `dt` seconds; once more than one frame duration has built up the
    /// index moves on by one and the accumulator starts over
    pub fn advance(&mut self, dt: f32) -> usize {
        self.accumulator += dt;
        if self.accumulator > self.frame_duration {
            self.accumulator = 0.0;
            self.frame = (self.frame + 1) % self.frame_count;
        }
        self.frame
    }

    pub fn frame(&self) -> usize {
        self.frame
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.0;
        self.frame = 0;
    }
}

/// Viewport that follows a target and never leaves the map
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub x: f32,
    pub y: f32,
    pub view_w: f32,
    pub view_h: f32,
}

impl Camera {
    pub fn new(view_w: f32, view_h: f32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            view_w,
            view_h,
        }
    }

    pub fn follow(&mut self, target: Vector2, map_w: f32, map_h: f32) {
        self.x = (target.x - self.view_w / 2.0).clamp(0.0, (map_w - self.view_w).max(0.0));
        self.y = (target.y - self.view_h / 2.0).clamp(0.0, (map_h - self.view_h).max(0.0));
    }

    /// World rectangle to screen rectangle
    pub fn apply(&self, rect: &Rect) -> Rect {
        rect.translated(-self.x, -self.y)
    }

    pub fn to_screen(&self, point: Vector2) -> Vector2 {
        Vector2::new(point.x - self.x, point.y - self.y)
    }

    pub fn to_world(&self, point: Vector2) -> Vector2 {
        Vector2::new(point.x + self.x, point.y + self.y)
    }
}

/// Linear falloff from full volume at the listener to silence at the limit
pub fn proximity_volume(listener: Vector2, source: Vector2) -> f32 {
    let distance = listener.distance(&source);
    if distance > MAX_HEARING_DISTANCE {
        return 0.0;
    }
    (1.0 - distance / MAX_HEARING_DISTANCE).max(0.0)
}

#[derive(Debug, Clone, PartialEq)]
pub enum SoundCue {
    Fire,
    RemoteFire { owner_id: String, volume: f32 },
    JetpackStart,
    JetpackStop,
}

impl SoundCue {
    pub fn name(&self) -> &'static str {
        match self {
            SoundCue::Fire | SoundCue::RemoteFire { .. } => "bullet",
            SoundCue::JetpackStart | SoundCue::JetpackStop => "jetpack",
        }
    }
}

/// Audio backend contract
pub trait SoundSink {
    fn play(&mut self, name: &str, volume: f32);
    fn stop(&mut self, name: &str);

    fn dispatch(&mut self, cue: &SoundCue) {
        match cue {
            SoundCue::Fire | SoundCue::JetpackStart => self.play(cue.name(), 1.0),
            SoundCue::RemoteFire { volume, .. } => {
                if *volume > 0.0 {
                    self.play(cue.name(), *volume);
                }
            }
            SoundCue::JetpackStop => self.stop(cue.name()),
        }
    }
}

/// Sink used when no audio device is wired up
#[derive(Debug, Default)]
pub struct LogSoundSink;

impl SoundSink for LogSoundSink {
    fn play(&mut self, name: &str, volume: f32) {
        trace!("play {} at {:.2}", name, volume);
    }

    fn stop(&mut self, name: &str) {
        trace!("stop {}", name);
    }
}
