//! Rectangles, vectors and the static collision world built from a map

use serde::{Deserialize, Serialize};

///Represents a vector in 2D space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vector2 {
    ///Value along the x-axis.
    /// Positive direction is to the right.
    pub x: f32,
    ///Value along the y-axis.
    /// Positive direction is down, matching screen coordinates.
    pub y: f32,
}

impl Vector2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    ///Unit vector pointing along `angle` (radians, clockwise from +x on screen).
    pub fn from_angle(angle: f32) -> Self {
        Self {
            x: angle.cos(),
            y: angle.sin(),
        }
    }

    ///Returns the magnitude of the vector.
    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    ///Returns the normalized vector.
    pub fn normalize(&self) -> Vector2 {
        let mag = self.magnitude();
        if mag == 0.0 {
            Vector2 { x: 0.0, y: 0.0 }
        } else {
            Vector2 {
                x: self.x / mag,
                y: self.y / mag,
            }
        }
    }

    ///Returns the scaled vector.
    pub fn scale(&self, scalar: f32) -> Vector2 {
        Vector2 {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }

    ///Returns the sum of two vectors.
    pub fn add(&self, other: &Vector2) -> Vector2 {
        Vector2 {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    ///Angle of the vector pointing from `self` to `target`.
    pub fn angle_to(&self, target: &Vector2) -> f32 {
        (target.y - self.y).atan2(target.x - self.x)
    }

    pub fn distance(&self, other: &Vector2) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Axis-aligned rectangle anchored at its top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Square of side `size` centered on `(cx, cy)`
    pub fn centered(cx: f32, cy: f32, size: f32) -> Self {
        Self::new(cx - size / 2.0, cy - size / 2.0, size, size)
    }

    pub fn get_bounds(&self) -> (f32, f32, f32, f32) {
        (self.x, self.y, self.x + self.w, self.y + self.h)
    }

    pub fn center(&self) -> Vector2 {
        Vector2::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn translated(&self, dx: f32, dy: f32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.w, self.h)
    }

    /// Strict overlap test; rectangles that only share an edge do not intersect
    pub fn intersects(&self, other: &Rect) -> bool {
        let (x1, y1, x2, y2) = self.get_bounds();
        let (x3, y3, x4, y4) = other.get_bounds();

        !(x2 <= x3 || x4 <= x1 || y2 <= y3 || y4 <= y1)
    }
}

/// Immutable set of solid rectangles plus the map extent
///
/// Built once per map load and shared read-only between the physics,
/// combat and spawn code. The only query it answers is "does this
/// rectangle overlap anything solid".
#[derive(Debug, Clone)]
pub struct StaticGeometry {
    solids: Vec<Rect>,
    width: f32,
    height: f32,
}

impl StaticGeometry {
    pub fn new(solids: Vec<Rect>, width: f32, height: f32) -> Self {
        Self {
            solids,
            width,
            height,
        }
    }

    /// Open map with no solids
    pub fn empty(width: f32, height: f32) -> Self {
        Self::new(Vec::new(), width, height)
    }

    /// Builds geometry from a text grid where `#` marks a solid tile
    ///
    /// Every other character is empty space. The map extent is the widest
    /// row times `tile_w` by the number of rows times `tile_h`.
    pub fn from_tile_grid<S: AsRef<str>>(rows: &[S], tile_w: f32, tile_h: f32) -> Self {
        let mut solids = Vec::new();
        let mut columns = 0usize;

        for (row, line) in rows.iter().enumerate() {
            let line = line.as_ref();
            columns = columns.max(line.chars().count());
            for (col, ch) in line.chars().enumerate() {
                if ch == '#' {
                    solids.push(Rect::new(
                        col as f32 * tile_w,
                        row as f32 * tile_h,
                        tile_w,
                        tile_h,
                    ));
                }
            }
        }

        Self::new(
            solids,
            columns as f32 * tile_w,
            rows.len() as f32 * tile_h,
        )
    }

    /// Built-in arena used when no map file is given
    pub fn default_arena() -> Self {
        Self::from_tile_grid(&DEFAULT_ARENA, DEFAULT_TILE_SIZE, DEFAULT_TILE_SIZE)
    }

    pub fn overlaps(&self, rect: &Rect) -> bool {
        self.solids.iter().any(|solid| solid.intersects(rect))
    }

    pub fn solids(&self) -> &[Rect] {
        &self.solids
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }
}

pub const DEFAULT_TILE_SIZE: f32 = 32.0;

const DEFAULT_ARENA: [&str; 24] = [
    "########################################",
    "#......................................#",
    "#......................................#",
    "#......................................#",
    "#.........######..........######.......#",
    "#......................................#",
    "#......................................#",
    "#..###.........................###.....#",
    "#..............########................#",
    "#......................................#",
    "#......................................#",
    "#.......####..................####.....#",
    "#......................................#",
    "#.................######...............#",
    "#......................................#",
    "#....#####..........................####",
    "#......................................#",
    "#..........#######.......#######.......#",
    "#......................................#",
    "#......................................#",
    "#..####.....................######.....#",
    "#......................................#",
    "#......................................#",
    "########################################",
];
