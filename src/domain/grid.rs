/// Grid geometry: integer cells, cardinal facings, continuous points.
///
/// Coordinates follow the board as seen from above: `x` grows east,
/// `y` grows south. Facing properties are queried via methods so turn
/// and step semantics are centralized here.

use serde::{Deserialize, Serialize};

/// An integer grid cell. Serialized as `[x, y]`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(from = "[i32; 2]", into = "[i32; 2]")]
pub struct Pos {
    pub x: i32,
    pub y: i32,
}

impl Pos {
    pub const fn new(x: i32, y: i32) -> Self {
        Pos { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Pos { x: self.x + dx, y: self.y + dy }
    }

    /// The cell `dist` tiles away in direction `facing`.
    pub fn step(self, facing: Facing, dist: i32) -> Self {
        let (dx, dy) = facing.delta();
        self.offset(dx * dist, dy * dist)
    }

    /// Unit vector (per-axis signum) pointing from `self` toward `other`.
    /// Displacement from `self` to `other`.
    pub fn delta_to(self, other: Pos) -> (i32, i32) {
        (other.x - self.x, other.y - self.y)
    }

    pub fn to_point(self) -> Point {
        Point { x: self.x as f32, y: self.y as f32 }
    }
}

impl From<[i32; 2]> for Pos {
    fn from([x, y]: [i32; 2]) -> Self {
        Pos { x, y }
    }
}

impl From<Pos> for [i32; 2] {
    fn from(p: Pos) -> Self {
        [p.x, p.y]
    }
}

impl std::fmt::Display for Pos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Cardinal facing. Turning is cyclic: N → E → S → W → N.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    North,
    #[default]
    East,
    South,
    West,
}

impl Facing {
    /// Grid delta of one step forward.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Facing::North => (0, -1),
            Facing::East => (1, 0),
            Facing::South => (0, 1),
            Facing::West => (-1, 0),
        }
    }

    pub fn turn_left(self) -> Self {
        match self {
            Facing::North => Facing::West,
            Facing::West => Facing::South,
            Facing::South => Facing::East,
            Facing::East => Facing::North,
        }
    }

    /// Closest facing to an editor heading in radians: 0 points south
    /// (+y), a quarter turn points east (+x).
    pub fn from_heading(radians: f32) -> Self {
        let (dx, dy) = (radians.sin(), radians.cos());
        if dx.abs() > dy.abs() {
            if dx > 0.0 { Facing::East } else { Facing::West }
        } else if dy >= 0.0 {
            Facing::South
        } else {
            Facing::North
        }
    }

    pub fn turn_right(self) -> Self {
        match self {
            Facing::North => Facing::East,
            Facing::East => Facing::South,
            Facing::South => Facing::West,
            Facing::West => Facing::North,
        }
    }
}

/// A continuous board position, used while something is mid-glide.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Point { x, y }
    }

    /// Linear interpolation toward `to`; `t` is clamped to [0, 1].
    pub fn lerp(self, to: Point, t: f32) -> Point {
        let t = t.clamp(0.0, 1.0);
        Point {
            x: self.x + (to.x - self.x) * t,
            y: self.y + (to.y - self.y) * t,
        }
    }

    /// Nearest grid cell (rounded).
    pub fn nearest_cell(self) -> Pos {
        Pos::new(self.x.round() as i32, self.y.round() as i32)
    }

    pub fn distance(self, other: Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}
