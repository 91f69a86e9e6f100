/// Level blueprints and the level library.
///
/// ## Sources (priority order):
///   1. `levels/` directory (individual `.toml` / `.json` files, sorted by name)
///   2. Built-in embedded levels
///
/// ## Blueprint format (`.toml`):
///   ```toml
///   name = "First Steps"
///   size = [5, 5]          # alias: grid
///   start = [0, 0]         # alias: monkeyStart
///   facing = "east"
///   collectibles = [{ x = 4, y = 0 }]                       # alias: bananas
///   hazards = [{ x = 2, y = 2, patrol = 2, axis = "south" }] # alias: crocodiles
///   snakes = [{ x = 4, y = 0, rotation = 1.5708 }]           # range defaults to 2
///   switches = [{ x = 1, y = 0, gate_id = 1, duration = 3 }] # seconds, 0 = latch
///   gates = [{ x = 2, y = 0, gate_id = 1 }]
///   teleporters = [{ x = 0, y = 4, pair_id = 1 }, { x = 4, y = 4, pair_id = 1 }]
///   platforms = [{ points = [{ x = 1, y = 3 }, { x = 3, y = 3 }], speed = 2 }]
///   blocks = [{ x = 2, y = 1 }]                              # alias: pushables
///   decor = [{ x = 0, y = 2 }]                               # alias: turtles
///   stars = { three = 4, two = 6 }                           # keys "3" / "2" also accepted
///   ```
///
/// `.json` files use the same fields; the camelCase aliases let level files
/// exported by the browser editor load unchanged.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::GameConfig;
use crate::domain::grid::{Facing, Pos};
use crate::domain::rules::StarThresholds;

#[derive(Debug, thiserror::Error)]
pub enum LevelError {
    #[error("could not read level {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML in {path}: {source}")]
    Toml {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unsupported level file {0} (expected .toml or .json)")]
    UnsupportedFormat(String),
    #[error("level {name:?} is invalid: {reason}")]
    Invalid { name: String, reason: String },
    #[error("no level {index} (library has {count})")]
    NotFound { index: usize, count: usize },
}

// ══════════════════════════════════════════════════════════════
// Blueprint schema
// ══════════════════════════════════════════════════════════════

/// A grid cell as written in level files: `{ x = 1, y = 2 }`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Spot {
    pub x: i32,
    pub y: i32,
}

impl Spot {
    pub fn pos(self) -> Pos {
        Pos::new(self.x, self.y)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HazardDef {
    pub x: i32,
    pub y: i32,
    /// Patrol distance in tiles; 0 = stationary. Unset means 0 for
    /// `hazards` and 2 for `snakes`.
    #[serde(default, alias = "range", skip_serializing_if = "Option::is_none")]
    pub patrol: Option<u32>,
    /// Patrol direction. Unset falls back to `rotation`, then south.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axis: Option<Facing>,
    /// Editor heading: degrees in `hazards`, radians in `snakes`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f32>,
    /// Tiles per second.
    #[serde(default = "default_hazard_speed")]
    pub speed: f32,
}

/// A hazard placement with its list's defaults filled in.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct HazardSpawn {
    pub at: Pos,
    pub axis: Facing,
    pub patrol: u32,
    pub speed: f32,
}

#[derive(Clone, Copy)]
enum HeadingUnit {
    Degrees,
    Radians,
}

const SNAKE_PATROL: u32 = 2;

impl HazardDef {
    fn spawn(&self, unit: HeadingUnit, default_patrol: u32) -> HazardSpawn {
        let heading = |r: f32| match unit {
            HeadingUnit::Degrees => r.to_radians(),
            HeadingUnit::Radians => r,
        };
        let axis = self
            .axis
            .or_else(|| self.rotation.map(|r| Facing::from_heading(heading(r))))
            .unwrap_or(Facing::South);
        HazardSpawn {
            at: Pos::new(self.x, self.y),
            axis,
            patrol: self.patrol.unwrap_or(default_patrol),
            speed: self.speed,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SwitchDef {
    pub x: i32,
    pub y: i32,
    #[serde(default = "default_gate_id", alias = "gateId")]
    pub gate_id: u32,
    /// Seconds until the switch releases itself; 0 = stays pressed.
    #[serde(default)]
    pub duration: f32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GateDef {
    pub x: i32,
    pub y: i32,
    #[serde(default = "default_gate_id", alias = "gateId")]
    pub gate_id: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TeleporterDef {
    pub x: i32,
    pub y: i32,
    #[serde(alias = "pairId")]
    pub pair_id: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlatformDef {
    pub points: Vec<Spot>,
    /// Legs per second.
    #[serde(default = "default_platform_speed")]
    pub speed: f32,
}

/// Immutable level blueprint. The world is rebuilt from this on every
/// load and reset.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LevelDef {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(alias = "grid")]
    pub size: [i32; 2],
    #[serde(alias = "monkeyStart")]
    pub start: Pos,
    #[serde(default)]
    pub facing: Facing,
    #[serde(default, alias = "bananas")]
    pub collectibles: Vec<Spot>,
    #[serde(default, alias = "crocodiles")]
    pub hazards: Vec<HazardDef>,
    /// Second hazard list kept for editor exports, which split hazards in two.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub snakes: Vec<HazardDef>,
    #[serde(default)]
    pub switches: Vec<SwitchDef>,
    #[serde(default)]
    pub gates: Vec<GateDef>,
    #[serde(default)]
    pub teleporters: Vec<TeleporterDef>,
    #[serde(default)]
    pub platforms: Vec<PlatformDef>,
    #[serde(default, alias = "pushables")]
    pub blocks: Vec<Spot>,
    #[serde(default, alias = "turtles")]
    pub decor: Vec<Spot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stars: Option<StarThresholds>,
}

fn default_name() -> String { "Untitled".into() }
fn default_hazard_speed() -> f32 { 1.0 }
fn default_gate_id() -> u32 { 1 }
fn default_platform_speed() -> f32 { 2.0 }

impl LevelDef {
    pub fn width(&self) -> i32 { self.size[0] }
    pub fn height(&self) -> i32 { self.size[1] }

    pub fn in_bounds(&self, p: Pos) -> bool {
        p.x >= 0 && p.y >= 0 && p.x < self.width() && p.y < self.height()
    }

    /// Every hazard, from both lists.
    pub fn all_hazards(&self) -> impl Iterator<Item = HazardSpawn> + '_ {
        let hazards = self.hazards.iter().map(|h| h.spawn(HeadingUnit::Degrees, 0));
        let snakes = self.snakes.iter().map(|h| h.spawn(HeadingUnit::Radians, SNAKE_PATROL));
        hazards.chain(snakes)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, LevelError> {
        let def: LevelDef = toml::from_str(text).map_err(|source| LevelError::Toml {
            path: "<inline>".into(),
            source,
        })?;
        def.validate()?;
        Ok(def)
    }

    pub fn from_json_str(text: &str) -> Result<Self, LevelError> {
        let def: LevelDef = serde_json::from_str(text).map_err(|source| LevelError::Json {
            path: "<inline>".into(),
            source,
        })?;
        def.validate()?;
        Ok(def)
    }

    /// Structural checks the world relies on.
    pub fn validate(&self) -> Result<(), LevelError> {
        let invalid = |reason: String| LevelError::Invalid { name: self.name.clone(), reason };

        if self.width() <= 0 || self.height() <= 0 {
            return Err(invalid(format!("grid {}x{} is empty", self.width(), self.height())));
        }
        if !self.in_bounds(self.start) {
            return Err(invalid(format!("start {} is outside the grid", self.start)));
        }

        let spots = self.collectibles.iter().copied()
            .chain(self.blocks.iter().copied())
            .chain(self.decor.iter().copied())
            .chain(self.all_hazards().map(|h| Spot { x: h.at.x, y: h.at.y }))
            .chain(self.switches.iter().map(|s| Spot { x: s.x, y: s.y }))
            .chain(self.gates.iter().map(|g| Spot { x: g.x, y: g.y }))
            .chain(self.teleporters.iter().map(|t| Spot { x: t.x, y: t.y }))
            .chain(self.platforms.iter().flat_map(|p| p.points.iter().copied()));
        for spot in spots {
            if !self.in_bounds(spot.pos()) {
                return Err(invalid(format!("entity at {} is outside the grid", spot.pos())));
            }
        }

        let mut pairs: HashMap<u32, usize> = HashMap::new();
        for t in &self.teleporters {
            *pairs.entry(t.pair_id).or_default() += 1;
        }
        if let Some((id, n)) = pairs.iter().find(|(_, n)| **n != 2) {
            return Err(invalid(format!("teleporter pair {id} has {n} members, expected 2")));
        }

        if self.platforms.iter().any(|p| p.points.is_empty()) {
            return Err(invalid("platform without waypoints".into()));
        }
        if self.switches.iter().any(|s| s.duration < 0.0) {
            return Err(invalid("negative switch duration".into()));
        }
        Ok(())
    }
}

// ══════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════

/// Load one level file; the format follows the extension.
pub fn load_level_file(path: &Path) -> Result<LevelDef, LevelError> {
    let display = path.display().to_string();
    let text = std::fs::read_to_string(path).map_err(|source| LevelError::Io {
        path: display.clone(),
        source,
    })?;
    let def: LevelDef = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&text)
            .map_err(|source| LevelError::Toml { path: display.clone(), source })?,
        Some("json") => serde_json::from_str(&text)
            .map_err(|source| LevelError::Json { path: display.clone(), source })?,
        _ => return Err(LevelError::UnsupportedFormat(display)),
    };
    def.validate()?;
    Ok(def)
}

/// The level list the game plays: the configured directory if it holds
/// any valid levels, otherwise the embedded set.
pub fn levels_for(config: &GameConfig) -> Vec<LevelDef> {
    let dir = &config.levels_dir;
    if dir.is_dir() {
        let levels = load_from_directory(dir);
        if !levels.is_empty() {
            tracing::info!(dir = %dir.display(), count = levels.len(), "using level directory");
            return levels.into_iter().map(|(_, def)| def).collect();
        }
    }
    embedded_levels()
}

/// Pick level `index` (0-based) from a list.
pub fn pick(levels: &[LevelDef], index: usize) -> Result<LevelDef, LevelError> {
    levels.get(index).cloned().ok_or(LevelError::NotFound { index, count: levels.len() })
}

// ══════════════════════════════════════════════════════════════
// Directory loading
// ══════════════════════════════════════════════════════════════

/// Every valid level in `dir`, sorted by file name. Bad files are skipped.
pub fn load_from_directory(dir: &Path) -> Vec<(String, LevelDef)> {
    let mut results = vec![];

    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "could not read level directory");
            return results;
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| matches!(p.extension().and_then(|e| e.to_str()), Some("toml" | "json")))
        .collect();
    paths.sort();

    for path in paths {
        match load_level_file(&path) {
            Ok(def) => {
                let filename = path.file_name()
                    .unwrap_or_default()
                    .to_string_lossy()
                    .to_string();
                results.push((filename, def));
            }
            Err(e) => tracing::warn!(error = %e, "skipping level file"),
        }
    }

    results
}

// ══════════════════════════════════════════════════════════════
// Embedded fallback levels
// ══════════════════════════════════════════════════════════════

const EMBEDDED: &[&str] = &[
    r#"
name = "First Steps"
size = [5, 5]
start = [0, 0]
collectibles = [{ x = 4, y = 0 }]
stars = { three = 4, two = 6 }
"#,
    r#"
name = "Around the Rock"
size = [5, 3]
start = [0, 1]
collectibles = [{ x = 4, y = 1 }]
gates = [{ x = 2, y = 1, gate_id = 9 }]
decor = [{ x = 2, y = 0 }]
stars = { three = 8, two = 10 }
"#,
    r#"
name = "Gatekeeper"
size = [6, 3]
start = [0, 1]
collectibles = [{ x = 5, y = 1 }]
switches = [{ x = 1, y = 1, gate_id = 1 }]
gates = [{ x = 3, y = 1, gate_id = 1 }]
stars = { three = 5, two = 7 }
"#,
    r#"
name = "Heavy Lifting"
size = [6, 3]
start = [0, 1]
collectibles = [{ x = 4, y = 2 }]
blocks = [{ x = 2, y = 1 }]
stars = { three = 7, two = 9 }
"#,
    r#"
name = "Portal Hop"
size = [7, 3]
start = [0, 1]
collectibles = [{ x = 6, y = 0 }]
teleporters = [{ x = 1, y = 1, pair_id = 1 }, { x = 5, y = 0, pair_id = 1 }]
hazards = [{ x = 3, y = 1, patrol = 1, axis = "south" }]
stars = { three = 3, two = 5 }
"#,
    r#"
name = "Quick Feet"
size = [6, 3]
start = [0, 1]
collectibles = [{ x = 5, y = 1 }]
switches = [{ x = 1, y = 1, gate_id = 2, duration = 3 }]
gates = [{ x = 3, y = 1, gate_id = 2 }]
platforms = [{ points = [{ x = 0, y = 0 }, { x = 5, y = 0 }], speed = 1 }]
stars = { three = 5, two = 6 }
"#,
];

pub fn embedded_levels() -> Vec<LevelDef> {
    EMBEDDED
        .iter()
        .filter_map(|text| match LevelDef::from_toml_str(text) {
            Ok(def) => Some(def),
            Err(e) => {
                tracing::warn!(error = %e, "skipping embedded level");
                None
            }
        })
        .collect()
}
