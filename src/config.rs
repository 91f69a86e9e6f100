/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD).
/// Falls back to sensible defaults if the file is missing or incomplete.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub speed: SpeedConfig,
    pub rules: RulesConfig,
    pub levels_dir: PathBuf,
}

/// Real-time cadence. The interpreter pauses `instruction_delay_ms` after
/// every leaf instruction and `loop_delay_ms` after every WHILE_CLEAR pass;
/// the `*_ms` animation lengths only drive the built-in animator.
#[derive(Clone, Debug)]
pub struct SpeedConfig {
    pub tick_rate_ms: u64,
    pub instruction_delay_ms: u64,
    pub loop_delay_ms: u64,
    pub move_ms: u64,
    pub turn_ms: u64,
    pub jump_ms: u64,
    pub shake_ms: u64,
}

#[derive(Clone, Debug)]
pub struct RulesConfig {
    pub teleport_cooldown_ms: u64,
    pub contact_tolerance: f32,   // tiles from the cell center
    pub max_call_depth: usize,
}

impl SpeedConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_rate_ms.max(1))
    }

    /// Whole ticks covering `ms`, rounded up.
    pub fn ms_to_ticks(&self, ms: u64) -> u32 {
        let rate = self.tick_rate_ms.max(1);
        ms.div_ceil(rate).min(u32::MAX as u64) as u32
    }
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    speed: TomlSpeed,
    #[serde(default)]
    rules: TomlRules,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlSpeed {
    #[serde(default = "default_tick_rate")]
    tick_rate_ms: u64,
    #[serde(default = "default_instruction_delay")]
    instruction_delay_ms: u64,
    #[serde(default = "default_loop_delay")]
    loop_delay_ms: u64,
    #[serde(default = "default_move")]
    move_ms: u64,
    #[serde(default = "default_turn")]
    turn_ms: u64,
    #[serde(default = "default_jump")]
    jump_ms: u64,
    #[serde(default = "default_shake")]
    shake_ms: u64,
}

#[derive(Deserialize, Debug)]
struct TomlRules {
    #[serde(default = "default_teleport_cooldown")]
    teleport_cooldown_ms: u64,
    #[serde(default = "default_contact_tolerance")]
    contact_tolerance: f32,
    #[serde(default = "default_max_call_depth")]
    max_call_depth: usize,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_levels_dir")]
    levels_dir: String,
}

// ── Defaults ──

fn default_tick_rate() -> u64 { 50 }
fn default_instruction_delay() -> u64 { 300 }
fn default_loop_delay() -> u64 { 100 }
fn default_move() -> u64 { 250 }
fn default_turn() -> u64 { 150 }
fn default_jump() -> u64 { 400 }
fn default_shake() -> u64 { 300 }
fn default_teleport_cooldown() -> u64 { 3000 }
fn default_contact_tolerance() -> f32 { 0.3 }
fn default_max_call_depth() -> usize { 64 }
fn default_levels_dir() -> String { "levels".into() }

impl Default for TomlSpeed {
    fn default() -> Self {
        TomlSpeed {
            tick_rate_ms: default_tick_rate(),
            instruction_delay_ms: default_instruction_delay(),
            loop_delay_ms: default_loop_delay(),
            move_ms: default_move(),
            turn_ms: default_turn(),
            jump_ms: default_jump(),
            shake_ms: default_shake(),
        }
    }
}

impl Default for TomlRules {
    fn default() -> Self {
        TomlRules {
            teleport_cooldown_ms: default_teleport_cooldown(),
            contact_tolerance: default_contact_tolerance(),
            max_call_depth: default_max_call_depth(),
        }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            levels_dir: default_levels_dir(),
        }
    }
}

// ── Loading ──

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig::from_toml(TomlConfig::default(), &[])
    }
}

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: exe directory, current working directory, then the
    /// XDG and system data directories.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let toml_cfg = load_toml(&search_dirs);
        GameConfig::from_toml(toml_cfg, &search_dirs)
    }

    /// Parse a config document directly; relative `levels_dir` stays relative.
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        let toml_cfg: TomlConfig = toml::from_str(text)?;
        Ok(GameConfig::from_toml(toml_cfg, &[]))
    }

    fn from_toml(toml_cfg: TomlConfig, search_dirs: &[PathBuf]) -> Self {
        let levels_dir = resolve_levels_dir(&toml_cfg.general.levels_dir, search_dirs);
        GameConfig {
            speed: SpeedConfig {
                tick_rate_ms: toml_cfg.speed.tick_rate_ms,
                instruction_delay_ms: toml_cfg.speed.instruction_delay_ms,
                loop_delay_ms: toml_cfg.speed.loop_delay_ms,
                move_ms: toml_cfg.speed.move_ms,
                turn_ms: toml_cfg.speed.turn_ms,
                jump_ms: toml_cfg.speed.jump_ms,
                shake_ms: toml_cfg.speed.shake_ms,
            },
            rules: RulesConfig {
                teleport_cooldown_ms: toml_cfg.rules.teleport_cooldown_ms,
                contact_tolerance: toml_cfg.rules.contact_tolerance,
                max_call_depth: toml_cfg.rules.max_call_depth,
            },
            levels_dir,
        }
    }
}

fn resolve_levels_dir(levels_dir: &str, search_dirs: &[PathBuf]) -> PathBuf {
    if Path::new(levels_dir).is_absolute() {
        return PathBuf::from(levels_dir);
    }
    // Search candidate dirs for the levels folder
    search_dirs.iter()
        .map(|d| d.join(levels_dir))
        .find(|p| p.is_dir())
        .unwrap_or_else(|| PathBuf::from(levels_dir))
}

/// Candidate directories to search: exe dir + CWD + data paths (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    // 1. Directory of the running executable
    if let Ok(exe) = std::env::current_exe() {
        // Resolve symlinks so an installed link still finds data next to
        // the real binary.
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    // 2. Current working directory
    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    // 3. XDG data home (~/.local/share/blockrunner)
    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/blockrunner");
        if xdg.is_dir() && !dirs.iter().any(|d| d == &xdg) {
            dirs.push(xdg);
        }
    }

    // 4. System data directory (/usr/share/blockrunner)
    let sys = PathBuf::from("/usr/share/blockrunner");
    if sys.is_dir() && !dirs.iter().any(|d| d == &sys) {
        dirs.push(sys);
    }

    // 5. Fallback
    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Search for config.toml in candidate directories.
fn load_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(text) => match toml::from_str::<TomlConfig>(&text) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "config.toml parse error, using defaults");
                        return TomlConfig::default();
                    }
                },
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "could not read config file");
                }
            }
        }
    }
    TomlConfig::default()
}
