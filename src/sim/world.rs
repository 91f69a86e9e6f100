/// World: the Grid World Model for one running level.
///
/// ## Blueprint / live split
///
///   - `blueprint` — the level as loaded. **Never mutated.**
///   - everything else — live state derived from it.
///
/// `reset()` rebuilds the live state wholesale from the blueprint, so a
/// restart can never leak state from the previous attempt.
///
/// ## Sharing
///
/// The interpreter task and the simulation tick both mutate the world.
/// [`SharedWorld`] serializes them behind one mutex; every access is a
/// short synchronous closure and the lock is never held across an await.

use std::sync::{Arc, Mutex};

use crate::config::GameConfig;
use crate::domain::entity::{
    Actor, Collectible, Decor, Entity, Gate, Hazard, MovingPlatform, PushableBlock,
    Switch, Teleporter,
};
use crate::domain::grid::Pos;
use crate::domain::rules::{self, Entry, GridView, Mover};
use crate::sim::level::{LevelDef, LevelError};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    Playing,
    Solved,
    Lost,
}

/// Tick-based timing derived from config. Level files speak seconds,
/// the simulation counts ticks.
#[derive(Clone, Debug)]
pub struct Timing {
    pub tick_ms: u64,
    pub teleport_cooldown_ticks: u32,
    pub contact_tolerance: f32,
}

impl Timing {
    pub fn from_config(config: &GameConfig) -> Self {
        Timing {
            tick_ms: config.speed.tick_rate_ms.max(1),
            teleport_cooldown_ticks: config.speed.ms_to_ticks(config.rules.teleport_cooldown_ms),
            contact_tolerance: config.rules.contact_tolerance,
        }
    }

    pub fn tick_secs(&self) -> f32 {
        self.tick_ms as f32 / 1000.0
    }

    /// Whole ticks covering `secs`, rounded up.
    pub fn secs_to_ticks(&self, secs: f32) -> u32 {
        let ms = (secs.max(0.0) * 1000.0).round() as u64;
        ms.div_ceil(self.tick_ms).min(u32::MAX as u64) as u32
    }
}

impl Default for Timing {
    fn default() -> Self {
        Timing::from_config(&GameConfig::default())
    }
}

pub struct World {
    pub blueprint: LevelDef,
    pub timing: Timing,
    pub width: i32,
    pub height: i32,

    // ── Entities ──
    pub actor: Actor,
    pub entities: Vec<Entity>,

    // ── Game tracking ──
    pub collected: u32,
    pub phase: Phase,
    pub tick: u64,
}

// ── Construction ──

impl World {
    pub fn from_level(blueprint: LevelDef, timing: Timing) -> Result<Self, LevelError> {
        blueprint.validate()?;
        let mut world = World {
            width: blueprint.width(),
            height: blueprint.height(),
            actor: Actor::new(blueprint.start, blueprint.facing),
            entities: vec![],
            collected: 0,
            phase: Phase::Playing,
            tick: 0,
            blueprint,
            timing,
        };
        world.reset();
        Ok(world)
    }

    /// Rebuild actor and entities from the blueprint.
    pub fn reset(&mut self) {
        let def = &self.blueprint;
        let timing = &self.timing;
        let tick_secs = timing.tick_secs();
        let mut entities = vec![];

        for c in &def.collectibles {
            entities.push(Entity::Collectible(Collectible { cell: c.pos(), active: true }));
        }
        for h in def.all_hazards() {
            entities.push(Entity::Hazard(Hazard::new(h.at, h.axis, h.patrol, h.speed * tick_secs)));
        }
        for s in &def.switches {
            entities.push(Entity::Switch(Switch::new(
                Pos::new(s.x, s.y), s.gate_id, timing.secs_to_ticks(s.duration),
            )));
        }
        for g in &def.gates {
            entities.push(Entity::Gate(Gate { cell: Pos::new(g.x, g.y), gate_id: g.gate_id, open: false }));
        }
        for t in &def.teleporters {
            entities.push(Entity::Teleporter(Teleporter { cell: Pos::new(t.x, t.y), pair_id: t.pair_id, cooldown: 0 }));
        }
        for p in &def.platforms {
            let points = p.points.iter().map(|s| s.pos()).collect();
            entities.push(Entity::Platform(MovingPlatform::new(points, p.speed * tick_secs)));
        }
        for b in &def.blocks {
            entities.push(Entity::Block(PushableBlock::new(b.pos())));
        }
        for d in &def.decor {
            entities.push(Entity::Decor(Decor { cell: d.pos() }));
        }

        self.width = def.width();
        self.height = def.height();
        self.actor = Actor::new(def.start, def.facing);
        self.entities = entities;
        self.collected = 0;
        self.phase = Phase::Playing;
        self.tick = 0;
    }
}

// ── Legality queries ──

impl World {
    pub fn view(&self) -> GridView<'_> {
        GridView { width: self.width, height: self.height, entities: &self.entities }
    }

    /// Pure legality check for the actor entering `target`.
    pub fn can_enter(&self, target: Pos) -> Entry {
        rules::can_enter(&self.view(), target, Mover::Actor { from: self.actor.cell })
    }

    /// Carry out the push an `Entry::Push` asked for. Other entries are no-ops.
    pub fn apply_entry(&mut self, entry: Entry) {
        if let Entry::Push { block, to } = entry {
            if let Some(Entity::Block(b)) = self.entities.get_mut(block) {
                tracing::debug!(from = %b.cell, to = %to, "block pushed");
                b.move_to(to);
            }
        }
    }

    /// Check-and-push in one call: legal moves into a block shove it.
    pub fn is_legal_move(&mut self, target: Pos) -> bool {
        let entry = self.can_enter(target);
        self.apply_entry(entry);
        entry.is_legal()
    }

    pub fn is_playing(&self) -> bool {
        self.phase == Phase::Playing
    }
}

// ── Entity lookup ──

impl World {
    /// Indices of entities resting on `cell`.
    pub fn entities_at(&self, cell: Pos) -> Vec<usize> {
        self.entities
            .iter()
            .enumerate()
            .filter(|(_, e)| e.cell() == cell)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn active_collectibles(&self) -> usize {
        self.entities
            .iter()
            .filter(|e| matches!(e, Entity::Collectible(c) if c.active))
            .count()
    }

    /// The other teleporter sharing `pair_id`.
    pub fn teleport_partner(&self, index: usize, pair_id: u32) -> Option<usize> {
        self.entities.iter().enumerate().position(|(i, e)| {
            i != index && matches!(e, Entity::Teleporter(t) if t.pair_id == pair_id)
        })
    }
}

// ══════════════════════════════════════════════════════════════
// Shared handle
// ══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("world state lock poisoned")]
pub struct WorldPoisoned;

/// Cloneable handle to the one world a session runs.
#[derive(Clone)]
pub struct SharedWorld(Arc<Mutex<World>>);

impl SharedWorld {
    pub fn new(world: World) -> Self {
        SharedWorld(Arc::new(Mutex::new(world)))
    }

    /// Run `f` with exclusive access to the world.
    pub fn with<R>(&self, f: impl FnOnce(&mut World) -> R) -> Result<R, WorldPoisoned> {
        let mut guard = self.0.lock().map_err(|_| WorldPoisoned)?;
        Ok(f(&mut guard))
    }

    /// Swap in a freshly built world (level load).
    pub fn replace(&self, world: World) -> Result<(), WorldPoisoned> {
        self.with(|w| *w = world)
    }
}
