/// Interaction Resolver: actor contacts and gate refresh.
///
/// `check_interactions` runs after every completed actor move and once per
/// simulation tick. It reads the actor's continuous position, so nothing
/// fires while the actor is mid-slide between cells.
///
/// ## Contact table
/// ┌──────────────────────────┬──────────────────────────────────────────┐
/// │ Entity on the actor cell │ Effect                                   │
/// ├──────────────────────────┼──────────────────────────────────────────┤
/// │ Collectible (active)     │ deactivate, count, Collect; last one →   │
/// │                          │ Solved + LevelComplete                   │
/// │ Hazard                   │ Lost + GameOver, resolution stops        │
/// │ Switch (idle, armed)     │ press, Trigger                           │
/// │ Teleporter (ready)       │ jump to partner, both cool down,         │
/// │                          │ Teleport, resolution stops               │
/// │ anything else            │ nothing                                  │
/// └──────────────────────────┴──────────────────────────────────────────┘

use std::collections::HashSet;

use crate::domain::entity::{Entity, EntityKind};
use crate::domain::rules::star_rating;
use crate::sim::event::GameEvent;
use crate::sim::world::{Phase, World};

/// Resolve contacts between the actor and whatever shares its cell.
/// `executed` is the run's instruction count, used for the star rating.
pub fn check_interactions(world: &mut World, executed: u64) -> Vec<GameEvent> {
    let mut events = vec![];
    if !world.is_playing() {
        return events;
    }

    let cell = world.actor.visual.nearest_cell();
    if world.actor.visual.distance(cell.to_point()) > world.timing.contact_tolerance {
        return events;
    }

    for idx in world.entities_at(cell) {
        match &mut world.entities[idx] {
            Entity::Collectible(c) if c.active => {
                c.active = false;
                world.collected += 1;
                events.push(GameEvent::Collect { at: cell, collected: world.collected });
                tracing::debug!(at = %cell, collected = world.collected, "collected");

                if world.active_collectibles() == 0 && world.phase == Phase::Playing {
                    world.phase = Phase::Solved;
                    let stars = star_rating(world.blueprint.stars.as_ref(), executed);
                    tracing::info!(stars, executed, "level complete");
                    events.push(GameEvent::LevelComplete { stars, executed });
                }
            }
            Entity::Hazard(_) => {
                world.phase = Phase::Lost;
                world.actor.alive = false;
                tracing::info!(at = %cell, "actor hit a hazard");
                events.push(GameEvent::GameOver { cause: EntityKind::Hazard, at: cell });
                return events;
            }
            Entity::Switch(s) if !s.pressed && s.armed => {
                s.press();
                tracing::debug!(gate_id = s.gate_id, at = %cell, "switch pressed");
                events.push(GameEvent::Trigger { gate_id: s.gate_id, at: cell });
            }
            Entity::Teleporter(t) if t.ready() => {
                let pair_id = t.pair_id;
                let Some(partner) = world.teleport_partner(idx, pair_id) else {
                    continue;
                };
                let to = world.entities[partner].cell();
                let cooldown = world.timing.teleport_cooldown_ticks;
                for i in [idx, partner] {
                    if let Entity::Teleporter(t) = &mut world.entities[i] {
                        t.cooldown = cooldown;
                    }
                }
                world.actor.cell = to;
                world.actor.visual = to.to_point();
                world.actor.lift = 0.0;
                tracing::debug!(from = %cell, to = %to, "teleported");
                events.push(GameEvent::Teleport { from: cell, to });
                return events;
            }
            _ => {}
        }
    }
    events
}

/// Recompute every gate from the live set of pressed switches.
/// Emits `GateChanged` only on real transitions.
pub fn refresh_gates(world: &mut World) -> Vec<GameEvent> {
    let pressed: HashSet<u32> = world
        .entities
        .iter()
        .filter_map(|e| match e {
            Entity::Switch(s) if s.pressed => Some(s.gate_id),
            _ => None,
        })
        .collect();

    let mut events = vec![];
    for e in &mut world.entities {
        if let Entity::Gate(g) = e {
            let changed = if pressed.contains(&g.gate_id) { g.open() } else { g.close() };
            if changed {
                tracing::debug!(gate_id = g.gate_id, open = g.open, "gate changed");
                events.push(GameEvent::GateChanged { gate_id: g.gate_id, at: g.cell, open: g.open });
            }
        }
    }
    events
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════
