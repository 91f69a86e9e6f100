/// The step function: advances the world by one simulation tick.
///
/// Processing order:
///   1. Switch countdowns + re-arming
///   2. Teleporter cooldowns
///   3. Hazard patrols
///   4. Platform interpolation
///   5. Block glide
///   6. Tick-level contact check (so an idle actor can still be caught)
///   7. Gate refresh, last, so gates match the switches the tick ends with
///
/// The tick runs independently of the interpreter; only
/// [`advance_platforms`] is paced by instruction completion.

use crate::domain::entity::Entity;
use super::event::GameEvent;
use super::interact::{check_interactions, refresh_gates};
use super::world::World;

// ══════════════════════════════════════════════════════════════
// Main entry point
// ══════════════════════════════════════════════════════════════

/// `executed` is the current run's instruction count (for a win rating
/// that happens on the tick rather than after a move).
pub fn step(world: &mut World, executed: u64) -> Vec<GameEvent> {
    if !world.is_playing() { return vec![]; }

    let mut events: Vec<GameEvent> = Vec::new();
    world.tick += 1;

    resolve_switches(world, &mut events);
    resolve_teleporters(world);
    resolve_hazards(world);
    resolve_platforms(world);
    resolve_blocks(world);
    events.extend(check_interactions(world, executed));
    events.extend(refresh_gates(world));

    events
}

/// Start every platform on its next leg. Called once per leaf instruction.
pub fn advance_platforms(world: &mut World) {
    for e in &mut world.entities {
        if let Entity::Platform(p) = e {
            p.advance_step();
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Timers
// ══════════════════════════════════════════════════════════════

fn resolve_switches(world: &mut World, events: &mut Vec<GameEvent>) {
    let actor_cell = world.actor.cell;
    for e in &mut world.entities {
        let Entity::Switch(s) = e else { continue };
        if s.tick() {
            tracing::debug!(gate_id = s.gate_id, at = %s.cell, "switch released");
            events.push(GameEvent::SwitchReleased { gate_id: s.gate_id, at: s.cell });
        }
        // Stepping off re-arms; standing still never re-presses.
        if s.cell != actor_cell {
            s.armed = true;
        }
    }
}

fn resolve_teleporters(world: &mut World) {
    for e in &mut world.entities {
        if let Entity::Teleporter(t) = e {
            t.tick();
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Motion
// ══════════════════════════════════════════════════════════════

fn resolve_hazards(world: &mut World) {
    for e in &mut world.entities {
        if let Entity::Hazard(h) = e {
            h.tick();
        }
    }
}

fn resolve_platforms(world: &mut World) {
    for e in &mut world.entities {
        if let Entity::Platform(p) = e {
            if p.tick() {
                tracing::trace!(at = %p.cell(), "platform arrived");
            }
        }
    }
}

fn resolve_blocks(world: &mut World) {
    let glide = (10.0 * world.timing.tick_secs()).min(1.0);
    for e in &mut world.entities {
        if let Entity::Block(b) = e {
            b.tick(glide);
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::EntityKind;
    use crate::domain::grid::Pos;
    use crate::sim::world::tests::world_from;
    use crate::sim::world::Phase;

    fn gate_open(world: &World) -> bool {
        world.entities.iter().any(|e| matches!(e, Entity::Gate(g) if g.open))
    }

    const TIMED: &str = r#"
        size = [5, 1]
        start = [0, 0]
        switches = [{ x = 1, y = 0, gate_id = 1, duration = 3 }]
        gates = [{ x = 2, y = 0, gate_id = 1 }]
    "#;

    #[test]
    fn timed_switch_opens_then_recloses_gate() {
        let mut w = world_from(TIMED);
        w.actor.cell = Pos::new(1, 0);
        w.actor.snap();

        step(&mut w, 0);
        assert!(gate_open(&w));

        let mut released = false;
        for _ in 0..3 {
            released |= step(&mut w, 0).iter().any(|e| e.name() == "switch-released");
        }
        assert!(released);
        assert!(!gate_open(&w));

        // actor still on the switch: no re-press
        for _ in 0..5 { step(&mut w, 0); }
        assert!(!gate_open(&w));
    }

    #[test]
    fn gates_match_switches_at_the_end_of_every_tick() {
        let mut w = world_from(r#"
            size = [6, 2]
            start = [0, 0]
            switches = [
                { x = 1, y = 0, gate_id = 1, duration = 2 },
                { x = 3, y = 0, gate_id = 1, duration = 0 },
                { x = 1, y = 1, gate_id = 2, duration = 1 },
            ]
            gates = [{ x = 2, y = 0, gate_id = 1 }, { x = 5, y = 1, gate_id = 2 }]
        "#);
        // actor path: onto the timed switch, off, onto the second timed one,
        // then onto the latch
        let path = [(1, 0), (1, 0), (0, 0), (0, 0), (1, 1), (1, 1), (0, 1), (3, 0), (3, 0)];
        for (x, y) in path {
            w.actor.cell = Pos::new(x, y);
            w.actor.snap();
            step(&mut w, 0);
            for e in &w.entities {
                let Entity::Gate(g) = e else { continue };
                let pressed = w.entities.iter().any(|s| {
                    matches!(s, Entity::Switch(s) if s.gate_id == g.gate_id && s.pressed)
                });
                assert_eq!(g.open, pressed, "gate {} after tick {}", g.gate_id, w.tick);
            }
        }
        assert!(gate_open(&w));
    }

    #[test]
    fn leaving_the_switch_rearms_it() {
        let mut w = world_from(TIMED);
        w.actor.cell = Pos::new(1, 0);
        w.actor.snap();
        for _ in 0..6 { step(&mut w, 0); } // press, open, release
        assert!(!gate_open(&w));

        w.actor.cell = Pos::new(0, 0);
        w.actor.snap();
        step(&mut w, 0);
        w.actor.cell = Pos::new(1, 0);
        w.actor.snap();
        let events = step(&mut w, 0);
        assert!(events.iter().any(|e| e.name() == "trigger"));
    }

    #[test]
    fn patrolling_hazard_catches_idle_actor() {
        let mut w = world_from(r#"
            size = [3, 3]
            start = [1, 2]
            hazards = [{ x = 1, y = 0, patrol = 2, axis = "south" }]
        "#);
        let mut events = vec![];
        for _ in 0..3 { events.extend(step(&mut w, 0)); }
        assert!(events.contains(&GameEvent::GameOver { cause: EntityKind::Hazard, at: Pos::new(1, 2) }));
        assert_eq!(w.phase, Phase::Lost);
        assert!(step(&mut w, 0).is_empty()); // frozen once lost
    }

    #[test]
    fn platforms_move_only_when_advanced() {
        let mut w = world_from(r#"
            size = [4, 1]
            start = [0, 0]
            platforms = [{ points = [{ x = 1, y = 0 }, { x = 3, y = 0 }], speed = 0.5 }]
        "#);
        let platform = |w: &World| w.entities.iter().find_map(|e| match e {
            Entity::Platform(p) => Some(p.clone()),
            _ => None,
        }).unwrap();

        for _ in 0..5 { step(&mut w, 0); }
        assert_eq!(platform(&w).cell(), Pos::new(1, 0));

        advance_platforms(&mut w);
        step(&mut w, 0);
        assert!(platform(&w).moving);
        step(&mut w, 0);
        assert_eq!(platform(&w).cell(), Pos::new(3, 0));
        assert!(!platform(&w).moving);
    }

    #[test]
    fn teleporter_cooldown_counts_down() {
        let mut w = world_from(r#"
            size = [6, 1]
            start = [0, 0]
            teleporters = [{ x = 1, y = 0, pair_id = 1 }, { x = 5, y = 0, pair_id = 1 }]
        "#);
        w.actor.cell = Pos::new(1, 0);
        w.actor.snap();
        let events = step(&mut w, 0);
        assert!(events.iter().any(|e| e.name() == "teleport"));
        for _ in 0..2 { step(&mut w, 0); }
        let cooling = w.entities.iter().all(|e| matches!(e, Entity::Teleporter(t) if t.cooldown == 1));
        assert!(cooling);
        assert_eq!(w.actor.cell, Pos::new(5, 0));

        // once the pads are ready again, standing on one sends the actor back
        let events = step(&mut w, 0);
        assert!(events.contains(&GameEvent::Teleport { from: Pos::new(5, 0), to: Pos::new(1, 0) }));
    }
}
