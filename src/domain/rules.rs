/// Movement legality and star rating.
///
/// Pure functions over a borrowed view of the level. Nothing in this file
/// mutates world state; a legal push is *reported* as [`Entry::Push`] and
/// applied separately by the world.
///
/// ## Entry Truth Table
///
/// Rules are checked top to bottom; the first match decides.
/// ┌────────────────────────────────┬──────────────────────────┐
/// │ Condition                      │ Result                   │
/// ├────────────────────────────────┼──────────────────────────┤
/// │ target outside width × height  │ Blocked(OutOfBounds)     │
/// │ closed gate on target          │ Blocked(ClosedGate)      │
/// │ block on target, mover = actor │ Push if the block may    │
/// │                                │ enter target + (target - │
/// │                                │ from) (same table, mover │
/// │                                │ = block)                 │
/// │                                │ else Blocked(PushBlocked)│
/// │ block on target, mover = block │ Blocked(Block)           │
/// │ otherwise                      │ Clear                    │
/// └────────────────────────────────┴──────────────────────────┘
///
/// Only one block is ever pushed; a block can't shove another. The block
/// travels as far as the actor did, so a jump landing on it sends it two
/// tiles on; only its landing tile is checked.

use serde::{Deserialize, Serialize};

use super::entity::Entity;
use super::grid::Pos;

/// Immutable view of a level for rule queries.
pub struct GridView<'a> {
    pub width: i32,
    pub height: i32,
    pub entities: &'a [Entity],
}

impl<'a> GridView<'a> {
    pub fn in_bounds(&self, p: Pos) -> bool {
        p.x >= 0 && p.y >= 0 && p.x < self.width && p.y < self.height
    }

    pub fn closed_gate_at(&self, p: Pos) -> bool {
        self.entities.iter().any(|e| e.is_closed_gate() && e.cell() == p)
    }

    /// Index of the pushable block resting on `p`, if any.
    pub fn block_at(&self, p: Pos) -> Option<usize> {
        self.entities.iter().position(|e| e.is_block() && e.cell() == p)
    }
}

/// Who is trying to enter a tile.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Mover {
    /// The programmed actor, currently standing on `from`.
    Actor { from: Pos },
    /// A pushed block.
    Block,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Blocker {
    OutOfBounds,
    ClosedGate,
    Block,
    PushBlocked,
}

/// Outcome of a legality query.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Entry {
    Clear,
    /// Legal, provided entity `block` is first moved to `to`.
    Push { block: usize, to: Pos },
    Blocked(Blocker),
}

impl Entry {
    pub fn is_legal(&self) -> bool {
        !matches!(self, Entry::Blocked(_))
    }
}

/// Can `mover` occupy `target`? See the truth table above.
pub fn can_enter(view: &GridView, target: Pos, mover: Mover) -> Entry {
    if !view.in_bounds(target) {
        return Entry::Blocked(Blocker::OutOfBounds);
    }
    if view.closed_gate_at(target) {
        return Entry::Blocked(Blocker::ClosedGate);
    }
    if let Some(block) = view.block_at(target) {
        return match mover {
            Mover::Actor { from } => {
                let (dx, dy) = from.delta_to(target);
                let to = target.offset(dx, dy);
                if can_enter(view, to, Mover::Block) == Entry::Clear {
                    Entry::Push { block, to }
                } else {
                    Entry::Blocked(Blocker::PushBlocked)
                }
            }
            Mover::Block => Entry::Blocked(Blocker::Block),
        };
    }
    Entry::Clear
}

// ── Star rating ──

/// Instruction-count thresholds for a level's star rating.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct StarThresholds {
    #[serde(alias = "3")]
    pub three: u64,
    #[serde(alias = "2")]
    pub two: u64,
}

/// 3 stars at or under `three`, 2 at or under `two`, else 1.
/// Levels without thresholds always rate 1.
pub fn star_rating(thresholds: Option<&StarThresholds>, executed: u64) -> u8 {
    match thresholds {
        Some(t) if executed <= t.three => 3,
        Some(t) if executed <= t.two => 2,
        _ => 1,
    }
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::{Collectible, Gate, PushableBlock, Switch};

    fn gate(x: i32, y: i32, open: bool) -> Entity {
        Entity::Gate(Gate { cell: Pos::new(x, y), gate_id: 1, open })
    }

    fn block(x: i32, y: i32) -> Entity {
        Entity::Block(PushableBlock::new(Pos::new(x, y)))
    }

    fn view(entities: &[Entity]) -> GridView<'_> {
        GridView { width: 5, height: 5, entities }
    }

    fn actor_at(x: i32, y: i32) -> Mover {
        Mover::Actor { from: Pos::new(x, y) }
    }

    #[test]
    fn bounds_are_enforced() {
        let v = view(&[]);
        assert_eq!(can_enter(&v, Pos::new(-1, 0), actor_at(0, 0)), Entry::Blocked(Blocker::OutOfBounds));
        assert_eq!(can_enter(&v, Pos::new(5, 0), actor_at(4, 0)), Entry::Blocked(Blocker::OutOfBounds));
        assert_eq!(can_enter(&v, Pos::new(0, 5), actor_at(0, 4)), Entry::Blocked(Blocker::OutOfBounds));
        assert_eq!(can_enter(&v, Pos::new(4, 4), actor_at(3, 4)), Entry::Clear);
    }

    #[test]
    fn closed_gate_blocks_open_gate_does_not() {
        let closed = [gate(2, 0, false)];
        let open = [gate(2, 0, true)];
        assert_eq!(can_enter(&view(&closed), Pos::new(2, 0), actor_at(1, 0)), Entry::Blocked(Blocker::ClosedGate));
        assert_eq!(can_enter(&view(&open), Pos::new(2, 0), actor_at(1, 0)), Entry::Clear);
    }

    #[test]
    fn walking_pushes_block_one_step() {
        let entities = [block(2, 0)];
        let entry = can_enter(&view(&entities), Pos::new(2, 0), actor_at(1, 0));
        assert_eq!(entry, Entry::Push { block: 0, to: Pos::new(3, 0) });
        assert!(entry.is_legal());
    }

    #[test]
    fn push_direction_follows_approach() {
        let entities = [block(2, 2)];
        let v = view(&entities);
        assert_eq!(can_enter(&v, Pos::new(2, 2), actor_at(2, 3)), Entry::Push { block: 0, to: Pos::new(2, 1) });
        assert_eq!(can_enter(&v, Pos::new(2, 2), actor_at(3, 2)), Entry::Push { block: 0, to: Pos::new(1, 2) });
        // a jump lands on the block from two tiles out and sends it two on
        assert_eq!(can_enter(&v, Pos::new(2, 2), actor_at(0, 2)), Entry::Push { block: 0, to: Pos::new(4, 2) });
        assert_eq!(can_enter(&v, Pos::new(2, 2), actor_at(2, 0)), Entry::Push { block: 0, to: Pos::new(2, 4) });
        assert_eq!(can_enter(&v, Pos::new(2, 2), actor_at(2, 4)), Entry::Push { block: 0, to: Pos::new(2, 0) });
    }

    #[test]
    fn push_into_wall_gate_or_block_is_illegal() {
        let wall = [block(4, 0)];
        let gated = [block(2, 0), gate(3, 0, false)];
        let stacked = [block(2, 0), block(3, 0)];
        for entities in [&wall[..], &gated[..], &stacked[..]] {
            let v = view(entities);
            let target = entities[0].cell();
            let from = target.offset(-1, 0);
            assert_eq!(
                can_enter(&v, target, Mover::Actor { from }),
                Entry::Blocked(Blocker::PushBlocked)
            );
            assert_eq!(entities[0].cell(), target); // untouched
        }
    }

    #[test]
    fn only_the_actor_pushes() {
        let entities = [block(2, 0)];
        assert_eq!(can_enter(&view(&entities), Pos::new(2, 0), Mover::Block), Entry::Blocked(Blocker::Block));
    }

    #[test]
    fn non_blocking_entities_are_walkable() {
        let entities = [
            Entity::Collectible(Collectible { cell: Pos::new(1, 0), active: true }),
            Entity::Switch(Switch::new(Pos::new(2, 0), 1, 0)),
        ];
        let v = view(&entities);
        assert_eq!(can_enter(&v, Pos::new(1, 0), actor_at(0, 0)), Entry::Clear);
        assert_eq!(can_enter(&v, Pos::new(2, 0), actor_at(1, 0)), Entry::Clear);
    }

    #[test]
    fn legality_is_repeatable() {
        let entities = [block(2, 0), gate(0, 1, false)];
        let v = view(&entities);
        for (target, from) in [(Pos::new(2, 0), Pos::new(1, 0)), (Pos::new(0, 1), Pos::new(0, 0))] {
            let first = can_enter(&v, target, Mover::Actor { from });
            let second = can_enter(&v, target, Mover::Actor { from });
            assert_eq!(first, second);
        }
    }

    #[test]
    fn star_thresholds() {
        let t = StarThresholds { three: 4, two: 6 };
        assert_eq!(star_rating(Some(&t), 3), 3);
        assert_eq!(star_rating(Some(&t), 4), 3);
        assert_eq!(star_rating(Some(&t), 5), 2);
        assert_eq!(star_rating(Some(&t), 6), 2);
        assert_eq!(star_rating(Some(&t), 7), 1);
        assert_eq!(star_rating(None, 0), 1);
    }

    #[test]
    fn stars_never_increase_with_count() {
        let t = StarThresholds { three: 5, two: 9 };
        let mut prev = u8::MAX;
        for n in 0..30 {
            let s = star_rating(Some(&t), n);
            assert!(s <= prev);
            prev = s;
        }
    }

    #[test]
    fn thresholds_accept_numeric_keys() {
        let t: StarThresholds = serde_json::from_str(r#"{ "3": 4, "2": 6 }"#).unwrap();
        assert_eq!(t, StarThresholds { three: 4, two: 6 });
    }
}
