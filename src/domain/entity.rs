/// Entities: the Actor and the closed set of puzzle entities.
/// Each variant keeps only the state its puzzle semantics need;
/// timers count whole simulation ticks.

use super::grid::{Facing, Point, Pos};

/// The programmed character.
///
/// `cell` is authoritative for puzzle rules. `visual` is the continuous
/// position a presentation layer writes while animating; contact checks
/// read it so nothing triggers mid-slide.
#[derive(Clone, Debug)]
pub struct Actor {
    pub cell: Pos,
    pub facing: Facing,
    pub busy: bool,
    pub visual: Point,
    /// Jump arc height, for presentation only.
    pub lift: f32,
    pub alive: bool,
}

impl Actor {
    pub fn new(cell: Pos, facing: Facing) -> Self {
        Actor {
            cell,
            facing,
            busy: false,
            visual: cell.to_point(),
            lift: 0.0,
            alive: true,
        }
    }

    /// The cell `dist` tiles ahead of the current facing.
    pub fn ahead(&self, dist: i32) -> Pos {
        self.cell.step(self.facing, dist)
    }

    /// Snap visual state onto the grid and clear the in-flight flag.
    pub fn snap(&mut self) {
        self.visual = self.cell.to_point();
        self.lift = 0.0;
        self.busy = false;
    }
}

/// Variant tag, used for logging and events.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum EntityKind {
    Collectible,
    Hazard,
    Switch,
    Gate,
    Teleporter,
    Platform,
    Block,
    Decor,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Collectible => "collectible",
            EntityKind::Hazard => "hazard",
            EntityKind::Switch => "switch",
            EntityKind::Gate => "gate",
            EntityKind::Teleporter => "teleporter",
            EntityKind::Platform => "platform",
            EntityKind::Block => "block",
            EntityKind::Decor => "decor",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct Collectible {
    pub cell: Pos,
    pub active: bool,
}

/// Lethal on contact. With `range > 0` it patrols back and forth along
/// `axis`, `range` tiles out from `origin` and back.
#[derive(Clone, Debug)]
pub struct Hazard {
    pub origin: Pos,
    pub cell: Pos,
    pub axis: Facing,
    pub range: u32,
    pub progress: f32,
    pub heading: f32,       // +1.0 outbound, -1.0 returning
    pub speed_per_tick: f32,
}

impl Hazard {
    pub fn new(origin: Pos, axis: Facing, range: u32, speed_per_tick: f32) -> Self {
        Hazard {
            origin,
            cell: origin,
            axis,
            range,
            progress: 0.0,
            heading: 1.0,
            speed_per_tick,
        }
    }

    /// Advance the patrol by one tick; static hazards never move.
    pub fn tick(&mut self) {
        if self.range == 0 { return; }
        let limit = self.range as f32;
        self.progress += self.speed_per_tick * self.heading;
        if self.progress >= limit {
            self.progress = limit;
            self.heading = -1.0;
        } else if self.progress <= 0.0 {
            self.progress = 0.0;
            self.heading = 1.0;
        }
        self.cell = self.origin.step(self.axis, self.progress.round() as i32);
    }

    pub fn visual(&self) -> Point {
        let (dx, dy) = self.axis.delta();
        Point::new(
            self.origin.x as f32 + dx as f32 * self.progress,
            self.origin.y as f32 + dy as f32 * self.progress,
        )
    }
}

/// Pressure switch. `duration == 0` latches forever once pressed;
/// otherwise it releases itself `duration` ticks after the press.
#[derive(Clone, Debug)]
pub struct Switch {
    pub cell: Pos,
    pub gate_id: u32,
    pub pressed: bool,
    pub duration: u32,
    pub timer: u32,
    /// False from a press until the actor leaves the tile.
    pub armed: bool,
}

impl Switch {
    pub fn new(cell: Pos, gate_id: u32, duration: u32) -> Self {
        Switch { cell, gate_id, pressed: false, duration, timer: 0, armed: true }
    }

    /// Returns true if this call changed the switch state.
    pub fn press(&mut self) -> bool {
        if self.pressed { return false; }
        self.pressed = true;
        self.armed = false;
        if self.duration > 0 { self.timer = self.duration; }
        true
    }

    pub fn release(&mut self) {
        self.pressed = false;
        self.timer = 0;
    }

    /// Count down one tick. Returns true if the switch just released.
    pub fn tick(&mut self) -> bool {
        if !self.pressed || self.duration == 0 { return false; }
        self.timer = self.timer.saturating_sub(1);
        if self.timer == 0 {
            self.release();
            return true;
        }
        false
    }
}

/// Barrier whose open state is derived from its switches each tick.
#[derive(Clone, Debug)]
pub struct Gate {
    pub cell: Pos,
    pub gate_id: u32,
    pub open: bool,
}

impl Gate {
    /// Returns true on an actual transition.
    pub fn open(&mut self) -> bool {
        if self.open { return false; }
        self.open = true;
        true
    }

    /// Returns true on an actual transition.
    pub fn close(&mut self) -> bool {
        if !self.open { return false; }
        self.open = false;
        true
    }
}

#[derive(Clone, Debug)]
pub struct Teleporter {
    pub cell: Pos,
    pub pair_id: u32,
    pub cooldown: u32,
}

impl Teleporter {
    pub fn ready(&self) -> bool {
        self.cooldown == 0
    }

    pub fn tick(&mut self) {
        self.cooldown = self.cooldown.saturating_sub(1);
    }
}

/// Platform gliding along a cyclic waypoint list, one leg per
/// `advance_step`. `cell` is committed only on arrival.
#[derive(Clone, Debug)]
pub struct MovingPlatform {
    pub waypoints: Vec<Pos>,
    pub current: usize,
    pub target: usize,
    pub progress: f32,
    pub moving: bool,
    pub speed_per_tick: f32,
}

impl MovingPlatform {
    pub fn new(waypoints: Vec<Pos>, speed_per_tick: f32) -> Self {
        let target = if waypoints.len() > 1 { 1 } else { 0 };
        MovingPlatform {
            waypoints,
            current: 0,
            target,
            progress: 0.0,
            moving: false,
            speed_per_tick,
        }
    }

    pub fn cell(&self) -> Pos {
        self.waypoints.get(self.current).copied().unwrap_or_default()
    }

    /// Begin the next leg. Ignored while a leg is in progress.
    pub fn advance_step(&mut self) {
        if self.moving || self.waypoints.len() < 2 { return; }
        self.moving = true;
        self.progress = 0.0;
        self.target = (self.current + 1) % self.waypoints.len();
    }

    /// Interpolate one tick. Returns true on arrival at the target.
    pub fn tick(&mut self) -> bool {
        if !self.moving { return false; }
        self.progress += self.speed_per_tick;
        if self.progress >= 1.0 {
            self.progress = 0.0;
            self.moving = false;
            self.current = self.target;
            return true;
        }
        false
    }

    pub fn visual(&self) -> Point {
        let start = self.cell().to_point();
        if !self.moving { return start; }
        let end = self.waypoints[self.target].to_point();
        start.lerp(end, self.progress)
    }
}

/// A block the actor can shove one tile.
#[derive(Clone, Debug)]
pub struct PushableBlock {
    pub cell: Pos,
    pub visual: Point,
    pub moving: bool,
}

impl PushableBlock {
    pub fn new(cell: Pos) -> Self {
        PushableBlock { cell, visual: cell.to_point(), moving: false }
    }

    pub fn move_to(&mut self, cell: Pos) {
        self.cell = cell;
        self.moving = true;
    }

    /// Glide toward `cell` by `glide` of the remaining distance.
    pub fn tick(&mut self, glide: f32) {
        if !self.moving { return; }
        let target = self.cell.to_point();
        if self.visual.distance(target) < 0.05 {
            self.visual = target;
            self.moving = false;
        } else {
            self.visual = self.visual.lerp(target, glide);
        }
    }
}

/// Static scenery; no puzzle semantics.
#[derive(Clone, Debug)]
pub struct Decor {
    pub cell: Pos,
}

/// The closed set of puzzle entities on a level.
#[derive(Clone, Debug)]
pub enum Entity {
    Collectible(Collectible),
    Hazard(Hazard),
    Switch(Switch),
    Gate(Gate),
    Teleporter(Teleporter),
    Platform(MovingPlatform),
    Block(PushableBlock),
    Decor(Decor),
}

impl Entity {
    pub fn cell(&self) -> Pos {
        match self {
            Entity::Collectible(c) => c.cell,
            Entity::Hazard(h) => h.cell,
            Entity::Switch(s) => s.cell,
            Entity::Gate(g) => g.cell,
            Entity::Teleporter(t) => t.cell,
            Entity::Platform(p) => p.cell(),
            Entity::Block(b) => b.cell,
            Entity::Decor(d) => d.cell,
        }
    }

    /// Does this entity currently stop anything entering its tile?
    pub fn is_closed_gate(&self) -> bool {
        matches!(self, Entity::Gate(g) if !g.open)
    }

    pub fn is_block(&self) -> bool {
        matches!(self, Entity::Block(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timed_switch_lifecycle() {
        let mut s = Switch::new(Pos::new(1, 0), 7, 3);
        assert!(s.press());
        assert!(!s.press()); // already pressed
        assert!(!s.armed);
        assert_eq!(s.timer, 3);

        assert!(!s.tick()); // 3→2
        assert!(!s.tick()); // 2→1
        assert!(s.tick());  // 1→0, released
        assert!(!s.pressed);
        assert!(!s.tick()); // idle switches don't count
    }

    #[test]
    fn permanent_switch_never_releases() {
        let mut s = Switch::new(Pos::new(0, 0), 1, 0);
        s.press();
        for _ in 0..100 { assert!(!s.tick()); }
        assert!(s.pressed);
    }

    #[test]
    fn gate_transitions_are_idempotent() {
        let mut g = Gate { cell: Pos::new(0, 0), gate_id: 1, open: false };
        assert!(!g.close());
        assert!(g.open());
        assert!(!g.open());
        assert!(g.close());
    }

    #[test]
    fn platform_cycles_waypoints() {
        let mut p = MovingPlatform::new(vec![Pos::new(0, 0), Pos::new(2, 0), Pos::new(2, 2)], 0.5);
        p.advance_step();
        assert!(p.moving);
        p.advance_step(); // ignored mid-leg
        assert_eq!(p.target, 1);

        assert!(!p.tick());
        assert_eq!(p.cell(), Pos::new(0, 0));
        assert!((p.visual().x - 1.0).abs() < 1e-6);
        assert!(p.tick());
        assert_eq!(p.cell(), Pos::new(2, 0));

        p.advance_step();
        p.tick();
        p.tick();
        assert_eq!(p.cell(), Pos::new(2, 2));
        p.advance_step();
        assert_eq!(p.target, 0); // wraps
    }

    #[test]
    fn single_point_platform_stays_put() {
        let mut p = MovingPlatform::new(vec![Pos::new(3, 3)], 1.0);
        p.advance_step();
        assert!(!p.moving);
        assert!(!p.tick());
        assert_eq!(p.cell(), Pos::new(3, 3));
    }

    #[test]
    fn hazard_patrol_bounces() {
        let mut h = Hazard::new(Pos::new(1, 1), Facing::South, 2, 1.0);
        h.tick();
        assert_eq!(h.cell, Pos::new(1, 2));
        h.tick();
        assert_eq!(h.cell, Pos::new(1, 3));
        h.tick(); // turned around
        assert_eq!(h.cell, Pos::new(1, 2));
        h.tick();
        h.tick();
        assert_eq!(h.cell, Pos::new(1, 2));
    }

    #[test]
    fn static_hazard_never_moves() {
        let mut h = Hazard::new(Pos::new(4, 4), Facing::East, 0, 1.0);
        for _ in 0..10 { h.tick(); }
        assert_eq!(h.cell, Pos::new(4, 4));
    }

    #[test]
    fn block_glides_then_settles() {
        let mut b = PushableBlock::new(Pos::new(2, 0));
        b.move_to(Pos::new(3, 0));
        assert_eq!(b.cell, Pos::new(3, 0));
        for _ in 0..20 { b.tick(0.5); }
        assert!(!b.moving);
        assert_eq!(b.visual, Pos::new(3, 0).to_point());
    }

    #[test]
    fn actor_snap_clears_flight() {
        let mut a = Actor::new(Pos::new(0, 0), Facing::East);
        a.cell = a.ahead(2);
        a.busy = true;
        a.lift = 0.8;
        a.snap();
        assert!(!a.busy);
        assert_eq!(a.visual, Pos::new(2, 0).to_point());
        assert_eq!(a.lift, 0.0);
    }
}
