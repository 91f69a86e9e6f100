//! Program Interpreter.
//!
//! Walks the instruction tree depth-first, one instruction at a time. Each
//! instruction runs to completion, animation included, before the next is
//! dispatched. Animations are the only suspension points; `stop()` is seen
//! at the next instruction boundary and never cancels an animation.
//!
//! World access goes through [`SharedWorld::with`] in short synchronous
//! sections, so the simulation tick can interleave between (never inside)
//! the interpreter's steps.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::SpeedConfig;
use crate::domain::grid::Pos;
use crate::domain::program::{Block, BlockKind, Program};
use crate::sim::actor::{ActorControl, ActorError};
use crate::sim::event::{EventBus, GameEvent};
use crate::sim::interact::check_interactions;
use crate::sim::step::advance_platforms;
use crate::sim::world::{Phase, SharedWorld, WorldPoisoned};

// ══════════════════════════════════════════════════════════════
// Run state
// ══════════════════════════════════════════════════════════════

/// Flags shared between the interpreter and whoever observes it.
#[derive(Debug, Default)]
pub struct RunControl {
    running: AtomicBool,
    executed: AtomicU64,
}

impl RunControl {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Leaf instructions executed so far in the current (or last) run.
    pub fn executed(&self) -> u64 {
        self.executed.load(Ordering::SeqCst)
    }
}

/// Per-run state. Created at run start, dropped at run end.
#[derive(Debug, Default)]
struct RunContext {
    variables: BTreeMap<String, i64>,
    functions: HashMap<String, Arc<Vec<Block>>>,
    depth: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    World(#[from] WorldPoisoned),
    #[error(transparent)]
    Actor(#[from] ActorError),
    #[error("call depth limit {depth} exceeded calling {name:?}")]
    CallDepthExceeded { name: String, depth: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Finished,
    Stopped,
    Aborted(RunError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub executed: u64,
    pub variables: BTreeMap<String, i64>,
}

// ══════════════════════════════════════════════════════════════
// Pacing
// ══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pause {
    /// After every leaf instruction.
    Instruction,
    /// After every WHILE_CLEAR pass.
    LoopPass,
}

/// Real-time cadence between instructions.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, pause: Pause);
}

/// Sleeps on the tokio clock.
pub struct SleepPacer {
    instruction: Duration,
    loop_pass: Duration,
}

impl SleepPacer {
    pub fn new(instruction: Duration, loop_pass: Duration) -> Self {
        SleepPacer { instruction, loop_pass }
    }

    pub fn from_config(speed: &SpeedConfig) -> Self {
        SleepPacer::new(
            Duration::from_millis(speed.instruction_delay_ms),
            Duration::from_millis(speed.loop_delay_ms),
        )
    }
}

#[async_trait]
impl Pacer for SleepPacer {
    async fn pause(&self, pause: Pause) {
        let d = match pause {
            Pause::Instruction => self.instruction,
            Pause::LoopPass => self.loop_pass,
        };
        if !d.is_zero() {
            tokio::time::sleep(d).await;
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Interpreter
// ══════════════════════════════════════════════════════════════

type RunFuture<'a> = Pin<Box<dyn Future<Output = Result<(), RunError>> + Send + 'a>>;

pub struct Interpreter {
    world: SharedWorld,
    actor: Arc<dyn ActorControl>,
    pacer: Arc<dyn Pacer>,
    events: EventBus,
    control: Arc<RunControl>,
    max_call_depth: usize,
}

impl Interpreter {
    pub fn new(
        world: SharedWorld,
        events: EventBus,
        actor: Arc<dyn ActorControl>,
        pacer: Arc<dyn Pacer>,
    ) -> Self {
        Interpreter {
            world,
            actor,
            pacer,
            events,
            control: Arc::new(RunControl::default()),
            max_call_depth: 64,
        }
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn control(&self) -> Arc<RunControl> {
        Arc::clone(&self.control)
    }

    pub fn is_running(&self) -> bool {
        self.control.is_running()
    }

    /// Ask the current run to end at its next instruction boundary.
    pub fn stop(&self) {
        if self.control.running.swap(false, Ordering::SeqCst) {
            tracing::info!("run stop requested");
        }
    }

    /// Execute `program` to completion, stop or abort.
    ///
    /// Returns `None` without touching any state if a run is already in
    /// progress.
    pub async fn run(&self, program: &Program) -> Option<RunSummary> {
        if self
            .control
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("run requested while already running; ignored");
            return None;
        }
        self.control.executed.store(0, Ordering::SeqCst);
        tracing::info!(blocks = program.block_count(), "run started");

        let mut ctx = RunContext::default();
        let result = match self.world.with(|w| w.actor.snap()) {
            Ok(()) => self.execute_list(&mut ctx, &program.blocks).await,
            Err(e) => Err(e.into()),
        };

        let stopped = !self.control.running.swap(false, Ordering::SeqCst);
        let executed = self.control.executed();
        let outcome = match result {
            Ok(()) if stopped => RunOutcome::Stopped,
            Ok(()) => RunOutcome::Finished,
            Err(e) => {
                tracing::error!(error = %e, "run aborted");
                self.events.publish(GameEvent::ProgramError { message: e.to_string() });
                RunOutcome::Aborted(e)
            }
        };
        if !matches!(outcome, RunOutcome::Aborted(_)) {
            self.events.publish(GameEvent::ProgramFinished { executed });
        }
        tracing::info!(?outcome, executed, "run ended");

        Some(RunSummary { outcome, executed, variables: ctx.variables })
    }

    fn execute_list<'a>(&'a self, ctx: &'a mut RunContext, blocks: &'a [Block]) -> RunFuture<'a> {
        Box::pin(async move {
            for block in blocks {
                if !self.is_running() {
                    break;
                }
                self.execute(ctx, block).await?;
            }
            Ok(())
        })
    }

    async fn execute(&self, ctx: &mut RunContext, block: &Block) -> Result<(), RunError> {
        if !self.is_running() {
            return Ok(());
        }
        // A tick-level hazard contact ends the run here.
        if self.world.with(|w| w.phase == Phase::Lost)? {
            self.stop();
            return Ok(());
        }

        let leaf = block.kind.is_leaf();
        self.events.publish(GameEvent::InstructionStarted { id: block.id.clone() });
        if leaf {
            self.control.executed.fetch_add(1, Ordering::SeqCst);
        }
        tracing::debug!(id = %block.id, kind = block.kind.tag(), "instruction");

        match &block.kind {
            BlockKind::Move => self.advance(1).await?,
            BlockKind::Jump => self.advance(2).await?,
            BlockKind::TurnLeft => {
                let facing = self.world.with(|w| {
                    w.actor.facing = w.actor.facing.turn_left();
                    w.actor.busy = true;
                    w.actor.facing
                })?;
                self.actor.turn_left(facing).await?;
                self.world.with(|w| w.actor.busy = false)?;
            }
            BlockKind::TurnRight => {
                let facing = self.world.with(|w| {
                    w.actor.facing = w.actor.facing.turn_right();
                    w.actor.busy = true;
                    w.actor.facing
                })?;
                self.actor.turn_right(facing).await?;
                self.world.with(|w| w.actor.busy = false)?;
            }
            BlockKind::Repeat { times, body } => {
                for _ in 0..*times {
                    if !self.is_running() {
                        break;
                    }
                    self.execute_list(ctx, body).await?;
                }
            }
            BlockKind::WhileClear { body } => {
                while self.is_running() && self.ahead_is_clear()? {
                    self.execute_list(ctx, body).await?;
                    self.pacer.pause(Pause::LoopPass).await;
                }
            }
            BlockKind::IfObstacle { body } => {
                if !self.ahead_is_clear()? {
                    self.execute_list(ctx, body).await?;
                }
            }
            BlockKind::IfNotObstacle { body } => {
                if self.ahead_is_clear()? {
                    self.execute_list(ctx, body).await?;
                }
            }
            BlockKind::IncVar { var } => {
                let v = ctx.variables.entry(var.clone()).or_insert(0);
                *v += 1;
                tracing::debug!(var = %var, value = *v, "variable");
            }
            BlockKind::DecVar { var } => {
                let v = ctx.variables.entry(var.clone()).or_insert(0);
                *v -= 1;
                tracing::debug!(var = %var, value = *v, "variable");
            }
            BlockKind::DefineFunc { name, body } => {
                ctx.functions.insert(name.clone(), Arc::new(body.clone()));
            }
            BlockKind::CallFunc { name } => {
                if let Some(body) = ctx.functions.get(name).cloned() {
                    if ctx.depth >= self.max_call_depth {
                        return Err(RunError::CallDepthExceeded {
                            name: name.clone(),
                            depth: self.max_call_depth,
                        });
                    }
                    ctx.depth += 1;
                    let result = self.execute_list(ctx, &body).await;
                    ctx.depth -= 1;
                    result?;
                } else {
                    tracing::debug!(name = %name, "call to undefined function skipped");
                }
            }
            BlockKind::Unknown { tag } => {
                tracing::warn!(id = %block.id, tag = %tag, "unknown instruction ignored");
            }
        }

        if leaf {
            if self.is_running() {
                self.pacer.pause(Pause::Instruction).await;
            }
            self.world.with(advance_platforms)?;
        }
        // Sent even after a stop so every started highlight gets cleared.
        self.events.publish(GameEvent::InstructionFinished { id: block.id.clone() });
        Ok(())
    }

    /// Pure forward check used by conditions and loops.
    fn ahead_is_clear(&self) -> Result<bool, RunError> {
        Ok(self.world.with(|w| w.can_enter(w.actor.ahead(1)).is_legal())?)
    }

    /// MOVE (`dist` 1) or JUMP (`dist` 2).
    async fn advance(&self, dist: i32) -> Result<(), RunError> {
        let plan: Result<(Pos, Pos), Pos> = self.world.with(|w| {
            let from = w.actor.cell;
            let target = w.actor.ahead(dist);
            // The jumped-over tile is only checked, never pushed.
            let clear_path = (1..dist).all(|d| w.can_enter(w.actor.ahead(d)).is_legal());
            if !(clear_path && w.is_legal_move(target)) {
                return Err(from);
            }
            w.actor.cell = target;
            w.actor.busy = true;
            Ok((from, target))
        })?;

        let (from, to) = match plan {
            Ok(route) => route,
            Err(at) => {
                tracing::debug!(at = %at, dist, "blocked");
                self.events.publish(GameEvent::Blocked { at });
                self.actor.shake(at).await?;
                return Ok(());
            }
        };

        if dist == 1 {
            self.actor.move_forward(from, to).await?;
        } else {
            self.actor.jump(from, to).await?;
        }

        let executed = self.control.executed();
        let events = self.world.with(|w| {
            w.actor.snap();
            check_interactions(w, executed)
        })?;
        let lost = events.iter().any(|e| matches!(e, GameEvent::GameOver { .. }));
        self.events.publish_all(events);
        if lost {
            self.stop();
        }
        Ok(())
    }
}

// ══════════════════════════════════════════════════════════════
// Tests
// ══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::{Entity, EntityKind};
    use crate::domain::grid::Facing;
    use crate::sim::actor::{ChannelActor, InstantActor};
    use crate::sim::event::drain;
    use crate::sim::step::step;
    use crate::sim::world::tests::world_from;
    use tokio::sync::broadcast;

    struct NoPause;

    #[async_trait]
    impl Pacer for NoPause {
        async fn pause(&self, _pause: Pause) {}
    }

    /// Advances the simulation a fixed number of ticks per instruction pause.
    struct StepPacer {
        world: SharedWorld,
        ticks: u32,
    }

    #[async_trait]
    impl Pacer for StepPacer {
        async fn pause(&self, pause: Pause) {
            if pause == Pause::Instruction {
                self.world
                    .with(|w| for _ in 0..self.ticks { step(w, 0); })
                    .unwrap();
            }
        }
    }

    fn setup(level: &str) -> (Interpreter, SharedWorld, broadcast::Receiver<GameEvent>) {
        let world = SharedWorld::new(world_from(level));
        let bus = EventBus::new();
        let rx = bus.subscribe();
        let interp = Interpreter::new(world.clone(), bus, Arc::new(InstantActor), Arc::new(NoPause));
        (interp, world, rx)
    }

    fn b(id: &str, kind: BlockKind) -> Block {
        Block::new(id, kind)
    }

    fn moves(n: usize) -> Vec<Block> {
        (0..n).map(|i| b(&format!("m{i}"), BlockKind::Move)).collect()
    }

    fn actor_cell(world: &SharedWorld) -> Pos {
        world.with(|w| w.actor.cell).unwrap()
    }

    fn names(events: &[GameEvent]) -> Vec<&'static str> {
        events.iter().map(|e| e.name()).collect()
    }

    #[tokio::test]
    async fn repeat_four_moves_collects_and_wins() {
        let (interp, world, mut rx) = setup(r#"
            size = [5, 5]
            start = [0, 0]
            collectibles = [{ x = 4, y = 0 }]
            stars = { three = 4, two = 6 }
        "#);
        let program = Program::new(vec![b("r", BlockKind::Repeat { times: 4, body: moves(1) })]);

        let summary = interp.run(&program).await.unwrap();
        assert_eq!(summary.outcome, RunOutcome::Finished);
        assert_eq!(summary.executed, 4);
        assert_eq!(actor_cell(&world), Pos::new(4, 0));
        assert_eq!(world.with(|w| w.active_collectibles()).unwrap(), 0);

        let events = drain(&mut rx);
        let wins: Vec<_> = events.iter().filter(|e| e.name() == "level-complete").collect();
        assert_eq!(wins, [&GameEvent::LevelComplete { stars: 3, executed: 4 }]);
        assert_eq!(events.last(), Some(&GameEvent::ProgramFinished { executed: 4 }));
        assert!(!interp.is_running());
    }

    #[tokio::test]
    async fn move_pushes_block() {
        let (interp, world, _rx) = setup("size = [5, 1]\nstart = [1, 0]\nblocks = [{ x = 2, y = 0 }]\n");
        interp.run(&Program::new(moves(1))).await.unwrap();
        assert_eq!(actor_cell(&world), Pos::new(2, 0));
        assert_eq!(world.with(|w| w.entities[0].cell()).unwrap(), Pos::new(3, 0));
    }

    #[tokio::test]
    async fn blocked_move_shakes_and_still_counts() {
        let (interp, world, mut rx) = setup("size = [2, 1]\nstart = [1, 0]\n");
        let summary = interp.run(&Program::new(moves(1))).await.unwrap();
        assert_eq!(summary.executed, 1);
        assert_eq!(actor_cell(&world), Pos::new(1, 0));
        assert!(drain(&mut rx).contains(&GameEvent::Blocked { at: Pos::new(1, 0) }));
    }

    #[tokio::test]
    async fn call_before_define_is_a_noop() {
        let (interp, world, _rx) = setup("size = [5, 1]\nstart = [0, 0]\n");
        let program = Program::new(vec![
            b("c1", BlockKind::CallFunc { name: "loop".into() }),
            b("d", BlockKind::DefineFunc {
                name: "loop".into(),
                body: vec![b("inc", BlockKind::IncVar { var: "a".into() }), b("mv", BlockKind::Move)],
            }),
            b("c2", BlockKind::CallFunc { name: "loop".into() }),
        ]);
        let summary = interp.run(&program).await.unwrap();
        assert_eq!(summary.variables.get("a"), Some(&1));
        assert_eq!(summary.executed, 2);
        assert_eq!(actor_cell(&world), Pos::new(1, 0));
    }

    #[tokio::test]
    async fn variables_default_and_reset_per_run() {
        let (interp, _world, _rx) = setup("size = [2, 1]\nstart = [0, 0]\n");
        let program = Program::new(vec![
            b("1", BlockKind::DecVar { var: "a".into() }),
            b("2", BlockKind::DecVar { var: "a".into() }),
            b("3", BlockKind::IncVar { var: "b".into() }),
        ]);
        for _ in 0..2 {
            let summary = interp.run(&program).await.unwrap();
            assert_eq!(summary.variables.get("a"), Some(&-2));
            assert_eq!(summary.variables.get("b"), Some(&1));
        }
    }

    #[tokio::test]
    async fn turns_and_jump() {
        let (interp, world, mut rx) = setup(r#"
            size = [3, 3]
            start = [0, 2]
            collectibles = [{ x = 0, y = 0 }]
            decor = [{ x = 0, y = 1 }]
        "#);
        let program = Program::new(vec![
            b("l", BlockKind::TurnLeft),
            b("j", BlockKind::Jump),
        ]);
        let summary = interp.run(&program).await.unwrap();
        assert_eq!(summary.executed, 2);
        assert_eq!(world.with(|w| w.actor.facing).unwrap(), Facing::North);
        assert_eq!(actor_cell(&world), Pos::new(0, 0));
        assert!(names(&drain(&mut rx)).contains(&"level-complete"));
    }

    #[tokio::test]
    async fn jump_onto_block_sends_it_two_tiles() {
        let (interp, world, _rx) = setup("size = [7, 1]\nstart = [0, 0]\nblocks = [{ x = 2, y = 0 }]\n");
        interp.run(&Program::new(vec![b("j", BlockKind::Jump)])).await.unwrap();
        assert_eq!(actor_cell(&world), Pos::new(2, 0));
        assert_eq!(world.with(|w| w.entities[0].cell()).unwrap(), Pos::new(4, 0));

        // no room two tiles on: the jump is blocked and nothing moves
        let (interp, world, mut rx) = setup("size = [4, 1]\nstart = [0, 0]\nblocks = [{ x = 2, y = 0 }]\n");
        interp.run(&Program::new(vec![b("j", BlockKind::Jump)])).await.unwrap();
        assert_eq!(actor_cell(&world), Pos::new(0, 0));
        assert_eq!(world.with(|w| w.entities[0].cell()).unwrap(), Pos::new(2, 0));
        assert!(names(&drain(&mut rx)).contains(&"blocked"));
    }

    #[tokio::test]
    async fn jump_over_closed_gate_is_blocked() {
        let (interp, world, mut rx) = setup(r#"
            size = [3, 1]
            start = [0, 0]
            gates = [{ x = 1, y = 0, gate_id = 3 }]
        "#);
        interp.run(&Program::new(vec![b("j", BlockKind::Jump)])).await.unwrap();
        assert_eq!(actor_cell(&world), Pos::new(0, 0));
        assert!(names(&drain(&mut rx)).contains(&"blocked"));
    }

    #[tokio::test]
    async fn while_clear_and_conditionals() {
        let (interp, world, _rx) = setup("size = [5, 1]\nstart = [0, 0]\n");
        let program = Program::new(vec![
            b("w", BlockKind::WhileClear { body: moves(1) }),
            b("if", BlockKind::IfObstacle { body: vec![b("t", BlockKind::TurnRight)] }),
            b("ifn", BlockKind::IfNotObstacle { body: vec![b("x", BlockKind::IncVar { var: "never".into() })] }),
        ]);
        let summary = interp.run(&program).await.unwrap();
        assert_eq!(actor_cell(&world), Pos::new(4, 0));
        assert_eq!(summary.executed, 5); // 4 moves + 1 turn
        assert_eq!(world.with(|w| w.actor.facing).unwrap(), Facing::South);
        assert!(summary.variables.get("never").is_none());
    }

    #[tokio::test]
    async fn unknown_instructions_are_skipped() {
        let (interp, world, _rx) = setup("size = [3, 1]\nstart = [0, 0]\n");
        let program = Program::new(vec![
            b("u", BlockKind::Unknown { tag: "DANCE".into() }),
            b("m", BlockKind::Move),
        ]);
        let summary = interp.run(&program).await.unwrap();
        assert_eq!(summary.outcome, RunOutcome::Finished);
        assert_eq!(summary.executed, 1);
        assert_eq!(actor_cell(&world), Pos::new(1, 0));
    }

    #[tokio::test]
    async fn hazard_contact_stops_the_run() {
        let (interp, world, mut rx) = setup(r#"
            size = [5, 1]
            start = [0, 0]
            hazards = [{ x = 2, y = 0 }]
        "#);
        let summary = interp.run(&Program::new(moves(4))).await.unwrap();
        assert_eq!(summary.outcome, RunOutcome::Stopped);
        assert_eq!(summary.executed, 2);
        assert_eq!(actor_cell(&world), Pos::new(2, 0));

        let events = drain(&mut rx);
        assert!(events.contains(&GameEvent::GameOver { cause: EntityKind::Hazard, at: Pos::new(2, 0) }));
        let started = events.iter().filter(|e| e.name() == "instruction-started").count();
        assert_eq!(started, 2);
    }

    #[tokio::test]
    async fn timed_switch_window() {
        const LEVEL: &str = r#"
            size = [5, 1]
            start = [0, 0]
            switches = [{ x = 1, y = 0, gate_id = 1, duration = 3 }]
            gates = [{ x = 2, y = 0, gate_id = 1 }]
        "#;
        for (ticks, expected) in [(1, Pos::new(2, 0)), (5, Pos::new(1, 0))] {
            let world = SharedWorld::new(world_from(LEVEL));
            let pacer = StepPacer { world: world.clone(), ticks };
            let interp = Interpreter::new(world.clone(), EventBus::new(), Arc::new(InstantActor), Arc::new(pacer));
            interp.run(&Program::new(moves(2))).await.unwrap();
            assert_eq!(actor_cell(&world), expected, "{ticks} tick(s) between moves");
        }
    }

    #[tokio::test]
    async fn runaway_recursion_aborts() {
        let (interp, _world, mut rx) = setup("size = [2, 1]\nstart = [0, 0]\n");
        let interp = interp.with_max_call_depth(8);
        let program = Program::new(vec![
            b("d", BlockKind::DefineFunc { name: "f".into(), body: vec![b("c", BlockKind::CallFunc { name: "f".into() })] }),
            b("go", BlockKind::CallFunc { name: "f".into() }),
        ]);
        let summary = interp.run(&program).await.unwrap();
        assert_eq!(
            summary.outcome,
            RunOutcome::Aborted(RunError::CallDepthExceeded { name: "f".into(), depth: 8 })
        );
        assert!(!interp.is_running());
        let events = drain(&mut rx);
        assert!(names(&events).contains(&"program-error"));
        assert!(!names(&events).contains(&"program-finished"));
    }

    #[tokio::test]
    async fn run_while_running_is_ignored() {
        let world = SharedWorld::new(world_from("size = [5, 1]\nstart = [0, 0]\n"));
        let (actor, mut requests) = ChannelActor::new();
        let interp = Arc::new(Interpreter::new(world.clone(), EventBus::new(), Arc::new(actor), Arc::new(NoPause)));
        let program = Program::new(moves(2));

        let first = tokio::spawn({
            let interp = Arc::clone(&interp);
            let program = program.clone();
            async move { interp.run(&program).await }
        });

        let req = requests.recv().await.unwrap();
        assert!(interp.is_running());
        let before = interp.control().executed();
        assert!(interp.run(&program).await.is_none());
        assert!(interp.is_running());
        assert_eq!(interp.control().executed(), before);

        req.complete();
        requests.recv().await.unwrap().complete();
        let summary = first.await.unwrap().unwrap();
        assert_eq!(summary.executed, 2);
        assert_eq!(actor_cell(&world), Pos::new(2, 0));
    }

    #[tokio::test]
    async fn stop_takes_effect_at_the_next_boundary() {
        let world = SharedWorld::new(world_from("size = [5, 1]\nstart = [0, 0]\n"));
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let (actor, mut requests) = ChannelActor::new();
        let interp = Arc::new(Interpreter::new(world.clone(), bus, Arc::new(actor), Arc::new(NoPause)));

        let run = tokio::spawn({
            let interp = Arc::clone(&interp);
            async move { interp.run(&Program::new(moves(3))).await }
        });

        let req = requests.recv().await.unwrap();
        interp.stop();
        req.complete(); // the in-flight animation still finishes

        let summary = run.await.unwrap().unwrap();
        assert_eq!(summary.outcome, RunOutcome::Stopped);
        assert_eq!(summary.executed, 1);
        assert_eq!(actor_cell(&world), Pos::new(1, 0));

        let events = drain(&mut rx);
        assert_eq!(names(&events), ["instruction-started", "instruction-finished", "program-finished"]);
    }

    #[tokio::test]
    async fn stopped_containers_still_close_their_highlights() {
        let world = SharedWorld::new(world_from("size = [5, 1]\nstart = [0, 0]\n"));
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let (actor, mut requests) = ChannelActor::new();
        let interp = Arc::new(Interpreter::new(world.clone(), bus, Arc::new(actor), Arc::new(NoPause)));
        let program = Program::new(vec![
            b("d", BlockKind::DefineFunc { name: "walk".into(), body: vec![b("r", BlockKind::Repeat { times: 3, body: vec![b("m", BlockKind::Move)] })] }),
            b("c", BlockKind::CallFunc { name: "walk".into() }),
            b("after", BlockKind::TurnLeft),
        ]);

        let run = tokio::spawn({
            let interp = Arc::clone(&interp);
            async move { interp.run(&program).await }
        });

        let req = requests.recv().await.unwrap();
        interp.stop();
        req.complete();
        run.await.unwrap().unwrap();

        let shown: Vec<String> = drain(&mut rx).iter().map(|e| e.to_string()).collect();
        assert_eq!(shown, [
            "instruction-started d",
            "instruction-finished d",
            "instruction-started c",
            "instruction-started r",
            "instruction-started m",
            "instruction-finished m",
            "instruction-finished r",
            "instruction-finished c",
            "program-finished executed=1",
        ]);
    }

    #[tokio::test]
    async fn platforms_advance_once_per_leaf() {
        let (interp, world, _rx) = setup(r#"
            size = [4, 2]
            start = [0, 0]
            platforms = [{ points = [{ x = 0, y = 1 }, { x = 3, y = 1 }], speed = 1 }]
        "#);
        interp.run(&Program::new(vec![b("t", BlockKind::TurnLeft)])).await.unwrap();
        let moving = world.with(|w| w.entities.iter().any(|e| matches!(e, Entity::Platform(p) if p.moving))).unwrap();
        assert!(moving);
    }
}
