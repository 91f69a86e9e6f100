/// Events emitted by the interpreter and the simulation.
/// Presentation, audio and any persistence layer subscribe through the
/// [`EventBus`]; the core never queries them back.

use tokio::sync::broadcast;

use crate::domain::entity::EntityKind;
use crate::domain::grid::Pos;
use crate::domain::program::BlockId;

#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    // ── Interpreter ──
    InstructionStarted { id: BlockId },
    InstructionFinished { id: BlockId },
    ProgramFinished { executed: u64 },
    ProgramError { message: String },
    Blocked { at: Pos },

    // ── Interactions ──
    Collect { at: Pos, collected: u32 },
    Trigger { gate_id: u32, at: Pos },
    Teleport { from: Pos, to: Pos },
    GameOver { cause: EntityKind, at: Pos },
    LevelComplete { stars: u8, executed: u64 },

    // ── Simulation tick ──
    GateChanged { gate_id: u32, at: Pos, open: bool },
    SwitchReleased { gate_id: u32, at: Pos },
}

impl GameEvent {
    /// Wire name, as external collaborators know it.
    pub fn name(&self) -> &'static str {
        match self {
            GameEvent::InstructionStarted { .. } => "instruction-started",
            GameEvent::InstructionFinished { .. } => "instruction-finished",
            GameEvent::ProgramFinished { .. } => "program-finished",
            GameEvent::ProgramError { .. } => "program-error",
            GameEvent::Blocked { .. } => "blocked",
            GameEvent::Collect { .. } => "collect",
            GameEvent::Trigger { .. } => "trigger",
            GameEvent::Teleport { .. } => "teleport",
            GameEvent::GameOver { .. } => "game-over",
            GameEvent::LevelComplete { .. } => "level-complete",
            GameEvent::GateChanged { .. } => "gate-changed",
            GameEvent::SwitchReleased { .. } => "switch-released",
        }
    }
}

impl std::fmt::Display for GameEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = self.name();
        match self {
            GameEvent::InstructionStarted { id } | GameEvent::InstructionFinished { id } => {
                write!(f, "{name} {id}")
            }
            GameEvent::ProgramFinished { executed } => write!(f, "{name} executed={executed}"),
            GameEvent::ProgramError { message } => write!(f, "{name}: {message}"),
            GameEvent::Blocked { at } => write!(f, "{name} at {at}"),
            GameEvent::Collect { at, collected } => write!(f, "{name} at {at} (total {collected})"),
            GameEvent::Trigger { gate_id, at } => write!(f, "{name} gate {gate_id} at {at}"),
            GameEvent::Teleport { from, to } => write!(f, "{name} {from} -> {to}"),
            GameEvent::GameOver { cause, at } => write!(f, "{name}: {cause} at {at}"),
            GameEvent::LevelComplete { stars, executed } => {
                write!(f, "{name}: {stars} star(s), {executed} instructions")
            }
            GameEvent::GateChanged { gate_id, at, open } => {
                let state = if *open { "open" } else { "closed" };
                write!(f, "{name} gate {gate_id} at {at} {state}")
            }
            GameEvent::SwitchReleased { gate_id, at } => write!(f, "{name} gate {gate_id} at {at}"),
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Event bus
// ══════════════════════════════════════════════════════════════

/// Broadcast fan-out of [`GameEvent`]s. Cloning shares the channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<GameEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        EventBus { tx }
    }

    /// Best-effort: with no subscribers the event is dropped.
    pub fn publish(&self, event: GameEvent) {
        tracing::trace!(event = event.name(), "publish");
        if self.tx.send(event).is_err() {
            tracing::trace!("no event subscribers");
        }
    }

    pub fn publish_all(&self, events: impl IntoIterator<Item = GameEvent>) {
        for event in events {
            self.publish(event);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Drain whatever a receiver has buffered without waiting.
pub fn drain(rx: &mut broadcast::Receiver<GameEvent>) -> Vec<GameEvent> {
    let mut out = vec![];
    loop {
        match rx.try_recv() {
            Ok(event) => out.push(event),
            Err(broadcast::error::TryRecvError::Lagged(n)) => {
                tracing::warn!(skipped = n, "event receiver lagged");
            }
            Err(_) => break,
        }
    }
    out
}
