//! Session: one level being played.
//!
//! Wires the shared world, the event bus, the interpreter and the
//! simulation tick task together. Loading or resetting stops any run and
//! rebuilds the world wholesale from its blueprint.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::GameConfig;
use crate::domain::program::Program;
use crate::sim::actor::ActorControl;
use crate::sim::event::{EventBus, GameEvent};
use crate::sim::interpreter::{Interpreter, Pacer, RunSummary, SleepPacer};
use crate::sim::level::{LevelDef, LevelError};
use crate::sim::step::step;
use crate::sim::world::{SharedWorld, Timing, World, WorldPoisoned};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Level(#[from] LevelError),
    #[error(transparent)]
    World(#[from] WorldPoisoned),
}

pub struct Session {
    config: GameConfig,
    timing: Timing,
    world: SharedWorld,
    events: EventBus,
    interpreter: Arc<Interpreter>,
    ticker: Option<JoinHandle<()>>,
}

impl Session {
    /// A session paced by the configured real-time delays.
    pub fn new(
        level: LevelDef,
        config: &GameConfig,
        actor: Arc<dyn ActorControl>,
    ) -> Result<Self, SessionError> {
        let pacer = Arc::new(SleepPacer::from_config(&config.speed));
        Self::with_pacer(level, config, actor, pacer)
    }

    pub fn with_pacer(
        level: LevelDef,
        config: &GameConfig,
        actor: Arc<dyn ActorControl>,
        pacer: Arc<dyn Pacer>,
    ) -> Result<Self, SessionError> {
        let timing = Timing::from_config(config);
        tracing::info!(level = %level.name, "level loaded");
        let world = SharedWorld::new(World::from_level(level, timing.clone())?);
        let events = EventBus::new();
        let interpreter = Interpreter::new(world.clone(), events.clone(), actor, pacer)
            .with_max_call_depth(config.rules.max_call_depth);

        Ok(Session {
            config: config.clone(),
            timing,
            world,
            events,
            interpreter: Arc::new(interpreter),
            ticker: None,
        })
    }

    /// Spawn the simulation tick task. Idempotent.
    pub fn start_ticking(&mut self) {
        if self.ticker.is_some() {
            return;
        }
        let world = self.world.clone();
        let events = self.events.clone();
        let interpreter = Arc::clone(&self.interpreter);
        let period = self.config.speed.tick();

        self.ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let executed = interpreter.control().executed();
                match world.with(|w| step(w, executed)) {
                    Ok(tick_events) => {
                        if tick_events.iter().any(|e| matches!(e, GameEvent::GameOver { .. })) {
                            interpreter.stop();
                        }
                        events.publish_all(tick_events);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "tick task stopping");
                        break;
                    }
                }
            }
        }));
        tracing::debug!(?period, "tick task started");
    }

    /// Advance the simulation by one tick by hand (no tick task needed).
    pub fn tick(&self) -> Result<Vec<GameEvent>, SessionError> {
        let executed = self.interpreter.control().executed();
        let tick_events = self.world.with(|w| step(w, executed))?;
        if tick_events.iter().any(|e| matches!(e, GameEvent::GameOver { .. })) {
            self.interpreter.stop();
        }
        self.events.publish_all(tick_events.clone());
        Ok(tick_events)
    }

    /// Run a program to completion on the current task.
    pub async fn run(&self, program: &Program) -> Option<RunSummary> {
        self.interpreter.run(program).await
    }

    /// Run a program in the background.
    pub fn spawn_run(&self, program: Program) -> JoinHandle<Option<RunSummary>> {
        let interpreter = Arc::clone(&self.interpreter);
        tokio::spawn(async move { interpreter.run(&program).await })
    }

    pub fn stop(&self) {
        self.interpreter.stop();
    }

    /// Stop any run and rebuild the world from the current blueprint.
    pub fn reset(&self) -> Result<(), SessionError> {
        self.stop();
        self.world.with(|w| w.reset())?;
        tracing::info!("level reset");
        Ok(())
    }

    /// Stop any run and replace the level.
    pub fn load(&self, level: LevelDef) -> Result<(), SessionError> {
        self.stop();
        let name = level.name.clone();
        let world = World::from_level(level, self.timing.clone())?;
        self.world.replace(world)?;
        tracing::info!(level = %name, "level loaded");
        Ok(())
    }

    pub fn world(&self) -> &SharedWorld {
        &self.world
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<GameEvent> {
        self.events.subscribe()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}
