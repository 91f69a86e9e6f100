//! Animator: the presentation side of [`ChannelActor`].
//!
//! Serves animation requests one at a time, tweening the actor's
//! continuous position in the shared world frame by frame, then signals
//! completion. The interpreter has already committed the actor's cell
//! before a motion is requested; if that cell changes mid-tween (a
//! teleport caught the actor) the tween is abandoned and completed early.
//!
//! [`ChannelActor`]: crate::sim::actor::ChannelActor

use std::f32::consts::PI;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::SpeedConfig;
use crate::domain::entity::Actor;
use crate::domain::grid::{Point, Pos};
use crate::sim::actor::{Animation, AnimationRequest};
use crate::sim::world::{SharedWorld, WorldPoisoned};

/// Frame period for tweens (~60 fps).
const FRAME: Duration = Duration::from_millis(16);

/// Peak height of the jump arc, in tiles.
const JUMP_LIFT: f32 = 0.6;

/// Horizontal amplitude of the blocked wobble, in tiles.
const SHAKE_AMPLITUDE: f32 = 0.15;

pub struct Animator {
    world: SharedWorld,
    speed: SpeedConfig,
    frame: Duration,
}

impl Animator {
    pub fn new(world: SharedWorld, speed: SpeedConfig) -> Self {
        Animator { world, speed, frame: FRAME }
    }

    pub fn with_frame(mut self, frame: Duration) -> Self {
        self.frame = frame;
        self
    }

    pub fn duration(&self, animation: &Animation) -> Duration {
        let ms = match animation {
            Animation::MoveForward { .. } => self.speed.move_ms,
            Animation::Jump { .. } => self.speed.jump_ms,
            Animation::TurnLeft { .. } | Animation::TurnRight { .. } => self.speed.turn_ms,
            Animation::Shake { .. } => self.speed.shake_ms,
        };
        Duration::from_millis(ms)
    }

    /// Serve requests until every [`ChannelActor`] handle is dropped.
    ///
    /// [`ChannelActor`]: crate::sim::actor::ChannelActor
    pub async fn serve(
        self,
        mut requests: mpsc::UnboundedReceiver<AnimationRequest>,
    ) -> Result<(), WorldPoisoned> {
        while let Some(request) = requests.recv().await {
            self.play(request.animation).await?;
            request.complete();
        }
        tracing::debug!("animator finished");
        Ok(())
    }

    pub fn spawn(
        self,
        requests: mpsc::UnboundedReceiver<AnimationRequest>,
    ) -> JoinHandle<Result<(), WorldPoisoned>> {
        tokio::spawn(self.serve(requests))
    }

    /// Tween one animation to its end.
    pub async fn play(&self, animation: Animation) -> Result<(), WorldPoisoned> {
        let total = self.duration(&animation);
        let start = Instant::now();
        tracing::trace!(?animation, ?total, "animating");

        loop {
            let t = if total.is_zero() {
                1.0
            } else {
                (start.elapsed().as_secs_f32() / total.as_secs_f32()).min(1.0)
            };
            if !self.world.with(|w| apply_frame(&mut w.actor, &animation, t))? {
                tracing::debug!(?animation, "tween abandoned");
                return Ok(());
            }
            if t >= 1.0 {
                return Ok(());
            }
            tokio::time::sleep(self.frame).await;
        }
    }
}

/// Write the actor's visual state at progress `t` in [0, 1]. Returns false
/// when the actor is no longer where this motion was heading.
fn apply_frame(actor: &mut Actor, animation: &Animation, t: f32) -> bool {
    if animation.destination().is_some_and(|to| actor.cell != to) {
        return false;
    }
    match *animation {
        Animation::MoveForward { from, to } => {
            actor.visual = from.to_point().lerp(to.to_point(), t);
        }
        Animation::Jump { from, to } => {
            actor.visual = from.to_point().lerp(to.to_point(), t);
            actor.lift = if t >= 1.0 { 0.0 } else { (t * PI).sin() * JUMP_LIFT };
        }
        Animation::Shake { at } => {
            if actor.cell != at { return false; }
            actor.visual = wobble(at, t);
        }
        Animation::TurnLeft { .. } | Animation::TurnRight { .. } => {}
    }
    true
}

fn wobble(at: Pos, t: f32) -> Point {
    let base = at.to_point();
    let offset = if t >= 1.0 { 0.0 } else { (t * 4.0 * PI).sin() * SHAKE_AMPLITUDE * (1.0 - t) };
    Point::new(base.x + offset, base.y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::grid::Facing;
    use crate::sim::actor::{ActorControl, ChannelActor};
    use crate::sim::world::tests::world_from;

    fn quick() -> SpeedConfig {
        let mut speed = crate::config::GameConfig::default().speed;
        speed.move_ms = 30;
        speed.jump_ms = 30;
        speed.turn_ms = 10;
        speed.shake_ms = 20;
        speed
    }

    #[test]
    fn frames_interpolate_and_land() {
        let mut actor = Actor::new(Pos::new(1, 0), Facing::East);
        let jump = Animation::Jump { from: Pos::new(0, 0), to: Pos::new(1, 0) };

        assert!(apply_frame(&mut actor, &jump, 0.5));
        assert!((actor.visual.x - 0.5).abs() < 1e-6);
        assert!((actor.lift - JUMP_LIFT).abs() < 1e-6);

        assert!(apply_frame(&mut actor, &jump, 1.0));
        assert_eq!(actor.visual, Pos::new(1, 0).to_point());
        assert_eq!(actor.lift, 0.0);
    }

    #[test]
    fn tween_stops_when_the_actor_was_moved_elsewhere() {
        let mut actor = Actor::new(Pos::new(5, 0), Facing::East);
        let mv = Animation::MoveForward { from: Pos::new(0, 0), to: Pos::new(1, 0) };
        assert!(!apply_frame(&mut actor, &mv, 0.5));
        assert_eq!(actor.visual, Pos::new(5, 0).to_point());
    }

    #[test]
    fn shake_settles_back_on_the_cell() {
        assert_eq!(wobble(Pos::new(2, 3), 1.0), Pos::new(2, 3).to_point());
        assert!((wobble(Pos::new(2, 3), 0.125).x - 2.0).abs() > 0.01);
    }

    #[tokio::test]
    async fn serves_channel_requests_in_order() {
        let world = SharedWorld::new(world_from("size = [3, 1]\nstart = [0, 0]\n"));
        let (actor, rx) = ChannelActor::new();
        let animator = Animator::new(world.clone(), quick()).with_frame(Duration::from_millis(2));
        let served = animator.spawn(rx);

        world.with(|w| { w.actor.cell = Pos::new(1, 0); w.actor.busy = true; }).unwrap();
        actor.move_forward(Pos::new(0, 0), Pos::new(1, 0)).await.unwrap();
        assert_eq!(world.with(|w| w.actor.visual).unwrap(), Pos::new(1, 0).to_point());

        actor.turn_left(Facing::North).await.unwrap();
        actor.shake(Pos::new(1, 0)).await.unwrap();
        assert_eq!(world.with(|w| w.actor.visual).unwrap(), Pos::new(1, 0).to_point());

        drop(actor);
        assert_eq!(served.await.unwrap(), Ok(()));
    }
}
