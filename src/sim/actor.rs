//! Actor control surface.
//!
//! The interpreter never animates anything itself. It asks an
//! [`ActorControl`] to play an [`Animation`] and suspends until the
//! presentation side signals completion. Headless runs plug in
//! [`InstantActor`]; the terminal front end uses a [`ChannelActor`] whose
//! requests are tweened by the UI animator, each completed through a
//! one-shot channel.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::domain::grid::{Facing, Pos};

/// One animated action, with the geometry a presenter needs to draw it.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Animation {
    MoveForward { from: Pos, to: Pos },
    Jump { from: Pos, to: Pos },
    /// `facing` is the facing after the turn.
    TurnLeft { facing: Facing },
    TurnRight { facing: Facing },
    /// Blocked reaction: wobble in place.
    Shake { at: Pos },
}

impl Animation {
    /// Cell the actor should occupy once this finishes, for motions.
    pub fn destination(&self) -> Option<Pos> {
        match self {
            Animation::MoveForward { to, .. } | Animation::Jump { to, .. } => Some(*to),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ActorError {
    #[error("presentation layer is gone")]
    PresenterClosed,
    #[error("animation was dropped before completing")]
    Cancelled,
}

/// What the interpreter may ask of the actor. Every call resolves when the
/// animation has finished; an in-flight animation is never cancelled.
#[async_trait]
pub trait ActorControl: Send + Sync {
    async fn animate(&self, animation: Animation) -> Result<(), ActorError>;

    async fn turn_left(&self, facing: Facing) -> Result<(), ActorError> {
        self.animate(Animation::TurnLeft { facing }).await
    }

    async fn turn_right(&self, facing: Facing) -> Result<(), ActorError> {
        self.animate(Animation::TurnRight { facing }).await
    }

    async fn move_forward(&self, from: Pos, to: Pos) -> Result<(), ActorError> {
        self.animate(Animation::MoveForward { from, to }).await
    }

    async fn jump(&self, from: Pos, to: Pos) -> Result<(), ActorError> {
        self.animate(Animation::Jump { from, to }).await
    }

    async fn shake(&self, at: Pos) -> Result<(), ActorError> {
        self.animate(Animation::Shake { at }).await
    }
}

/// Completes every animation immediately. Used headless and in tests.
pub struct InstantActor;

#[async_trait]
impl ActorControl for InstantActor {
    async fn animate(&self, animation: Animation) -> Result<(), ActorError> {
        tracing::trace!(?animation, "instant animation");
        Ok(())
    }
}

/// A pending animation plus the signal that resolves it.
#[derive(Debug)]
pub struct AnimationRequest {
    pub animation: Animation,
    pub done: oneshot::Sender<()>,
}

impl AnimationRequest {
    /// Signal completion. A waiter that already left is not an error.
    pub fn complete(self) {
        let _ = self.done.send(());
    }
}

/// Forwards animations to a presenter over a channel.
#[derive(Clone)]
pub struct ChannelActor {
    tx: mpsc::UnboundedSender<AnimationRequest>,
}

impl ChannelActor {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AnimationRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelActor { tx }, rx)
    }
}

#[async_trait]
impl ActorControl for ChannelActor {
    async fn animate(&self, animation: Animation) -> Result<(), ActorError> {
        let (done, wait) = oneshot::channel();
        self.tx
            .send(AnimationRequest { animation, done })
            .map_err(|_| ActorError::PresenterClosed)?;
        wait.await.map_err(|_| ActorError::Cancelled)
    }
}
