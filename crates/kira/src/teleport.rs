//! Smooth client-side teleport.
//!
//! A jump is split into equal steps no longer than the configured step
//! length, up to [`MAX_STEPS`]; farther jumps use longer steps. Each step
//! is pushed to the client as a movement message on a fixed interval,
//! then one last message lands exactly on the target so rounding in the
//! step arithmetic never leaves the player short.
//!
//! ```text
//! from ──step──step──step── … ──step──▶ target (exact)
//!        20ms  20ms  20ms
//! ```

use std::time::Duration;

use kira_protocol::{EntityRuntimeId, Message, MovePlayer, Vec3};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::{Endpoint, KiraError};

/// Most steps one teleport takes, whatever the distance.
pub const MAX_STEPS: usize = 10_000;

/// The positions one teleport will visit.
#[derive(Debug, Clone, PartialEq)]
pub struct TeleportPlan {
    from: Vec3,
    target: Vec3,
    steps: usize,
    delta: Vec3,
}

impl TeleportPlan {
    /// Plans a move from `from` to `target` in steps of at most `max_step`
    /// blocks. There is always at least one step and never more than
    /// [`MAX_STEPS`].
    pub fn new(from: Vec3, target: Vec3, max_step: f32) -> Self {
        let distance = from.distance(target);
        let steps = if max_step > 0.0 && distance.is_finite() {
            ((distance / max_step).floor() as usize).clamp(1, MAX_STEPS)
        } else {
            1
        };
        Self {
            from,
            target,
            steps,
            delta: (target - from) / steps as f32,
        }
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    /// Intermediate positions, one per step, excluding the final exact move.
    pub fn waypoints(&self) -> impl Iterator<Item = Vec3> + '_ {
        (1..=self.steps).scan(self.from, |position, _| {
            *position = *position + self.delta;
            Some(*position)
        })
    }
}

/// Paces teleport steps. Stops early when `cancel` fires.
pub struct Stepper<'a> {
    interval: Duration,
    cancel: &'a CancellationToken,
}

impl<'a> Stepper<'a> {
    pub fn new(interval: Duration, cancel: &'a CancellationToken) -> Self {
        Self { interval, cancel }
    }

    /// Walks `entity` along `plan` on `client`.
    ///
    /// Returns [`KiraError::Cancelled`] if the session is torn down part
    /// way; a failed write is returned as-is.
    pub async fn run<E: Endpoint>(
        &self,
        plan: &TeleportPlan,
        entity: EntityRuntimeId,
        client: &E,
    ) -> Result<(), KiraError> {
        let mut ticker = time::interval_at(time::Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        for (step, position) in plan.waypoints().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(KiraError::Cancelled);
            }
            trace!(step, %position, "teleport step");
            self.write(client, MovePlayer::to(entity, position)).await?;

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!(step, "teleport cancelled");
                    return Err(KiraError::Cancelled);
                }
                _ = ticker.tick() => {}
            }
        }

        self.write(client, MovePlayer::to(entity, plan.target())).await
    }

    async fn write<E: Endpoint>(&self, client: &E, movement: MovePlayer) -> Result<(), KiraError> {
        let message = Message::MovePlayer(movement);
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(KiraError::Cancelled),
            written = client.write_message(&message) => written,
        }
    }
}
