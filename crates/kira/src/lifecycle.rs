//! Session lifecycle: phase tracking and one-shot teardown.

use std::future::Future;
use std::sync::OnceLock;

use kira_session::SessionPhase;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::KiraError;

/// Shared by every task of one session.
///
/// The phase only moves forward along [`SessionPhase::can_transition_to`].
/// [`teardown`](Self::teardown) may be called from any task, any number of
/// times; the first call records the reason and wakes everything waiting
/// on [`cancelled`](Self::cancelled).
#[derive(Debug)]
pub struct Lifecycle {
    phase: watch::Sender<SessionPhase>,
    cancel: CancellationToken,
    reason: OnceLock<String>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (phase, _) = watch::channel(SessionPhase::Connecting);
        Self {
            phase,
            cancel: CancellationToken::new(),
            reason: OnceLock::new(),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase.borrow()
    }

    /// Observes phase changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionPhase> {
        self.phase.subscribe()
    }

    /// Moves to `to` if that is a legal transition. Returns whether it moved.
    pub fn advance(&self, to: SessionPhase) -> bool {
        self.phase.send_if_modified(|phase| {
            if phase.can_transition_to(to) {
                tracing::trace!(from = %phase, %to, "session phase change");
                *phase = to;
                true
            } else {
                false
            }
        })
    }

    /// Starts shutting the session down. Returns `true` for the call that
    /// actually began the teardown.
    pub fn teardown(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        let first = self.reason.set(reason).is_ok();
        self.advance(SessionPhase::Closing);
        self.cancel.cancel();
        if first {
            tracing::debug!(reason = self.reason().unwrap_or_default(), "session teardown");
        }
        first
    }

    /// Why the session is going down, once teardown has begun.
    pub fn reason(&self) -> Option<&str> {
        self.reason.get().map(String::as_str)
    }

    /// Resolves once teardown has begun.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Runs `work` unless teardown begins first, in which case `work` is
    /// dropped and [`KiraError::Cancelled`] is returned.
    pub async fn until_teardown<T>(
        &self,
        work: impl Future<Output = Result<T, KiraError>>,
    ) -> Result<T, KiraError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(KiraError::Cancelled),
            done = work => done,
        }
    }

    /// A token that is cancelled together with this session.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
