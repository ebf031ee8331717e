//! Pipeline state machine
//!
//! Linear machine with a single failure edge:
//! - Start → Refining → Retrieving → Aggregating → Assembling → Done
//! - Any non-terminal state → Error (on: Fail)
//! - Done and Error are terminal and self-loop

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use crate::errors::{PipelineError, Result};

/// Pipeline execution states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineState {
    /// Query received, not yet validated
    Start,

    /// Generative model is rewriting the query
    Refining,

    /// Vector store is being queried
    Retrieving,

    /// Per-query hits are being merged and ranked
    Aggregating,

    /// Final prompt is being rendered
    Assembling,

    /// Prompt produced (terminal)
    Done,

    /// Fatal error (terminal)
    Error,
}

/// Events that trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineEvent {
    QueryAccepted,
    Refined,
    Retrieved,
    Aggregated,
    Assembled,
    Fail,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Error)
    }

    /// Attempt state transition with validation
    pub fn transition(&self, event: PipelineEvent) -> Result<PipelineState> {
        use PipelineEvent::*;
        use PipelineState::*;

        let next = match (self, event) {
            (Done, _) => Done,
            (Error, _) => Error,

            (_, Fail) => Error,

            (Start, QueryAccepted) => Refining,
            (Refining, Refined) => Retrieving,
            (Retrieving, Retrieved) => Aggregating,
            (Aggregating, Aggregated) => Assembling,
            (Assembling, Assembled) => Done,

            (from, event) => {
                return Err(PipelineError::InvalidTransition {
                    from: format!("{:?}", from),
                    event: format!("{:?}", event),
                });
            }
        };

        Ok(next)
    }

    /// Human-readable state name
    pub fn display_name(&self) -> &'static str {
        match self {
            PipelineState::Start => "starting",
            PipelineState::Refining => "refining query",
            PipelineState::Retrieving => "retrieving documents",
            PipelineState::Aggregating => "ranking results",
            PipelineState::Assembling => "assembling prompt",
            PipelineState::Done => "done",
            PipelineState::Error => "failed",
        }
    }
}

/// Current state plus the states visited so far
#[derive(Debug, Clone)]
pub struct StateTracker {
    state: PipelineState,
    trace: Vec<PipelineState>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self {
            state: PipelineState::Start,
            trace: vec![PipelineState::Start],
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn trace(&self) -> &[PipelineState] {
        &self.trace
    }

    /// Apply an event and record the new state
    pub fn advance(&mut self, event: PipelineEvent) -> Result<PipelineState> {
        let next = self.state.transition(event)?;
        if next != self.state {
            tracing::debug!("[STATE] {:?} -> {:?}", self.state, next);
            self.trace.push(next);
        }
        self.state = next;
        Ok(next)
    }

    /// Move to Error from wherever we are
    pub fn fail(&mut self) {
        // Fail is valid from every state
        let _ = self.advance(PipelineEvent::Fail);
    }
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
struct CancelInner {
    flag: AtomicBool,
    notify: Notify,
}

/// Cancellation flag, checked on entering each working state and raced
/// against in-flight collaborator calls
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<CancelInner>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.flag.store(true, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.flag.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel` has been called
    pub async fn cancelled(&self) {
        // Register before checking the flag so a concurrent cancel is not missed
        let notified = self.0.notify.notified();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }

    /// Run `work`, abandoning it if cancellation arrives first
    pub async fn guard<T, F>(&self, state: PipelineState, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            out = work => out,
            _ = self.cancelled() => Err(PipelineError::Cancelled {
                state: state.display_name().to_string(),
            }),
        }
    }

    /// Err(Cancelled) if cancellation was requested
    pub fn check(&self, state: PipelineState) -> Result<()> {
        if self.is_cancelled() {
            return Err(PipelineError::Cancelled {
                state: state.display_name().to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut tracker = StateTracker::new();
        for event in [
            PipelineEvent::QueryAccepted,
            PipelineEvent::Refined,
            PipelineEvent::Retrieved,
            PipelineEvent::Aggregated,
            PipelineEvent::Assembled,
        ] {
            tracker.advance(event).unwrap();
        }
        assert_eq!(tracker.state(), PipelineState::Done);
        assert_eq!(
            tracker.trace(),
            [
                PipelineState::Start,
                PipelineState::Refining,
                PipelineState::Retrieving,
                PipelineState::Aggregating,
                PipelineState::Assembling,
                PipelineState::Done,
            ]
        );
    }

    #[test]
    fn test_fail_from_any_working_state() {
        for state in [
            PipelineState::Start,
            PipelineState::Refining,
            PipelineState::Retrieving,
            PipelineState::Aggregating,
            PipelineState::Assembling,
        ] {
            assert_eq!(state.transition(PipelineEvent::Fail).unwrap(), PipelineState::Error);
        }
    }

    #[test]
    fn test_terminal_states_self_loop() {
        assert!(PipelineState::Done.is_terminal());
        assert!(PipelineState::Error.is_terminal());
        assert_eq!(
            PipelineState::Done.transition(PipelineEvent::Fail).unwrap(),
            PipelineState::Done
        );
        assert_eq!(
            PipelineState::Error.transition(PipelineEvent::Refined).unwrap(),
            PipelineState::Error
        );
    }

    #[test]
    fn test_skipping_a_state_is_invalid() {
        let err = PipelineState::Start.transition(PipelineEvent::Retrieved).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidTransition { .. }));
        assert!(PipelineState::Refining.transition(PipelineEvent::Assembled).is_err());
    }

    #[test]
    fn test_cancel_flag() {
        let flag = CancelFlag::new();
        assert!(flag.check(PipelineState::Refining).is_ok());

        flag.clone().cancel();
        let err = flag.check(PipelineState::Retrieving).unwrap_err();
        assert_eq!(err.kind(), "Cancelled");
        assert!(err.to_string().contains("retrieving"));
    }

    #[tokio::test]
    async fn test_guard_abandons_hung_work() {
        let flag = CancelFlag::new();
        let trigger = flag.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let hung = std::future::pending::<Result<()>>();
        let outcome = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            flag.guard(PipelineState::Refining, hung),
        )
        .await
        .expect("guard should return once cancelled");

        let err = outcome.unwrap_err();
        assert_eq!(err.kind(), "Cancelled");
        assert!(err.to_string().contains("refining"));
    }

    #[tokio::test]
    async fn test_guard_passes_through_finished_work() {
        let flag = CancelFlag::new();
        let value = flag.guard(PipelineState::Retrieving, async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_cancelled_resolves_when_already_set() {
        let flag = CancelFlag::new();
        flag.cancel();
        flag.cancelled().await;
    }
}
