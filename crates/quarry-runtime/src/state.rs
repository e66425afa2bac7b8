//! Observable loop state.
//!
//! ```text
//! Idle ─start()─▶ Starting ─▶ Running(phase) ─stop()─▶ Stopping ─▶ Idle
//!                                  │
//!                                  └─ emergency ─▶ EmergencyStopped
//! ```

use std::fmt;

use serde::Serialize;
use tokio::sync::watch;

/// What a running loop is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Scanning,
    Selecting,
    Navigating,
    HazardChecking,
    Extracting,
    Collecting,
    Depositing,
    Expanding,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LoopState {
    Idle,
    Starting,
    Running(Phase),
    Stopping,
    EmergencyStopped { reason: String },
}

impl LoopState {
    /// `true` once no loop task is scheduled.
    pub fn is_halted(&self) -> bool {
        matches!(self, LoopState::Idle | LoopState::EmergencyStopped { .. })
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Scanning => "scanning",
            Phase::Selecting => "selecting",
            Phase::Navigating => "navigating",
            Phase::HazardChecking => "hazard-checking",
            Phase::Extracting => "extracting",
            Phase::Collecting => "collecting",
            Phase::Depositing => "depositing",
            Phase::Expanding => "expanding",
        };
        f.write_str(s)
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopState::Idle => f.write_str("idle"),
            LoopState::Starting => f.write_str("starting"),
            LoopState::Running(phase) => write!(f, "running ({phase})"),
            LoopState::Stopping => f.write_str("stopping"),
            LoopState::EmergencyStopped { reason } => write!(f, "emergency-stopped: {reason}"),
        }
    }
}

/// Shared, watchable [`LoopState`].
#[derive(Clone)]
pub struct StateCell {
    tx: watch::Sender<LoopState>,
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

impl StateCell {
    pub fn new() -> Self {
        Self {
            tx: watch::Sender::new(LoopState::Idle),
        }
    }

    pub fn get(&self) -> LoopState {
        self.tx.borrow().clone()
    }

    pub fn set(&self, state: LoopState) {
        self.tx.send_replace(state);
    }

    /// Move to `Running(phase)`, but only from `Starting` or `Running`.
    ///
    /// A worker that has not yet noticed a stop can never overwrite
    /// `Stopping` or `EmergencyStopped`.
    pub fn enter(&self, phase: Phase) {
        self.tx.send_if_modified(|state| match state {
            LoopState::Starting | LoopState::Running(_) => {
                let changed = *state != LoopState::Running(phase);
                *state = LoopState::Running(phase);
                changed
            }
            _ => false,
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<LoopState> {
        self.tx.subscribe()
    }

    /// Resolve once the state is [`halted`][LoopState::is_halted].
    pub async fn halted(&self) -> LoopState {
        let mut rx = self.tx.subscribe();
        match rx.wait_for(LoopState::is_halted).await {
            Ok(state) => state.clone(),
            Err(_) => self.get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enter_only_moves_a_live_loop() {
        let cell = StateCell::new();
        cell.enter(Phase::Scanning);
        assert_eq!(cell.get(), LoopState::Idle);

        cell.set(LoopState::Starting);
        cell.enter(Phase::Scanning);
        assert_eq!(cell.get(), LoopState::Running(Phase::Scanning));

        cell.set(LoopState::Stopping);
        cell.enter(Phase::Extracting);
        assert_eq!(cell.get(), LoopState::Stopping);
    }

    #[test]
    fn display() {
        assert_eq!(
            LoopState::Running(Phase::HazardChecking).to_string(),
            "running (hazard-checking)"
        );
        assert_eq!(
            LoopState::EmergencyStopped {
                reason: "agent died".into()
            }
            .to_string(),
            "emergency-stopped: agent died"
        );
    }

    #[tokio::test]
    async fn halted_waits_for_idle() {
        let cell = StateCell::new();
        cell.set(LoopState::Stopping);
        let waiter = {
            let cell = cell.clone();
            tokio::spawn(async move { cell.halted().await })
        };
        tokio::task::yield_now().await;
        cell.set(LoopState::Idle);
        assert_eq!(waiter.await.unwrap(), LoopState::Idle);
    }
}
