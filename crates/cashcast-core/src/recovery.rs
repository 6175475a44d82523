//! Bounded-retry recovery state machine
//!
//! ```text
//! Idle -> Retrying(1) -> Retrying(2) -> ... -> Recovered
//!                                          \-> Exhausted (after max_retries failures)
//! ```
//!
//! The corrective action is chosen from the error kind alone. Kinds without
//! an entry in [`RecoveryAction::for_kind`] never enter the machine.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::error::ErrorKind;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Failed corrective attempts allowed before giving up
    pub max_retries: u32,
    /// Wait before each connection reinitialization
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

/// Corrective step taken before each retry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    /// Wait out the backoff, then reinitialize the active connection in place
    Reconnect,
    /// Fetch a fresh trailing window and retrain on it
    RefetchAndRetrain,
}

impl RecoveryAction {
    /// Dispatch table from error kind to corrective action
    pub fn for_kind(kind: ErrorKind) -> Option<Self> {
        match kind {
            ErrorKind::Connectivity => Some(RecoveryAction::Reconnect),
            ErrorKind::DataProcessing => Some(RecoveryAction::RefetchAndRetrain),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryAction::Reconnect => "reconnect",
            RecoveryAction::RefetchAndRetrain => "refetch_and_retrain",
        }
    }
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RecoveryState {
    Idle,
    /// Attempt `attempt` (1-based) is running its corrective action
    Retrying { attempt: u32 },
    Recovered { attempts: u32 },
    Exhausted { attempts: u32 },
}

impl RecoveryState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RecoveryState::Recovered { .. } | RecoveryState::Exhausted { .. }
        )
    }
}

impl fmt::Display for RecoveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryState::Idle => write!(f, "idle"),
            RecoveryState::Retrying { attempt } => write!(f, "retrying({})", attempt),
            RecoveryState::Recovered { attempts } => write!(f, "recovered after {}", attempts),
            RecoveryState::Exhausted { attempts } => write!(f, "exhausted after {}", attempts),
        }
    }
}

/// Attempt counter for one `recover` invocation
#[derive(Debug, Clone)]
pub struct RetryState {
    max_retries: u32,
    attempt: u32,
    state: RecoveryState,
    transitions: Vec<RecoveryState>,
}

impl RetryState {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries: max_retries.max(1),
            attempt: 0,
            state: RecoveryState::Idle,
            transitions: vec![RecoveryState::Idle],
        }
    }

    fn transition(&mut self, next: RecoveryState) -> RecoveryState {
        self.state = next;
        self.transitions.push(next);
        next
    }

    /// Enter `Retrying(n)` for the next attempt and return `n`
    pub fn begin_attempt(&mut self) -> u32 {
        debug_assert!(!self.state.is_terminal(), "attempt after terminal state");
        self.attempt += 1;
        self.transition(RecoveryState::Retrying {
            attempt: self.attempt,
        });
        self.attempt
    }

    pub fn succeed(&mut self) -> RecoveryState {
        self.transition(RecoveryState::Recovered {
            attempts: self.attempt,
        })
    }

    /// Record a failed attempt; returns the new state
    pub fn fail(&mut self) -> RecoveryState {
        if self.attempt >= self.max_retries {
            self.transition(RecoveryState::Exhausted {
                attempts: self.attempt,
            })
        } else {
            self.state
        }
    }

    pub fn state(&self) -> RecoveryState {
        self.state
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn transitions(&self) -> &[RecoveryState] {
        &self.transitions
    }
}

/// Outcome of a successful recovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    pub action: RecoveryAction,
    pub attempts: u32,
    pub transitions: Vec<RecoveryState>,
}
