//! Epoch lifecycle phases.
//!
//! The phase is never stored. It is derived from the schedule and the current
//! clock reading on every call, plus the one persisted fact that time cannot
//! tell us: whether the coordinator has revealed the allocation totals.
//!
//! ```text
//! Scheduled --(now >= starts_at)--> Active --(now >= ends_at)--> Finished --(reveal)--> Finalized
//! ```

use allot_types::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::EpochError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpochPhase {
    /// Before `starts_at`; membership may still change.
    Scheduled,
    /// Commitments and proofs are accepted.
    Active,
    /// Window closed; waiting for the reveal.
    Finished,
    /// Totals revealed; rewards may be collected.
    Finalized,
}

impl fmt::Display for EpochPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Scheduled => "scheduled",
            Self::Active => "active",
            Self::Finished => "finished",
            Self::Finalized => "finalized",
        })
    }
}

/// The half-open active window `[starts_at, starts_at + duration_secs)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochSchedule {
    pub starts_at: Timestamp,
    pub duration_secs: u64,
}

impl EpochSchedule {
    pub fn new(starts_at: Timestamp, duration_secs: u64) -> Self {
        Self {
            starts_at,
            duration_secs,
        }
    }

    pub fn ends_at(&self) -> Timestamp {
        self.starts_at.plus(self.duration_secs)
    }

    pub fn has_started(&self, now: Timestamp) -> bool {
        now >= self.starts_at
    }

    /// A zero-length window is never active.
    pub fn is_active(&self, now: Timestamp) -> bool {
        self.has_started(now) && !self.is_finished(now)
    }

    pub fn is_finished(&self, now: Timestamp) -> bool {
        self.starts_at.has_expired(self.duration_secs, now)
    }

    pub fn phase(&self, now: Timestamp, revealed: bool) -> EpochPhase {
        if !self.has_started(now) {
            EpochPhase::Scheduled
        } else if !self.is_finished(now) {
            EpochPhase::Active
        } else if revealed {
            EpochPhase::Finalized
        } else {
            EpochPhase::Finished
        }
    }
}

/// Fail with `WrongState` unless `phase == expected`.
pub fn require_phase(
    phase: EpochPhase,
    expected: EpochPhase,
    operation: &'static str,
) -> Result<(), EpochError> {
    if phase == expected {
        Ok(())
    } else {
        Err(EpochError::WrongState { operation, phase })
    }
}
