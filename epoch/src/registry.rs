//! Per-member commitments and their verification flags.

use allot_types::CommitmentHash;
use serde::{Deserialize, Serialize};

/// Index-aligned with the epoch's member list. A verified flag always refers
/// to the commitment currently stored in the same slot.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentRegistry {
    commitments: Vec<CommitmentHash>,
    verified: Vec<bool>,
}

impl CommitmentRegistry {
    pub fn new(member_count: usize) -> Self {
        Self {
            commitments: vec![CommitmentHash::ZERO; member_count],
            verified: vec![false; member_count],
        }
    }

    pub fn len(&self) -> usize {
        self.commitments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commitments.is_empty()
    }

    pub fn commitment(&self, index: usize) -> Option<CommitmentHash> {
        self.commitments.get(index).copied()
    }

    pub fn is_verified(&self, index: usize) -> bool {
        self.verified.get(index).copied().unwrap_or(false)
    }

    /// Store a new commitment and clear its verification.
    ///
    /// Returns whether the replaced commitment had been verified, or `None`
    /// if `index` is out of range.
    pub fn update(&mut self, index: usize, hash: CommitmentHash) -> Option<bool> {
        let slot = self.commitments.get_mut(index)?;
        *slot = hash;
        let flag = self.verified.get_mut(index)?;
        Some(std::mem::replace(flag, false))
    }

    pub fn mark_verified(&mut self, index: usize) -> bool {
        match self.verified.get_mut(index) {
            Some(flag) => {
                *flag = true;
                true
            }
            None => false,
        }
    }

    pub fn verified_count(&self) -> usize {
        self.verified.iter().filter(|&&v| v).count()
    }

    /// True for an empty registry; epochs always have at least two members.
    pub fn all_verified(&self) -> bool {
        self.verified.iter().all(|&v| v)
    }

    pub fn commitments(&self) -> &[CommitmentHash] {
        &self.commitments
    }

    pub fn verified(&self) -> &[bool] {
        &self.verified
    }

    /// Zero every slot and resize to `member_count`.
    pub fn reset(&mut self, member_count: usize) {
        *self = Self::new(member_count);
    }
}
