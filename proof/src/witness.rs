//! The allocation constraint system, evaluated directly on a private witness.
//!
//! A witness is satisfiable for `(commitment, member_index, member_count)` iff:
//!
//! 1. `hash(salt, allocations) == commitment`
//! 2. every slot is non-negative
//! 3. the allocating member's own slot is zero
//! 4. every slot at or beyond `member_count` is zero
//! 5. the slots sum to exactly [`BASIS_POINTS`]
//! 6. `0 <= member_index < member_count`
//!
//! Provers refuse to emit a proof for anything else, so a verified proof
//! certifies all six.

use allot_crypto::commitment_hash;
use allot_types::{CommitmentHash, ALLOCATION_SLOTS, BASIS_POINTS, MAX_MEMBERS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::encoding::hex_array32;
use crate::error::ProofError;

/// The first constraint a witness fails.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConstraintViolation {
    #[error("member count {count} outside 1..={max}")]
    MemberCountOutOfRange { count: u32, max: usize },

    #[error("allocating member index {index} not below member count {count}")]
    MemberIndexOutOfRange { index: u32, count: u32 },

    #[error("salt and allocations do not hash to the public commitment")]
    CommitmentMismatch,

    #[error("slot {slot} holds a negative allocation")]
    NegativeAllocation { slot: usize },

    #[error("member allocates to itself")]
    SelfAllocation,

    #[error("slot {slot} allocates to a member that does not exist")]
    AllocationBeyondMembers { slot: usize },

    #[error("allocations total {total} basis points, expected {expected}")]
    WrongTotal { total: i128, expected: u64 },
}

/// A member's private allocation vector and salt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationWitness {
    #[serde(with = "hex_array32")]
    pub salt: [u8; 32],
    pub allocations: [i64; ALLOCATION_SLOTS],
}

impl AllocationWitness {
    pub fn new(salt: [u8; 32], allocations: [i64; ALLOCATION_SLOTS]) -> Self {
        Self { salt, allocations }
    }

    /// Build from a short allocation list, zero-padding the remaining slots.
    pub fn from_slice(salt: [u8; 32], allocations: &[i64]) -> Result<Self, ProofError> {
        if allocations.len() > ALLOCATION_SLOTS {
            return Err(ProofError::TooManySlots {
                got: allocations.len(),
                max: ALLOCATION_SLOTS,
            });
        }
        let mut slots = [0i64; ALLOCATION_SLOTS];
        slots[..allocations.len()].copy_from_slice(allocations);
        Ok(Self::new(salt, slots))
    }

    pub fn commitment(&self) -> CommitmentHash {
        commitment_hash(&self.salt, &self.allocations)
    }

    /// Sum of all slots, wide enough that no input can overflow it.
    pub fn total(&self) -> i128 {
        self.allocations.iter().map(|&a| a as i128).sum()
    }

    pub fn check(
        &self,
        member_index: u32,
        member_count: u32,
        commitment: &CommitmentHash,
    ) -> Result<(), ConstraintViolation> {
        if member_count == 0 || member_count as usize > MAX_MEMBERS {
            return Err(ConstraintViolation::MemberCountOutOfRange {
                count: member_count,
                max: MAX_MEMBERS,
            });
        }
        if member_index >= member_count {
            return Err(ConstraintViolation::MemberIndexOutOfRange {
                index: member_index,
                count: member_count,
            });
        }
        if self.commitment() != *commitment {
            return Err(ConstraintViolation::CommitmentMismatch);
        }
        if let Some(slot) = self.allocations.iter().position(|&a| a < 0) {
            return Err(ConstraintViolation::NegativeAllocation { slot });
        }
        if self.allocations[member_index as usize] != 0 {
            return Err(ConstraintViolation::SelfAllocation);
        }
        if let Some(offset) = self.allocations[member_count as usize..]
            .iter()
            .position(|&a| a != 0)
        {
            return Err(ConstraintViolation::AllocationBeyondMembers {
                slot: member_count as usize + offset,
            });
        }
        let total = self.total();
        if total != BASIS_POINTS as i128 {
            return Err(ConstraintViolation::WrongTotal {
                total,
                expected: BASIS_POINTS,
            });
        }
        Ok(())
    }
}
