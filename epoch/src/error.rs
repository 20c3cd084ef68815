//! Epoch errors and their caller-facing classification.

use allot_types::{Address, Amount, Timestamp};
use thiserror::Error;

use crate::lifecycle::EpochPhase;

/// Broad class of an [`EpochError`]. None of them is retried internally.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// No epoch exists for the admin.
    NotFound,
    /// Wrong lifecycle phase; the caller must wait for the clock.
    State,
    /// Caller is not the admin, coordinator or member required.
    Authorization,
    /// Malformed input; the caller must correct it.
    Validation,
    /// The proof did not verify; the member needs a new commitment/proof.
    ProofRejected,
    /// Reward already collected. Reports "already done".
    DoubleSpend,
    /// Escrow could not pay out; no state changed.
    Escrow,
    Internal,
}

/// Which public input disagreed with stored epoch state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublicInputField {
    Hash,
    Index,
    Count,
}

impl std::fmt::Display for PublicInputField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Hash => "commitment hash",
            Self::Index => "allocating member index",
            Self::Count => "member count",
        })
    }
}

/// Failure to move funds out of escrow.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("recipient rejected transfer: {0}")]
    Rejected(String),

    #[error("transfer backend unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum EpochError {
    #[error("no epoch scheduled by admin {0}")]
    EpochNotFound(Address),

    #[error("must escrow a non-zero amount to allocate during the epoch")]
    InvalidFunding,

    #[error("epoch needs between {min} and {max} members, got {count}")]
    InvalidMemberCount { count: usize, min: usize, max: usize },

    #[error("epoch must start in the future: starts at {starts_at}, now {now}")]
    PastStart { starts_at: Timestamp, now: Timestamp },

    #[error("epoch must have a coordinator")]
    MissingCoordinator,

    #[error("member {0} listed more than once")]
    DuplicateMember(Address),

    #[error("coordinator {0} cannot also be a member")]
    CoordinatorIsMember(Address),

    #[error("{operation} not allowed while epoch is {phase}")]
    WrongState {
        operation: &'static str,
        phase: EpochPhase,
    },

    #[error("{0} is not the epoch coordinator")]
    NotCoordinator(Address),

    #[error("{0} is not a member of this epoch")]
    NotMember(Address),

    #[error("{0} public input does not match epoch state")]
    BadPublicInput(PublicInputField),

    #[error("proof rejected: {0}")]
    ProofInvalid(String),

    #[error("all commitments must be verified: {verified} of {total}")]
    NotAllVerified { verified: usize, total: usize },

    #[error("revealed allocations must cover every member: expected {expected}, got {got}")]
    RevealLengthMismatch { expected: usize, got: usize },

    #[error("reward for {0} has already been withdrawn")]
    AlreadyWithdrawn(Address),

    #[error("insufficient escrow: need {needed}, have {available}")]
    InsufficientEscrow { needed: Amount, available: Amount },

    #[error("payout for {units} units overflows")]
    PayoutOverflow { units: u128 },

    #[error("escrow transfer failed: {0}")]
    Transfer(#[from] TransferError),

    #[error("epoch state lock poisoned")]
    Poisoned,
}

impl EpochError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EpochNotFound(_) => ErrorKind::NotFound,
            Self::WrongState { .. } | Self::NotAllVerified { .. } => ErrorKind::State,
            Self::NotCoordinator(_) | Self::NotMember(_) => ErrorKind::Authorization,
            Self::InvalidFunding
            | Self::InvalidMemberCount { .. }
            | Self::PastStart { .. }
            | Self::MissingCoordinator
            | Self::DuplicateMember(_)
            | Self::CoordinatorIsMember(_)
            | Self::BadPublicInput(_)
            | Self::RevealLengthMismatch { .. } => ErrorKind::Validation,
            Self::ProofInvalid(_) => ErrorKind::ProofRejected,
            Self::AlreadyWithdrawn(_) => ErrorKind::DoubleSpend,
            Self::InsufficientEscrow { .. } | Self::PayoutOverflow { .. } | Self::Transfer(_) => {
                ErrorKind::Escrow
            }
            Self::Poisoned => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EpochNotFound(_) => "epoch_not_found",
            Self::InvalidFunding => "invalid_funding",
            Self::InvalidMemberCount { .. } => "invalid_member_count",
            Self::PastStart { .. } => "past_start",
            Self::MissingCoordinator => "missing_coordinator",
            Self::DuplicateMember(_) => "duplicate_member",
            Self::CoordinatorIsMember(_) => "coordinator_is_member",
            Self::WrongState { .. } => "wrong_state",
            Self::NotCoordinator(_) => "not_coordinator",
            Self::NotMember(_) => "not_member",
            Self::BadPublicInput(PublicInputField::Hash) => "bad_public_input_hash",
            Self::BadPublicInput(PublicInputField::Index) => "bad_public_input_index",
            Self::BadPublicInput(PublicInputField::Count) => "bad_public_input_count",
            Self::ProofInvalid(_) => "proof_invalid",
            Self::NotAllVerified { .. } => "not_all_verified",
            Self::RevealLengthMismatch { .. } => "reveal_length_mismatch",
            Self::AlreadyWithdrawn(_) => "already_withdrawn",
            Self::InsufficientEscrow { .. } => "insufficient_escrow",
            Self::PayoutOverflow { .. } => "payout_overflow",
            Self::Transfer(_) => "transfer_failed",
            Self::Poisoned => "poisoned",
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for EpochError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Self::Poisoned
    }
}
