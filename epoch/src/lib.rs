//! Epoch protocol core.
//!
//! An epoch is one bounded round in which members commit to hidden
//! allocations of a pooled reward, a coordinator gets each commitment
//! proof-verified, reveals the aggregate totals once the window closes, and
//! members then collect their share from escrow exactly once.
//!
//! - [`lifecycle`]: phases derived from the clock, never stored
//! - [`registry`]: commitments and verified flags
//! - [`escrow`]: deposit, per-unit rate, revealed totals, withdrawals
//! - [`epoch`]: the aggregate tying them together
//! - [`store`]: one epoch per admin, serialized per epoch

pub mod epoch;
pub mod error;
pub mod escrow;
pub mod lifecycle;
pub mod registry;
pub mod store;

pub use epoch::{Epoch, EpochParams, EpochView, Withdrawal};
pub use error::{EpochError, ErrorKind, PublicInputField, TransferError};
pub use escrow::{EscrowLedger, EscrowTransfer, PendingPayout};
pub use lifecycle::{EpochPhase, EpochSchedule};
pub use registry::CommitmentRegistry;
pub use store::EpochStore;
