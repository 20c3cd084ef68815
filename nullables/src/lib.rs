//! Nullable infrastructure for deterministic testing.
//!
//! Every collaborator the epoch core talks to (clock, proof verifier, escrow
//! transfer) is a trait. This crate provides implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Record what was asked of them
//!
//! Usage: swap real implementations for nullables in tests and simulations.

pub mod clock;
pub mod transfer;
pub mod verifier;

pub use clock::NullClock;
pub use transfer::NullTransfer;
pub use verifier::NullVerifier;
