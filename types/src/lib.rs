//! Fundamental types for allot.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! participant addresses, commitment hashes, escrow amounts, timestamps and the
//! protocol constants the allocation constraint system is built against.

pub mod address;
pub mod amount;
pub mod error;
pub mod hash;
pub mod params;
pub mod time;

pub use address::Address;
pub use amount::Amount;
pub use error::TypesError;
pub use hash::CommitmentHash;
pub use params::{ALLOCATION_SLOTS, BASIS_POINTS, MAX_MEMBERS, MIN_MEMBERS};
pub use time::{Clock, SystemClock, Timestamp};
