//! Cryptographic primitives for allot.
//!
//! - **Blake2b-256** for allocation commitments and proof tags
//! - Commitment layout: domain tag, salt, fifteen big-endian `i64` slots

pub mod hash;

pub use hash::{blake2b_256, blake2b_256_multi, commitment_hash};
