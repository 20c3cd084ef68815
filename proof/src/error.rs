//! Proof-layer errors.

use thiserror::Error;

use crate::witness::ConstraintViolation;

/// Error during proof generation.
#[derive(Debug, Error)]
pub enum ProofError {
    /// The witness violates the allocation constraint system; no proof exists.
    #[error("unsatisfiable witness: {0}")]
    Unsatisfiable(#[from] ConstraintViolation),

    #[error("allocation vector has {got} slots, at most {max} allowed")]
    TooManySlots { got: usize, max: usize },
}

/// Error during proof verification (distinct from a clean "invalid" verdict).
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("malformed proof: {0}")]
    Malformed(String),
}

/// Error decoding the public-input word vector.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PublicInputError {
    #[error("expected {expected} public input words, got {got}")]
    WrongLength { expected: usize, got: usize },

    #[error("validity word must be 0 or 1")]
    NonBooleanValidity,

    #[error("public input word {position} does not fit in 32 bits")]
    WordOverflow { position: usize },
}
