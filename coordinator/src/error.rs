use allot_epoch::EpochError;
use allot_proof::ProofError;
use allot_types::Address;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("epoch error: {0}")]
    Epoch(#[from] EpochError),

    #[error("proof error: {0}")]
    Proof(#[from] ProofError),

    #[error("no admitted allocation held for member {0}")]
    MissingWitness(Address),

    #[error("held allocation for member {0} no longer matches its commitment")]
    StaleWitness(Address),

    #[error("witness store lock poisoned")]
    Poisoned,
}

impl<T> From<std::sync::PoisonError<T>> for CoordinatorError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Self::Poisoned
    }
}
