//! Nullable proof verifier: a programmable verdict.

use allot_proof::{Proof, ProofVerifier, PublicInputs, VerifyError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Returns whatever verdict it was told to, and counts calls.
#[derive(Debug)]
pub struct NullVerifier {
    accept: AtomicBool,
    calls: AtomicUsize,
}

impl NullVerifier {
    pub fn accepting() -> Self {
        Self {
            accept: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            accept: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_accept(&self, accept: bool) {
        self.accept.store(accept, Ordering::SeqCst);
    }

    /// Number of `verify` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for NullVerifier {
    fn default() -> Self {
        Self::accepting()
    }
}

impl ProofVerifier for NullVerifier {
    fn name(&self) -> &str {
        "null"
    }

    fn verify(&self, _proof: &Proof, _inputs: &PublicInputs) -> Result<bool, VerifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.accept.load(Ordering::SeqCst))
    }
}
