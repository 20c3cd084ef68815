//! The proof-verifier seam.
//!
//! The epoch core never checks proof algebra itself. It hands the opaque proof
//! and the decoded public inputs to whatever verifier it was built with: a
//! pairing-based verifier in production, the transparent system in
//! simulations, a programmable null verifier in tests.

use serde::{Deserialize, Serialize};

use crate::encoding::hex_bytes;
use crate::error::VerifyError;
use crate::public_inputs::PublicInputs;

/// An opaque proof as produced by an external proving system.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    #[serde(with = "hex_bytes")]
    pub bytes: Vec<u8>,
}

impl Proof {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

/// Checks a proof against the fixed allocation constraint system.
///
/// Verification must be a pure function of its arguments: no side effects,
/// in particular none on rejection.
pub trait ProofVerifier: Send + Sync {
    /// Human-readable name of this verifier.
    fn name(&self) -> &str;

    /// `Ok(true)` iff `proof` attests a satisfying witness for `inputs`.
    /// `Err` is reserved for proofs the verifier cannot even parse.
    fn verify(&self, proof: &Proof, inputs: &PublicInputs) -> Result<bool, VerifyError>;
}
