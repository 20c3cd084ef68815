//! Transparent reference proof system.
//!
//! Proofs are keyed Blake2b tags over the encoded public inputs. The prover
//! only tags statements whose witness satisfies the constraint system, so a
//! valid tag attests satisfiability to anyone holding the setup key.
//!
//! ## Security Notice
//!
//! This gives NO zero-knowledge and NO soundness against a holder of the
//! setup key. It stands in for a succinct proof system when running the
//! protocol end to end without one.

use allot_crypto::blake2b_256_multi;
use std::fmt;

use crate::error::{ProofError, VerifyError};
use crate::public_inputs::PublicInputs;
use crate::verifier::{Proof, ProofVerifier};
use crate::witness::AllocationWitness;

const PROOF_DOMAIN: &[u8] = b"allot/transparent-proof/v1";

/// Length of a transparent proof in bytes.
pub const TRANSPARENT_PROOF_LEN: usize = 32;

pub struct TransparentProofSystem {
    setup_key: [u8; 32],
}

impl TransparentProofSystem {
    pub fn new(setup_key: [u8; 32]) -> Self {
        Self { setup_key }
    }

    /// Prove that `witness` is a valid allocation by member `member_index`
    /// of an epoch with `member_count` members.
    pub fn prove(
        &self,
        witness: &AllocationWitness,
        member_index: u32,
        member_count: u32,
    ) -> Result<(Proof, PublicInputs), ProofError> {
        let commitment = witness.commitment();
        witness.check(member_index, member_count, &commitment)?;
        let inputs = PublicInputs::new(commitment, member_index, member_count);
        Ok((Proof::new(self.tag(&inputs).to_vec()), inputs))
    }

    fn tag(&self, inputs: &PublicInputs) -> [u8; 32] {
        blake2b_256_multi(&[PROOF_DOMAIN, &self.setup_key, &inputs.to_bytes()])
    }
}

impl fmt::Debug for TransparentProofSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransparentProofSystem")
            .field("setup_key", &"<redacted>")
            .finish()
    }
}

impl ProofVerifier for TransparentProofSystem {
    fn name(&self) -> &str {
        "transparent-blake2b"
    }

    fn verify(&self, proof: &Proof, inputs: &PublicInputs) -> Result<bool, VerifyError> {
        if proof.bytes.len() != TRANSPARENT_PROOF_LEN {
            return Err(VerifyError::Malformed(format!(
                "expected {TRANSPARENT_PROOF_LEN} bytes, got {}",
                proof.bytes.len()
            )));
        }
        Ok(proof.bytes[..] == self.tag(inputs)[..])
    }
}
