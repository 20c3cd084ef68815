//! Allocation proofs.
//!
//! ## Architecture
//!
//! - **Verifier** (`verifier.rs`): the `ProofVerifier` trait the epoch core is
//!   built against, and the opaque `Proof` type.
//! - **Public inputs** (`public_inputs.rs`): the five-word public-input vector
//!   and its wire encoding.
//! - **Witness** (`witness.rs`): the allocation constraint system evaluated on a
//!   private witness. Defines what "verified" means.
//! - **Transparent** (`transparent.rs`): keyed-hash reference prover/verifier
//!   for simulations. No zero-knowledge.

mod encoding;
pub mod error;
pub mod public_inputs;
pub mod transparent;
pub mod verifier;
pub mod witness;

pub use error::{ProofError, PublicInputError, VerifyError};
pub use public_inputs::{PublicInputs, Word, PUBLIC_INPUT_WORDS};
pub use transparent::TransparentProofSystem;
pub use verifier::{Proof, ProofVerifier};
pub use witness::{AllocationWitness, ConstraintViolation};
