//! The coordinator's side of an epoch.
//!
//! Members hand their private witness to the coordinator, which proves it,
//! relays the proof to the store and keeps the witness until the reveal. The
//! reveal is computed here, off the epoch core, and accepted there on trust
//! once every commitment has been verified.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use allot_epoch::{EpochError, EpochPhase, EpochStore};
use allot_proof::{AllocationWitness, TransparentProofSystem};
use allot_types::Address;
use tracing::info;

use crate::error::CoordinatorError;

pub struct Coordinator {
    identity: Address,
    admin: Address,
    prover: Arc<TransparentProofSystem>,
    store: Arc<EpochStore>,
    witnesses: Mutex<HashMap<Address, AllocationWitness>>,
}

impl Coordinator {
    pub fn new(
        identity: Address,
        admin: Address,
        prover: Arc<TransparentProofSystem>,
        store: Arc<EpochStore>,
    ) -> Self {
        Self {
            identity,
            admin,
            prover,
            store,
            witnesses: Mutex::new(HashMap::new()),
        }
    }

    pub fn identity(&self) -> Address {
        self.identity
    }

    /// Prove `member`'s allocation against its stored commitment and get it
    /// verified. The member must already have committed
    /// `witness.commitment()`.
    pub fn admit_allocation(
        &self,
        member: &Address,
        witness: AllocationWitness,
    ) -> Result<(), CoordinatorError> {
        let members = self.store.members(&self.admin)?;
        let index = members
            .iter()
            .position(|m| m == member)
            .ok_or(EpochError::NotMember(*member))?;

        let (proof, inputs) = self
            .prover
            .prove(&witness, index as u32, members.len() as u32)?;
        self.store
            .admit_proof(&self.identity, &self.admin, member, &proof, &inputs)?;

        self.witnesses.lock()?.insert(*member, witness);
        Ok(())
    }

    /// Number of admitted witnesses held.
    pub fn held(&self) -> Result<usize, CoordinatorError> {
        Ok(self.witnesses.lock()?.len())
    }

    /// The window has closed, nothing is revealed yet and every commitment
    /// is verified.
    pub fn ready_to_reveal(&self) -> Result<bool, CoordinatorError> {
        Ok(self.store.phase(&self.admin)? == EpochPhase::Finished
            && self.store.is_all_verified(&self.admin)?)
    }

    /// Per-member reward units from the held witnesses.
    ///
    /// Each member distributes a full 10000 basis points, so the column sums
    /// are divided by the member count to keep the total within escrow.
    pub fn aggregate(&self) -> Result<Vec<u128>, CoordinatorError> {
        let members = self.store.members(&self.admin)?;
        let commitments = self.store.commitments(&self.admin)?;
        let witnesses = self.witnesses.lock()?;

        let mut sums = vec![0u128; members.len()];
        for (member, commitment) in members.iter().zip(&commitments) {
            let witness = witnesses
                .get(member)
                .ok_or(CoordinatorError::MissingWitness(*member))?;
            if witness.commitment() != *commitment {
                return Err(CoordinatorError::StaleWitness(*member));
            }
            for (sum, &slot) in sums.iter_mut().zip(witness.allocations.iter()) {
                // admitted witnesses never hold negative slots
                *sum += u128::try_from(slot).unwrap_or(0);
            }
        }

        let count = members.len() as u128;
        Ok(sums.into_iter().map(|s| s / count).collect())
    }

    /// Aggregate and submit the reveal, returning the submitted values.
    pub fn reveal(&self) -> Result<Vec<u128>, CoordinatorError> {
        let values = self.aggregate()?;
        self.store
            .submit_reveal(&self.identity, &self.admin, values.clone())?;
        info!(
            admin = %self.admin,
            coordinator = %self.identity,
            total_units = values.iter().sum::<u128>(),
            "reveal submitted"
        );
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use allot_nullables::{NullClock, NullTransfer};

    #[test]
    fn held_reports_poisoned_witness_store() {
        let prover = Arc::new(TransparentProofSystem::new([0x11; 32]));
        let store = Arc::new(EpochStore::new(
            prover.clone(),
            Arc::new(NullTransfer::new()),
            Arc::new(NullClock::new(0)),
        ));
        let coordinator = Coordinator::new(Address::repeat(0xC0), Address::ZERO, prover, store);
        assert_eq!(coordinator.held().unwrap(), 0);

        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = coordinator.witnesses.lock().unwrap();
            panic!("holder crashed");
        }));
        assert!(matches!(coordinator.held(), Err(CoordinatorError::Poisoned)));
    }
}
