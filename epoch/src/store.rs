//! Keyed store of live epochs, one per admin.
//!
//! Each epoch sits behind its own mutex, so operations on one epoch are
//! serialized while different admins' epochs proceed independently. The map
//! lock is only held long enough to clone the epoch's `Arc`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use allot_proof::{Proof, ProofVerifier, PublicInputs};
use allot_types::{Address, Amount, Clock, CommitmentHash, Timestamp};
use tracing::{debug, info, warn};

use crate::epoch::{Epoch, EpochParams, EpochView};
use crate::error::{EpochError, ErrorKind};
use crate::escrow::EscrowTransfer;
use crate::lifecycle::EpochPhase;

pub struct EpochStore {
    epochs: RwLock<HashMap<Address, Arc<Mutex<Epoch>>>>,
    generation: AtomicU64,
    verifier: Arc<dyn ProofVerifier>,
    transfer: Arc<dyn EscrowTransfer>,
    clock: Arc<dyn Clock>,
}

impl EpochStore {
    pub fn new(
        verifier: Arc<dyn ProofVerifier>,
        transfer: Arc<dyn EscrowTransfer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            epochs: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
            verifier,
            transfer,
            clock,
        }
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn len(&self) -> Result<usize, EpochError> {
        Ok(self.epochs.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, EpochError> {
        Ok(self.len()? == 0)
    }

    fn epoch(&self, admin: &Address) -> Result<Arc<Mutex<Epoch>>, EpochError> {
        self.epochs
            .read()?
            .get(admin)
            .cloned()
            .ok_or(EpochError::EpochNotFound(*admin))
    }

    fn mutate<R>(
        &self,
        admin: &Address,
        op: impl FnOnce(&mut Epoch, Timestamp) -> Result<R, EpochError>,
    ) -> Result<R, EpochError> {
        let epoch = self.epoch(admin)?;
        let mut guard = epoch.lock()?;
        let now = self.clock.now();
        op(&mut *guard, now)
    }

    fn read<R>(&self, admin: &Address, op: impl FnOnce(&Epoch, Timestamp) -> R) -> Result<R, EpochError> {
        let epoch = self.epoch(admin)?;
        let guard = epoch.lock()?;
        Ok(op(&*guard, self.clock.now()))
    }

    /// Create the caller's epoch, replacing any previous one.
    pub fn schedule_epoch(
        &self,
        caller: &Address,
        params: EpochParams,
        value: Amount,
    ) -> Result<(), EpochError> {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let epoch = Epoch::schedule(*caller, generation, params, value, self.clock.now())?;
        let members = epoch.members().len();
        let starts_at = epoch.schedule_window().starts_at;

        let previous = self
            .epochs
            .write()?
            .insert(*caller, Arc::new(Mutex::new(epoch)));
        if let Some(previous) = previous {
            // The new epoch is already live, so poisoning of the old one is ignored.
            let orphaned = previous
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .escrow()
                .balance();
            if !orphaned.is_zero() {
                warn!(admin = %caller, orphaned = %orphaned, "rescheduling abandons escrow of previous epoch");
            }
        }

        info!(
            admin = %caller,
            generation,
            members,
            starts_at = %starts_at,
            escrow = %value,
            "epoch scheduled"
        );
        Ok(())
    }

    pub fn update_members(&self, caller: &Address, members: Vec<Address>) -> Result<(), EpochError> {
        let count = members.len();
        self.mutate(caller, |epoch, now| epoch.update_members(members, now))?;
        info!(admin = %caller, members = count, "epoch members replaced");
        Ok(())
    }

    pub fn update_commitment(
        &self,
        caller: &Address,
        admin: &Address,
        hash: CommitmentHash,
    ) -> Result<(), EpochError> {
        let (index, was_verified) =
            self.mutate(admin, |epoch, now| epoch.update_commitment(caller, hash, now))?;
        debug!(admin = %admin, member = %caller, index, was_verified, "commitment updated");
        Ok(())
    }

    pub fn admit_proof(
        &self,
        caller: &Address,
        admin: &Address,
        member: &Address,
        proof: &Proof,
        inputs: &PublicInputs,
    ) -> Result<(), EpochError> {
        let verifier = self.verifier.as_ref();
        let result = self.mutate(admin, |epoch, now| {
            epoch.admit_proof(caller, member, proof, inputs, verifier, now)
        });
        match result {
            Ok(index) => {
                info!(admin = %admin, member = %member, index, verifier = verifier.name(), "proof admitted");
                Ok(())
            }
            Err(e) => {
                if e.kind() == ErrorKind::ProofRejected {
                    warn!(admin = %admin, member = %member, error = %e, "proof rejected");
                }
                Err(e)
            }
        }
    }

    pub fn submit_reveal(
        &self,
        caller: &Address,
        admin: &Address,
        values: Vec<u128>,
    ) -> Result<(), EpochError> {
        let (owed, balance) = self.mutate(admin, |epoch, now| {
            epoch.submit_reveal(caller, values, now)?;
            Ok((epoch.escrow().total_owed(), epoch.escrow().balance()))
        })?;
        match owed {
            Some(owed) if owed <= balance => {}
            Some(owed) => {
                warn!(admin = %admin, owed = %owed, balance = %balance, "revealed totals exceed escrow")
            }
            None => warn!(admin = %admin, "revealed totals overflow the payout range"),
        }
        info!(admin = %admin, "allocations revealed, epoch finalized");
        Ok(())
    }

    /// Pay out the caller's revealed share.
    ///
    /// The withdrawn flag and the escrow debit are committed before the
    /// transfer runs, without the epoch lock held. A failed transfer restores
    /// both, unless the epoch has been rescheduled in the meantime.
    pub fn collect_reward(&self, caller: &Address, admin: &Address) -> Result<Amount, EpochError> {
        let withdrawal = self.mutate(admin, |epoch, now| epoch.begin_withdrawal(caller, now))?;
        let amount = withdrawal.payout.amount;

        if let Err(e) = self.transfer.transfer(caller, amount) {
            warn!(admin = %admin, member = %caller, amount = %amount, error = %e, "escrow transfer failed");
            let restored = self.mutate(admin, |epoch, _| Ok(epoch.rollback_withdrawal(&withdrawal)))?;
            if !restored {
                warn!(admin = %admin, member = %caller, "epoch rescheduled during transfer, rollback skipped");
            }
            return Err(e.into());
        }

        info!(admin = %admin, member = %caller, amount = %amount, "reward collected");
        Ok(amount)
    }

    pub fn members(&self, admin: &Address) -> Result<Vec<Address>, EpochError> {
        self.read(admin, |e, _| e.members().to_vec())
    }

    pub fn commitments(&self, admin: &Address) -> Result<Vec<CommitmentHash>, EpochError> {
        self.read(admin, |e, _| e.registry().commitments().to_vec())
    }

    pub fn verified(&self, admin: &Address) -> Result<Vec<bool>, EpochError> {
        self.read(admin, |e, _| e.registry().verified().to_vec())
    }

    pub fn revealed(&self, admin: &Address) -> Result<Vec<u128>, EpochError> {
        self.read(admin, |e, _| e.escrow().revealed_allocations().to_vec())
    }

    pub fn withdrawn(&self, admin: &Address) -> Result<Vec<bool>, EpochError> {
        self.read(admin, |e, _| e.escrow().withdrawn().to_vec())
    }

    pub fn is_active(&self, admin: &Address) -> Result<bool, EpochError> {
        self.read(admin, |e, now| e.is_active(now))
    }

    pub fn is_finished(&self, admin: &Address) -> Result<bool, EpochError> {
        self.read(admin, |e, now| e.is_finished(now))
    }

    pub fn is_finalized(&self, admin: &Address) -> Result<bool, EpochError> {
        self.read(admin, |e, now| e.is_finalized(now))
    }

    pub fn is_all_verified(&self, admin: &Address) -> Result<bool, EpochError> {
        self.read(admin, |e, _| e.is_all_verified())
    }

    pub fn phase(&self, admin: &Address) -> Result<EpochPhase, EpochError> {
        self.read(admin, |e, now| e.phase(now))
    }

    pub fn reward_rate(&self, admin: &Address) -> Result<Amount, EpochError> {
        self.read(admin, |e, _| e.escrow().reward_rate_per_unit())
    }

    pub fn escrow_balance(&self, admin: &Address) -> Result<Amount, EpochError> {
        self.read(admin, |e, _| e.escrow().balance())
    }

    pub fn snapshot(&self, admin: &Address) -> Result<EpochView, EpochError> {
        self.read(admin, |e, now| e.view(now))
    }
}
