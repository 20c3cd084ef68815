//! Scenario tests driving full epochs through the store:
//! schedule → membership edits → commit → prove → reveal → collect.
//!
//! Proofs come from the transparent proof system so the constraint system is
//! exercised for real; clock and escrow transfer are nullables.

use std::sync::{Arc, Mutex, OnceLock, Weak};

use allot_epoch::{
    EpochError, EpochParams, EpochPhase, EpochStore, ErrorKind, EscrowTransfer, TransferError,
};
use allot_nullables::{NullClock, NullTransfer, NullVerifier};
use allot_proof::{AllocationWitness, Proof, PublicInputs, TransparentProofSystem};
use allot_types::{Address, Amount, CommitmentHash};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const ONE_TOKEN: u128 = 1_000_000_000_000_000_000;
const NOW: u64 = 1_000_000;
const STARTS_AT: u64 = NOW + 60;
const DURATION: u64 = 10;

fn admin() -> Address {
    Address::repeat(0xAD)
}

fn coordinator() -> Address {
    Address::repeat(0xC0)
}

fn member(n: u8) -> Address {
    Address::repeat(n)
}

fn abc() -> Vec<Address> {
    vec![member(0xA), member(0xB), member(0xC)]
}

fn params(members: Vec<Address>) -> EpochParams {
    EpochParams {
        members,
        starts_at: allot_types::Timestamp::new(STARTS_AT),
        duration_secs: DURATION,
        coordinator: coordinator(),
    }
}

struct Harness {
    store: Arc<EpochStore>,
    clock: Arc<NullClock>,
    transfer: Arc<NullTransfer>,
    prover: TransparentProofSystem,
}

impl Harness {
    fn new() -> Self {
        let prover = TransparentProofSystem::new([0x5E; 32]);
        let clock = Arc::new(NullClock::new(NOW));
        let transfer = Arc::new(NullTransfer::new());
        let store = Arc::new(EpochStore::new(
            Arc::new(TransparentProofSystem::new([0x5E; 32])),
            transfer.clone(),
            clock.clone(),
        ));
        Self {
            store,
            clock,
            transfer,
            prover,
        }
    }

    fn schedule(&self, value: u128) {
        self.store
            .schedule_epoch(&admin(), params(abc()), Amount::new(value))
            .unwrap();
    }

    /// Commit `allocations` for member `index` and get the proof admitted.
    fn commit_and_prove(&self, index: usize, allocations: &[i64]) -> AllocationWitness {
        let who = abc()[index];
        let witness = AllocationWitness::from_slice([index as u8 + 1; 32], allocations).unwrap();
        self.store
            .update_commitment(&who, &admin(), witness.commitment())
            .unwrap();
        let (proof, inputs) = self.prover.prove(&witness, index as u32, 3).unwrap();
        self.store
            .admit_proof(&coordinator(), &admin(), &who, &proof, &inputs)
            .unwrap();
        witness
    }
}

// ---------------------------------------------------------------------------
// 1. Full epoch
// ---------------------------------------------------------------------------

#[test]
fn three_member_epoch_settles() {
    let h = Harness::new();
    h.schedule(10 * ONE_TOKEN);

    // Membership is editable until the epoch starts.
    h.store
        .update_members(&admin(), vec![member(0xA), member(0xB)])
        .unwrap();
    h.store.update_members(&admin(), abc()).unwrap();
    assert_eq!(h.store.phase(&admin()).unwrap(), EpochPhase::Scheduled);

    h.clock.set(STARTS_AT);
    let err = h.store.update_members(&admin(), abc()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);

    h.commit_and_prove(0, &[0, 2000, 8000]);
    h.commit_and_prove(1, &[1000, 0, 9000]);
    assert!(!h.store.is_all_verified(&admin()).unwrap());
    h.commit_and_prove(2, &[3000, 7000, 0]);
    assert!(h.store.is_all_verified(&admin()).unwrap());

    // Reveal waits for the window to close.
    let err = h
        .store
        .submit_reveal(&coordinator(), &admin(), vec![4000, 9000, 17000])
        .unwrap_err();
    assert_eq!(err.code(), "wrong_state");

    h.clock.set(STARTS_AT + DURATION);
    assert!(h.store.is_finished(&admin()).unwrap());
    h.store
        .submit_reveal(&coordinator(), &admin(), vec![4000, 9000, 17000])
        .unwrap();
    assert!(h.store.is_finalized(&admin()).unwrap());
    assert_eq!(h.store.revealed(&admin()).unwrap(), vec![4000, 9000, 17000]);

    let rate = h.store.reward_rate(&admin()).unwrap();
    assert_eq!(rate, Amount::new(10 * ONE_TOKEN / 10_000));

    let paid = h.store.collect_reward(&member(0xA), &admin()).unwrap();
    assert_eq!(paid, Amount::new(4000 * (10 * ONE_TOKEN / 10_000)));
    assert_eq!(h.transfer.total_to(&member(0xA)), paid);

    let err = h.store.collect_reward(&member(0xA), &admin()).unwrap_err();
    assert!(matches!(err, EpochError::AlreadyWithdrawn(_)));
    assert_eq!(h.transfer.transfers().len(), 1);
}

#[test]
fn overcommitted_reveal_fails_late_withdrawals_cleanly() {
    let h = Harness::new();
    h.schedule(10 * ONE_TOKEN);
    h.clock.set(STARTS_AT);
    h.commit_and_prove(0, &[0, 2000, 8000]);
    h.commit_and_prove(1, &[1000, 0, 9000]);
    h.commit_and_prove(2, &[3000, 7000, 0]);
    h.clock.advance(DURATION);
    // 30000 units at V/10000 each is three times the escrow.
    h.store
        .submit_reveal(&coordinator(), &admin(), vec![4000, 9000, 17000])
        .unwrap();

    h.store.collect_reward(&member(0xA), &admin()).unwrap();
    let before = h.store.snapshot(&admin()).unwrap();

    let err = h.store.collect_reward(&member(0xB), &admin()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Escrow);
    assert_eq!(err.code(), "insufficient_escrow");
    assert_eq!(h.store.snapshot(&admin()).unwrap(), before);
    assert_eq!(h.transfer.transfers().len(), 1);
}

// ---------------------------------------------------------------------------
// 2. Commitments and proofs
// ---------------------------------------------------------------------------

#[test]
fn recommit_after_proof_requires_new_proof() {
    let h = Harness::new();
    h.schedule(ONE_TOKEN);
    h.clock.set(STARTS_AT);
    h.commit_and_prove(0, &[0, 5000, 5000]);
    assert_eq!(h.store.verified(&admin()).unwrap(), vec![true, false, false]);

    let fresh = AllocationWitness::from_slice([9; 32], &[0, 10_000, 0]).unwrap();
    h.store
        .update_commitment(&member(0xA), &admin(), fresh.commitment())
        .unwrap();
    assert_eq!(h.store.verified(&admin()).unwrap(), vec![false, false, false]);
    assert_eq!(h.store.commitments(&admin()).unwrap()[0], fresh.commitment());
}

#[test]
fn stale_proof_rejected_after_recommit() {
    let h = Harness::new();
    h.schedule(ONE_TOKEN);
    h.clock.set(STARTS_AT);

    let old = AllocationWitness::from_slice([1; 32], &[0, 5000, 5000]).unwrap();
    h.store
        .update_commitment(&member(0xA), &admin(), old.commitment())
        .unwrap();
    let (proof, inputs) = h.prover.prove(&old, 0, 3).unwrap();

    let new = AllocationWitness::from_slice([2; 32], &[0, 1, 9999]).unwrap();
    h.store
        .update_commitment(&member(0xA), &admin(), new.commitment())
        .unwrap();

    let err = h
        .store
        .admit_proof(&coordinator(), &admin(), &member(0xA), &proof, &inputs)
        .unwrap_err();
    assert_eq!(err.code(), "bad_public_input_hash");
}

#[test]
fn forged_proof_rejected_without_mutation() {
    let h = Harness::new();
    h.schedule(ONE_TOKEN);
    h.clock.set(STARTS_AT);

    let commitment = CommitmentHash::new([0x42; 32]);
    h.store
        .update_commitment(&member(0xB), &admin(), commitment)
        .unwrap();
    let inputs = PublicInputs::new(commitment, 1, 3);
    let err = h
        .store
        .admit_proof(&coordinator(), &admin(), &member(0xB), &Proof::new(vec![0; 32]), &inputs)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProofRejected);
    assert_eq!(h.store.verified(&admin()).unwrap(), vec![false, false, false]);
}

#[test]
fn only_coordinator_admits_proofs() {
    let h = Harness::new();
    h.schedule(ONE_TOKEN);
    h.clock.set(STARTS_AT);
    let witness = AllocationWitness::from_slice([1; 32], &[0, 5000, 5000]).unwrap();
    h.store
        .update_commitment(&member(0xA), &admin(), witness.commitment())
        .unwrap();
    let (proof, inputs) = h.prover.prove(&witness, 0, 3).unwrap();

    let err = h
        .store
        .admit_proof(&admin(), &admin(), &member(0xA), &proof, &inputs)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
}

#[test]
fn null_verifier_verdict_is_final() {
    let verifier = Arc::new(NullVerifier::rejecting());
    let clock = Arc::new(NullClock::new(NOW));
    let store = EpochStore::new(verifier.clone(), Arc::new(NullTransfer::new()), clock.clone());
    store
        .schedule_epoch(&admin(), params(abc()), Amount::new(ONE_TOKEN))
        .unwrap();
    clock.set(STARTS_AT);

    let inputs = PublicInputs::new(CommitmentHash::ZERO, 0, 3);
    let err = store
        .admit_proof(&coordinator(), &admin(), &member(0xA), &Proof::default(), &inputs)
        .unwrap_err();
    assert_eq!(err.code(), "proof_invalid");
    assert_eq!(verifier.calls(), 1);

    verifier.set_accept(true);
    store
        .admit_proof(&coordinator(), &admin(), &member(0xA), &Proof::default(), &inputs)
        .unwrap();
    assert_eq!(store.verified(&admin()).unwrap(), vec![true, false, false]);
}

// ---------------------------------------------------------------------------
// 3. Settlement safety
// ---------------------------------------------------------------------------

fn finalized_harness(transfer: Arc<dyn EscrowTransfer>) -> (Arc<EpochStore>, Arc<NullClock>) {
    let clock = Arc::new(NullClock::new(NOW));
    let store = Arc::new(EpochStore::new(
        Arc::new(NullVerifier::accepting()),
        transfer,
        clock.clone(),
    ));
    store
        .schedule_epoch(&admin(), params(abc()), Amount::new(30_000))
        .unwrap();
    clock.set(STARTS_AT);
    for (i, who) in abc().iter().enumerate() {
        let hash = CommitmentHash::new([i as u8 + 1; 32]);
        store.update_commitment(who, &admin(), hash).unwrap();
        let inputs = PublicInputs::new(hash, i as u32, 3);
        store
            .admit_proof(&coordinator(), &admin(), who, &Proof::default(), &inputs)
            .unwrap();
    }
    clock.advance(DURATION);
    store
        .submit_reveal(&coordinator(), &admin(), vec![2000, 3000, 5000])
        .unwrap();
    (store, clock)
}

#[test]
fn failed_transfer_allows_retry() {
    let transfer = Arc::new(NullTransfer::failing());
    let (store, _) = finalized_harness(transfer.clone());

    let err = store.collect_reward(&member(0xB), &admin()).unwrap_err();
    assert!(matches!(err, EpochError::Transfer(_)));
    assert_eq!(store.withdrawn(&admin()).unwrap(), vec![false, false, false]);
    assert_eq!(store.escrow_balance(&admin()).unwrap(), Amount::new(30_000));

    transfer.set_failing(false);
    let paid = store.collect_reward(&member(0xB), &admin()).unwrap();
    assert_eq!(paid, Amount::new(9_000));
    assert_eq!(store.escrow_balance(&admin()).unwrap(), Amount::new(21_000));
}

/// Calls back into the store for the same member while paying out.
struct ReentrantTransfer {
    store: OnceLock<Weak<EpochStore>>,
    inner: Mutex<Vec<Result<Amount, EpochError>>>,
}

impl EscrowTransfer for ReentrantTransfer {
    fn transfer(&self, to: &Address, _amount: Amount) -> Result<(), TransferError> {
        if let Some(store) = self.store.get().and_then(Weak::upgrade) {
            let again = store.collect_reward(to, &admin());
            self.inner.lock().unwrap().push(again);
        }
        Ok(())
    }
}

#[test]
fn reentrant_collect_cannot_double_pay() {
    let transfer = Arc::new(ReentrantTransfer {
        store: OnceLock::new(),
        inner: Mutex::new(Vec::new()),
    });
    let (store, _) = finalized_harness(transfer.clone());
    transfer.store.set(Arc::downgrade(&store)).unwrap();

    store.collect_reward(&member(0xA), &admin()).unwrap();
    let nested = transfer.inner.lock().unwrap();
    assert_eq!(nested.len(), 1);
    assert!(matches!(nested[0], Err(EpochError::AlreadyWithdrawn(_))));
    assert_eq!(store.escrow_balance(&admin()).unwrap(), Amount::new(24_000));
}

#[test]
fn concurrent_collects_pay_once() {
    let transfer = Arc::new(NullTransfer::new());
    let (store, _) = finalized_harness(transfer.clone());

    let store = &store;
    let results: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| s.spawn(move || store.collect_reward(&member(0xC), &admin())))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| e.kind() == ErrorKind::DoubleSpend));
    assert_eq!(transfer.transfers(), vec![(member(0xC), Amount::new(15_000))]);
}

// ---------------------------------------------------------------------------
// 4. Independent epochs
// ---------------------------------------------------------------------------

#[test]
fn admins_keep_separate_epochs() {
    let h = Harness::new();
    h.schedule(ONE_TOKEN);
    let other = Address::repeat(0xEE);
    h.store
        .schedule_epoch(&other, params(vec![member(1), member(2)]), Amount::new(50_000))
        .unwrap();
    assert_eq!(h.store.len().unwrap(), 2);

    h.clock.set(STARTS_AT);
    let hash = CommitmentHash::new([3; 32]);
    h.store.update_commitment(&member(1), &other, hash).unwrap();
    assert!(h.store.commitments(&admin()).unwrap().iter().all(CommitmentHash::is_zero));

    let err = h.store.update_commitment(&member(1), &admin(), hash).unwrap_err();
    assert!(matches!(err, EpochError::NotMember(_)));
}

#[test]
fn scheduling_validation_reasons() {
    let h = Harness::new();
    let schedule = |p: EpochParams, v: u128| h.store.schedule_epoch(&admin(), p, Amount::new(v));

    assert_eq!(schedule(params(abc()), 0).unwrap_err().code(), "invalid_funding");
    assert_eq!(
        schedule(params(vec![member(1)]), 1).unwrap_err().code(),
        "invalid_member_count"
    );
    let mut past = params(abc());
    past.starts_at = allot_types::Timestamp::new(NOW);
    assert_eq!(schedule(past, 1).unwrap_err().code(), "past_start");
    let mut nobody = params(abc());
    nobody.coordinator = Address::ZERO;
    assert_eq!(schedule(nobody, 1).unwrap_err().code(), "missing_coordinator");
    assert!(h.store.is_empty().unwrap());
}
