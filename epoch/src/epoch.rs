//! The epoch aggregate: schedule, membership, registry and escrow together.
//!
//! Every method takes the current time explicitly and either applies fully or
//! returns an error having changed nothing. Locking lives in [`crate::store`].

use std::collections::HashSet;

use allot_proof::{Proof, ProofVerifier, PublicInputs};
use allot_types::{params, Address, Amount, CommitmentHash, Timestamp, MAX_MEMBERS, MIN_MEMBERS};
use serde::{Deserialize, Serialize};

use crate::error::{EpochError, PublicInputField};
use crate::escrow::{EscrowLedger, PendingPayout};
use crate::lifecycle::{require_phase, EpochPhase, EpochSchedule};
use crate::registry::CommitmentRegistry;

/// Parameters of `schedule_epoch`, minus the caller and the deposit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochParams {
    pub members: Vec<Address>,
    pub starts_at: Timestamp,
    pub duration_secs: u64,
    pub coordinator: Address,
}

/// A debit tied to the epoch instance it was taken from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Withdrawal {
    pub generation: u64,
    pub payout: PendingPayout,
}

#[derive(Clone, Debug)]
pub struct Epoch {
    admin: Address,
    generation: u64,
    members: Vec<Address>,
    schedule: EpochSchedule,
    coordinator: Address,
    registry: CommitmentRegistry,
    escrow: EscrowLedger,
}

impl Epoch {
    /// Validate `params` and build a fresh epoch funded with `value`.
    pub fn schedule(
        admin: Address,
        generation: u64,
        params: EpochParams,
        value: Amount,
        now: Timestamp,
    ) -> Result<Self, EpochError> {
        if value.is_zero() {
            return Err(EpochError::InvalidFunding);
        }
        check_member_count(params.members.len())?;
        if params.starts_at <= now {
            return Err(EpochError::PastStart {
                starts_at: params.starts_at,
                now,
            });
        }
        if params.coordinator.is_zero() {
            return Err(EpochError::MissingCoordinator);
        }
        validate_members(&params.members, &params.coordinator)?;

        let escrow = EscrowLedger::fund(value, params.members.len())?;
        Ok(Self {
            admin,
            generation,
            registry: CommitmentRegistry::new(params.members.len()),
            members: params.members,
            schedule: EpochSchedule::new(params.starts_at, params.duration_secs),
            coordinator: params.coordinator,
            escrow,
        })
    }

    pub fn admin(&self) -> Address {
        self.admin
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn coordinator(&self) -> Address {
        self.coordinator
    }

    pub fn schedule_window(&self) -> EpochSchedule {
        self.schedule
    }

    pub fn members(&self) -> &[Address] {
        &self.members
    }

    pub fn registry(&self) -> &CommitmentRegistry {
        &self.registry
    }

    pub fn escrow(&self) -> &EscrowLedger {
        &self.escrow
    }

    pub fn member_index(&self, member: &Address) -> Option<usize> {
        self.members.iter().position(|m| m == member)
    }

    pub fn phase(&self, now: Timestamp) -> EpochPhase {
        self.schedule.phase(now, self.escrow.is_revealed())
    }

    pub fn is_active(&self, now: Timestamp) -> bool {
        self.schedule.is_active(now)
    }

    pub fn is_finished(&self, now: Timestamp) -> bool {
        self.schedule.is_finished(now)
    }

    pub fn is_finalized(&self, now: Timestamp) -> bool {
        self.is_finished(now) && self.escrow.is_revealed()
    }

    pub fn is_all_verified(&self) -> bool {
        self.registry.all_verified()
    }

    /// Replace the member list wholesale. Only before `starts_at`.
    pub fn update_members(&mut self, members: Vec<Address>, now: Timestamp) -> Result<(), EpochError> {
        require_phase(self.phase(now), EpochPhase::Scheduled, "update_members")?;
        check_member_count(members.len())?;
        validate_members(&members, &self.coordinator)?;

        self.registry.reset(members.len());
        self.escrow.reset(members.len());
        self.members = members;
        Ok(())
    }

    /// Store `hash` as `caller`'s commitment. Returns the member index and
    /// whether a verified commitment was discarded.
    pub fn update_commitment(
        &mut self,
        caller: &Address,
        hash: CommitmentHash,
        now: Timestamp,
    ) -> Result<(usize, bool), EpochError> {
        require_phase(self.phase(now), EpochPhase::Active, "update_commitment")?;
        let index = self
            .member_index(caller)
            .ok_or(EpochError::NotMember(*caller))?;
        let was_verified = self.registry.update(index, hash).unwrap_or(false);
        Ok((index, was_verified))
    }

    /// Check a proof for `member`'s stored commitment and mark it verified.
    pub fn admit_proof(
        &mut self,
        caller: &Address,
        member: &Address,
        proof: &Proof,
        inputs: &PublicInputs,
        verifier: &dyn ProofVerifier,
        now: Timestamp,
    ) -> Result<usize, EpochError> {
        self.require_coordinator(caller)?;
        require_phase(self.phase(now), EpochPhase::Active, "admit_proof")?;
        let index = self
            .member_index(member)
            .ok_or(EpochError::NotMember(*member))?;
        self.check_public_inputs(index, inputs)?;

        if !inputs.valid {
            return Err(EpochError::ProofInvalid(
                "validity flag not set by proof system".into(),
            ));
        }
        match verifier.verify(proof, inputs) {
            Ok(true) => {}
            Ok(false) => {
                return Err(EpochError::ProofInvalid(format!(
                    "rejected by {}",
                    verifier.name()
                )))
            }
            Err(e) => return Err(EpochError::ProofInvalid(e.to_string())),
        }

        self.registry.mark_verified(index);
        Ok(index)
    }

    fn check_public_inputs(&self, index: usize, inputs: &PublicInputs) -> Result<(), EpochError> {
        let stored = self.registry.commitment(index).unwrap_or_default();
        if inputs.commitment != stored || inputs.commitment_echo != stored {
            return Err(EpochError::BadPublicInput(PublicInputField::Hash));
        }
        if inputs.member_index as usize != index {
            return Err(EpochError::BadPublicInput(PublicInputField::Index));
        }
        if inputs.member_count as usize != self.members.len() {
            return Err(EpochError::BadPublicInput(PublicInputField::Count));
        }
        Ok(())
    }

    /// Record the coordinator's totals and finalize.
    pub fn submit_reveal(
        &mut self,
        caller: &Address,
        values: Vec<u128>,
        now: Timestamp,
    ) -> Result<(), EpochError> {
        self.require_coordinator(caller)?;
        require_phase(self.phase(now), EpochPhase::Finished, "submit_reveal")?;
        if !self.registry.all_verified() {
            return Err(EpochError::NotAllVerified {
                verified: self.registry.verified_count(),
                total: self.members.len(),
            });
        }
        if values.len() != self.members.len() {
            return Err(EpochError::RevealLengthMismatch {
                expected: self.members.len(),
                got: values.len(),
            });
        }
        self.escrow.reveal(values);
        Ok(())
    }

    /// Flip `caller`'s withdrawn flag and debit the escrow. The transfer
    /// itself is the caller's job; undo with [`Epoch::rollback_withdrawal`].
    pub fn begin_withdrawal(
        &mut self,
        caller: &Address,
        now: Timestamp,
    ) -> Result<Withdrawal, EpochError> {
        require_phase(self.phase(now), EpochPhase::Finalized, "collect_reward")?;
        let index = self
            .member_index(caller)
            .ok_or(EpochError::NotMember(*caller))?;
        let payout = self.escrow.debit(index, *caller)?;
        Ok(Withdrawal {
            generation: self.generation,
            payout,
        })
    }

    /// Restore a failed withdrawal. Ignored for a different generation.
    pub fn rollback_withdrawal(&mut self, withdrawal: &Withdrawal) -> bool {
        if withdrawal.generation != self.generation {
            return false;
        }
        self.escrow.restore(&withdrawal.payout);
        true
    }

    fn require_coordinator(&self, caller: &Address) -> Result<(), EpochError> {
        if *caller == self.coordinator {
            Ok(())
        } else {
            Err(EpochError::NotCoordinator(*caller))
        }
    }

    pub fn view(&self, now: Timestamp) -> EpochView {
        EpochView {
            admin: self.admin,
            coordinator: self.coordinator,
            members: self.members.clone(),
            starts_at: self.schedule.starts_at,
            duration_secs: self.schedule.duration_secs,
            phase: self.phase(now),
            escrowed: self.escrow.escrowed(),
            balance: self.escrow.balance(),
            reward_rate_per_unit: self.escrow.reward_rate_per_unit(),
            commitments: self.registry.commitments().to_vec(),
            verified: self.registry.verified().to_vec(),
            revealed_allocations: self.escrow.revealed_allocations().to_vec(),
            withdrawn: self.escrow.withdrawn().to_vec(),
        }
    }
}

/// Read-only snapshot of an epoch at one instant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochView {
    pub admin: Address,
    pub coordinator: Address,
    pub members: Vec<Address>,
    pub starts_at: Timestamp,
    pub duration_secs: u64,
    pub phase: EpochPhase,
    pub escrowed: Amount,
    pub balance: Amount,
    pub reward_rate_per_unit: Amount,
    pub commitments: Vec<CommitmentHash>,
    pub verified: Vec<bool>,
    pub revealed_allocations: Vec<u128>,
    pub withdrawn: Vec<bool>,
}

fn check_member_count(count: usize) -> Result<(), EpochError> {
    if params::member_count_in_range(count) {
        Ok(())
    } else {
        Err(EpochError::InvalidMemberCount {
            count,
            min: MIN_MEMBERS,
            max: MAX_MEMBERS,
        })
    }
}

/// Members must be distinct and must not include the coordinator.
fn validate_members(members: &[Address], coordinator: &Address) -> Result<(), EpochError> {
    let mut seen = HashSet::with_capacity(members.len());
    for member in members {
        if !seen.insert(member) {
            return Err(EpochError::DuplicateMember(*member));
        }
    }
    if seen.contains(coordinator) {
        return Err(EpochError::CoordinatorIsMember(*coordinator));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use allot_proof::VerifyError;

    const START: u64 = 1_000;

    struct Verdict(Result<bool, &'static str>);

    impl ProofVerifier for Verdict {
        fn name(&self) -> &str {
            "fixed"
        }

        fn verify(&self, _: &Proof, _: &PublicInputs) -> Result<bool, VerifyError> {
            self.0.map_err(|e| VerifyError::Malformed(e.into()))
        }
    }

    fn addr(n: u8) -> Address {
        Address::repeat(n)
    }

    fn params(members: Vec<Address>) -> EpochParams {
        EpochParams {
            members,
            starts_at: Timestamp::new(START),
            duration_secs: 10,
            coordinator: addr(0xC0),
        }
    }

    fn epoch() -> Epoch {
        Epoch::schedule(
            addr(0xAD),
            1,
            params(vec![addr(1), addr(2), addr(3)]),
            Amount::new(100_000),
            Timestamp::new(START - 5),
        )
        .unwrap()
    }

    fn at(secs: u64) -> Timestamp {
        Timestamp::new(secs)
    }

    fn commit_and_verify(e: &mut Epoch, member: u8) {
        let hash = CommitmentHash::new([member; 32]);
        e.update_commitment(&addr(member), hash, at(START)).unwrap();
        let inputs = PublicInputs::new(hash, member as u32 - 1, 3);
        e.admit_proof(&addr(0xC0), &addr(member), &Proof::default(), &inputs, &Verdict(Ok(true)), at(START))
            .unwrap();
    }

    #[test]
    fn schedule_rejects_bad_params() {
        let now = at(START - 5);
        let members = || vec![addr(1), addr(2)];

        let r = Epoch::schedule(addr(9), 0, params(members()), Amount::ZERO, now);
        assert!(matches!(r, Err(EpochError::InvalidFunding)));

        let r = Epoch::schedule(addr(9), 0, params(vec![addr(1)]), Amount::new(1), now);
        assert!(matches!(r, Err(EpochError::InvalidMemberCount { count: 1, .. })));

        let sixteen = (1..=16).map(addr).collect();
        let r = Epoch::schedule(addr(9), 0, params(sixteen), Amount::new(1), now);
        assert!(matches!(r, Err(EpochError::InvalidMemberCount { count: 16, .. })));

        let r = Epoch::schedule(addr(9), 0, params(members()), Amount::new(1), at(START));
        assert!(matches!(r, Err(EpochError::PastStart { .. })));

        let mut p = params(members());
        p.coordinator = Address::ZERO;
        let r = Epoch::schedule(addr(9), 0, p, Amount::new(1), now);
        assert!(matches!(r, Err(EpochError::MissingCoordinator)));

        let r = Epoch::schedule(addr(9), 0, params(vec![addr(1), addr(1)]), Amount::new(1), now);
        assert!(matches!(r, Err(EpochError::DuplicateMember(_))));

        let r = Epoch::schedule(addr(9), 0, params(vec![addr(1), addr(0xC0)]), Amount::new(1), now);
        assert!(matches!(r, Err(EpochError::CoordinatorIsMember(_))));
    }

    #[test]
    fn membership_frozen_once_active() {
        let mut e = epoch();
        e.update_members(vec![addr(4), addr(5)], at(START - 1)).unwrap();
        assert_eq!(e.members(), &[addr(4), addr(5)]);
        assert_eq!(e.registry().len(), 2);
        assert_eq!(e.escrow().withdrawn().len(), 2);

        let err = e.update_members(vec![addr(1), addr(2)], at(START)).unwrap_err();
        assert!(matches!(err, EpochError::WrongState { phase: EpochPhase::Active, .. }));
    }

    #[test]
    fn commitment_requires_active_member() {
        let mut e = epoch();
        let hash = CommitmentHash::new([7; 32]);
        assert!(matches!(
            e.update_commitment(&addr(1), hash, at(START - 1)),
            Err(EpochError::WrongState { .. })
        ));
        assert!(matches!(
            e.update_commitment(&addr(9), hash, at(START)),
            Err(EpochError::NotMember(_))
        ));
        assert!(matches!(
            e.update_commitment(&addr(1), hash, at(START + 10)),
            Err(EpochError::WrongState { phase: EpochPhase::Finished, .. })
        ));
        assert_eq!(e.update_commitment(&addr(1), hash, at(START)).unwrap(), (0, false));
    }

    #[test]
    fn recommit_clears_verified() {
        let mut e = epoch();
        commit_and_verify(&mut e, 2);
        assert!(e.registry().is_verified(1));
        let (_, was_verified) = e
            .update_commitment(&addr(2), CommitmentHash::new([8; 32]), at(START + 1))
            .unwrap();
        assert!(was_verified);
        assert!(!e.registry().is_verified(1));
    }

    #[test]
    fn proof_checks_inputs_in_order() {
        let mut e = epoch();
        let hash = CommitmentHash::new([1; 32]);
        e.update_commitment(&addr(1), hash, at(START)).unwrap();
        let ok = Verdict(Ok(true));
        let coord = addr(0xC0);
        let admit = |e: &mut Epoch, caller: Address, inputs: PublicInputs, v: &Verdict| {
            e.admit_proof(&caller, &addr(1), &Proof::default(), &inputs, v, at(START))
        };

        let good = PublicInputs::new(hash, 0, 3);
        assert!(matches!(admit(&mut e, addr(1), good, &ok), Err(EpochError::NotCoordinator(_))));

        let mut echo = good;
        echo.commitment_echo = CommitmentHash::new([2; 32]);
        assert_eq!(admit(&mut e, coord, echo, &ok).unwrap_err().code(), "bad_public_input_hash");
        assert_eq!(
            admit(&mut e, coord, PublicInputs::new(hash, 1, 3), &ok).unwrap_err().code(),
            "bad_public_input_index"
        );
        assert_eq!(
            admit(&mut e, coord, PublicInputs::new(hash, 0, 4), &ok).unwrap_err().code(),
            "bad_public_input_count"
        );

        let mut unflagged = good;
        unflagged.valid = false;
        assert!(matches!(admit(&mut e, coord, unflagged, &ok), Err(EpochError::ProofInvalid(_))));
        assert!(matches!(
            admit(&mut e, coord, good, &Verdict(Ok(false))),
            Err(EpochError::ProofInvalid(_))
        ));
        assert!(matches!(
            admit(&mut e, coord, good, &Verdict(Err("bad bytes"))),
            Err(EpochError::ProofInvalid(_))
        ));
        assert!(!e.registry().is_verified(0));

        assert_eq!(admit(&mut e, coord, good, &ok).unwrap(), 0);
        assert!(e.registry().is_verified(0));
    }

    #[test]
    fn proof_outside_active_window_is_wrong_state() {
        let mut e = epoch();
        let hash = CommitmentHash::new([1; 32]);
        e.update_commitment(&addr(1), hash, at(START)).unwrap();
        let inputs = PublicInputs::new(hash, 0, 3);
        let admit = |e: &mut Epoch, now: Timestamp| {
            e.admit_proof(&addr(0xC0), &addr(1), &Proof::default(), &inputs, &Verdict(Ok(true)), now)
        };

        assert!(matches!(
            admit(&mut e, at(START - 1)),
            Err(EpochError::WrongState { phase: EpochPhase::Scheduled, .. })
        ));
        assert!(matches!(
            admit(&mut e, at(START + 10)),
            Err(EpochError::WrongState { phase: EpochPhase::Finished, .. })
        ));
        assert!(!e.registry().is_verified(0));
    }

    #[test]
    fn proof_for_stranger_is_not_member() {
        let mut e = epoch();
        let inputs = PublicInputs::new(CommitmentHash::ZERO, 0, 3);
        let r = e.admit_proof(&addr(0xC0), &addr(9), &Proof::default(), &inputs, &Verdict(Ok(true)), at(START));
        assert!(matches!(r, Err(EpochError::NotMember(_))));
    }

    #[test]
    fn reveal_needs_finished_and_all_verified() {
        let mut e = epoch();
        commit_and_verify(&mut e, 1);
        commit_and_verify(&mut e, 2);
        let end = at(START + 10);

        assert!(matches!(
            e.submit_reveal(&addr(0xC0), vec![1, 2, 3], at(START + 9)),
            Err(EpochError::WrongState { phase: EpochPhase::Active, .. })
        ));
        assert!(matches!(
            e.submit_reveal(&addr(0xC0), vec![1, 2, 3], end),
            Err(EpochError::NotAllVerified { verified: 2, total: 3 })
        ));
        assert!(matches!(
            e.submit_reveal(&addr(1), vec![1, 2, 3], end),
            Err(EpochError::NotCoordinator(_))
        ));
    }

    #[test]
    fn reveal_once_then_withdraw_once() {
        let mut e = epoch();
        for m in 1..=3 {
            commit_and_verify(&mut e, m);
        }
        let end = at(START + 10);
        assert!(matches!(
            e.submit_reveal(&addr(0xC0), vec![1, 2], end),
            Err(EpochError::RevealLengthMismatch { expected: 3, got: 2 })
        ));
        assert!(matches!(e.begin_withdrawal(&addr(1), end), Err(EpochError::WrongState { .. })));

        e.submit_reveal(&addr(0xC0), vec![4000, 3000, 3000], end).unwrap();
        assert!(e.is_finalized(end));
        assert!(matches!(
            e.submit_reveal(&addr(0xC0), vec![4000, 3000, 3000], end),
            Err(EpochError::WrongState { phase: EpochPhase::Finalized, .. })
        ));

        let w = e.begin_withdrawal(&addr(1), end).unwrap();
        assert_eq!(w.payout.amount, Amount::new(4000 * 10));
        assert!(matches!(e.begin_withdrawal(&addr(1), end), Err(EpochError::AlreadyWithdrawn(_))));
        assert!(matches!(e.begin_withdrawal(&addr(9), end), Err(EpochError::NotMember(_))));
    }

    #[test]
    fn rollback_only_for_same_generation() {
        let mut e = epoch();
        for m in 1..=3 {
            commit_and_verify(&mut e, m);
        }
        let end = at(START + 10);
        e.submit_reveal(&addr(0xC0), vec![4000, 3000, 3000], end).unwrap();
        let w = e.begin_withdrawal(&addr(2), end).unwrap();

        let stale = Withdrawal { generation: 0, ..w };
        assert!(!e.rollback_withdrawal(&stale));
        assert!(e.escrow().withdrawn()[1]);

        assert!(e.rollback_withdrawal(&w));
        assert!(!e.escrow().withdrawn()[1]);
        assert_eq!(e.escrow().balance(), Amount::new(100_000));
    }

    #[test]
    fn view_reflects_state() {
        let e = epoch();
        let view = e.view(at(START - 1));
        assert_eq!(view.phase, EpochPhase::Scheduled);
        assert_eq!(view.reward_rate_per_unit, Amount::new(10));
        assert_eq!(view.commitments.len(), 3);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["phase"], "scheduled");
    }
}
