//! Runs one epoch end to end on a deterministic clock.

use std::sync::Arc;

use allot_coordinator::Coordinator;
use allot_epoch::{EpochParams, EpochPhase, EpochStore};
use allot_nullables::{NullClock, NullTransfer};
use allot_proof::{AllocationWitness, TransparentProofSystem};
use allot_types::{Address, Amount, CommitmentHash, Timestamp};
use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::config::SimulationConfig;

#[derive(Debug, Serialize)]
pub struct MemberSettlement {
    pub address: Address,
    pub commitment: CommitmentHash,
    pub revealed_units: u128,
    pub paid: Amount,
}

#[derive(Debug, Serialize)]
pub struct Settlement {
    pub admin: Address,
    pub coordinator: Address,
    pub phase: EpochPhase,
    pub escrowed: Amount,
    pub reward_rate_per_unit: Amount,
    pub members: Vec<MemberSettlement>,
    pub remaining_escrow: Amount,
}

/// Schedule, commit, prove, reveal and collect for every configured member.
pub fn run(config: &SimulationConfig, setup_key: [u8; 32], start: Timestamp) -> Result<Settlement> {
    config.validate()?;
    let admin = config.epoch.admin;
    let coordinator_id = config.epoch.coordinator;
    let escrow = config.escrow_amount()?;

    let clock = Arc::new(NullClock::new(start.as_secs()));
    let prover = Arc::new(TransparentProofSystem::new(setup_key));
    let transfer = Arc::new(NullTransfer::new());
    let store = Arc::new(EpochStore::new(prover.clone(), transfer.clone(), clock.clone()));

    let starts_at = start.plus(config.epoch.starts_in_secs);
    let params = EpochParams {
        members: config.members.iter().map(|m| m.address).collect(),
        starts_at,
        duration_secs: config.epoch.duration_secs,
        coordinator: coordinator_id,
    };
    store
        .schedule_epoch(&admin, params, escrow)
        .context("scheduling epoch")?;

    clock.set(starts_at.as_secs());
    let coordinator = Coordinator::new(coordinator_id, admin, prover, store.clone());
    for member in &config.members {
        let salt = match member.salt_bytes()? {
            Some(salt) => salt,
            None => random_bytes()?,
        };
        let witness = AllocationWitness::from_slice(salt, &member.allocations)?;
        store
            .update_commitment(&member.address, &admin, witness.commitment())
            .with_context(|| format!("committing for {}", member.address))?;
        coordinator
            .admit_allocation(&member.address, witness)
            .with_context(|| format!("admitting allocation of {}", member.address))?;
    }

    clock.advance(config.epoch.duration_secs);
    let values = coordinator.reveal().context("revealing allocations")?;

    let commitments = store.commitments(&admin)?;
    let mut members = Vec::with_capacity(config.members.len());
    for ((member, units), commitment) in config.members.iter().zip(values).zip(commitments) {
        let paid = store
            .collect_reward(&member.address, &admin)
            .with_context(|| format!("collecting reward for {}", member.address))?;
        members.push(MemberSettlement {
            address: member.address,
            commitment,
            revealed_units: units,
            paid,
        });
    }

    let view = store.snapshot(&admin)?;
    info!(
        admin = %admin,
        members = members.len(),
        paid_out = transfer.transfers().len(),
        remaining = %view.balance,
        "simulation settled"
    );
    Ok(Settlement {
        admin,
        coordinator: coordinator_id,
        phase: view.phase,
        escrowed: view.escrowed,
        reward_rate_per_unit: view.reward_rate_per_unit,
        members,
        remaining_escrow: view.balance,
    })
}

pub fn random_bytes() -> Result<[u8; 32]> {
    let mut bytes = [0u8; 32];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| anyhow::anyhow!("reading system randomness: {e}"))?;
    Ok(bytes)
}
