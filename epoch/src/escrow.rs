//! Escrowed funds, revealed totals and per-member withdrawal flags.
//!
//! The per-unit rate is fixed at scheduling as `floor(escrowed / 10000)`, so
//! `escrowed mod 10000` raw units are never paid out and stay in escrow.

use allot_types::{Address, Amount, BASIS_POINTS};
use serde::{Deserialize, Serialize};

use crate::error::{EpochError, TransferError};

/// Moves funds out of escrow to a member.
///
/// Called with no epoch lock held. Implementations may call back into the
/// store; a reentrant withdrawal observes the flag already set.
pub trait EscrowTransfer: Send + Sync {
    fn transfer(&self, to: &Address, amount: Amount) -> Result<(), TransferError>;
}

/// A debit taken from the ledger but not yet paid out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingPayout {
    pub index: usize,
    pub member: Address,
    pub amount: Amount,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowLedger {
    escrowed: Amount,
    balance: Amount,
    reward_rate_per_unit: Amount,
    revealed_allocations: Vec<u128>,
    withdrawn: Vec<bool>,
    revealed: bool,
}

impl EscrowLedger {
    pub fn fund(value: Amount, member_count: usize) -> Result<Self, EpochError> {
        if value.is_zero() {
            return Err(EpochError::InvalidFunding);
        }
        let reward_rate_per_unit = value
            .checked_div(BASIS_POINTS as u128)
            .ok_or(EpochError::InvalidFunding)?;
        Ok(Self {
            escrowed: value,
            balance: value,
            reward_rate_per_unit,
            revealed_allocations: vec![0; member_count],
            withdrawn: vec![false; member_count],
            revealed: false,
        })
    }

    pub fn escrowed(&self) -> Amount {
        self.escrowed
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }

    pub fn reward_rate_per_unit(&self) -> Amount {
        self.reward_rate_per_unit
    }

    pub fn revealed_allocations(&self) -> &[u128] {
        &self.revealed_allocations
    }

    pub fn withdrawn(&self) -> &[bool] {
        &self.withdrawn
    }

    pub fn is_revealed(&self) -> bool {
        self.revealed
    }

    /// Resize the per-member vectors to zero. Only meaningful before reveal.
    pub fn reset(&mut self, member_count: usize) {
        self.revealed_allocations = vec![0; member_count];
        self.withdrawn = vec![false; member_count];
    }

    /// Record the final totals. The caller has checked the length.
    pub fn reveal(&mut self, totals: Vec<u128>) {
        self.revealed_allocations = totals;
        self.revealed = true;
    }

    pub fn payout_for(&self, index: usize) -> Result<Amount, EpochError> {
        let units = self.revealed_allocations.get(index).copied().unwrap_or(0);
        self.reward_rate_per_unit
            .checked_mul(units)
            .ok_or(EpochError::PayoutOverflow { units })
    }

    /// Total owed if every member withdrew, or `None` on overflow.
    pub fn total_owed(&self) -> Option<Amount> {
        self.revealed_allocations
            .iter()
            .try_fold(Amount::ZERO, |acc, &units| {
                acc.checked_add(self.reward_rate_per_unit.checked_mul(units)?)
            })
    }

    /// Set the withdrawn flag and debit the balance in one step.
    pub fn debit(&mut self, index: usize, member: Address) -> Result<PendingPayout, EpochError> {
        if self.withdrawn.get(index).copied().unwrap_or(true) {
            return Err(EpochError::AlreadyWithdrawn(member));
        }
        let amount = self.payout_for(index)?;
        let balance = self
            .balance
            .checked_sub(amount)
            .ok_or(EpochError::InsufficientEscrow {
                needed: amount,
                available: self.balance,
            })?;
        self.balance = balance;
        self.withdrawn[index] = true;
        Ok(PendingPayout {
            index,
            member,
            amount,
        })
    }

    /// Undo a debit whose transfer failed.
    pub fn restore(&mut self, payout: &PendingPayout) {
        if let Some(flag) = self.withdrawn.get_mut(payout.index) {
            *flag = false;
            self.balance = self.balance.saturating_add(payout.amount);
        }
    }
}
