//! Nullable escrow transfer: record payouts without moving funds.

use allot_epoch::{EscrowTransfer, TransferError};
use allot_types::{Address, Amount};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Records every payout. Can be switched to fail.
#[derive(Debug, Default)]
pub struct NullTransfer {
    transfers: Mutex<Vec<(Address, Amount)>>,
    failing: AtomicBool,
}

impl NullTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transfer that rejects every payout.
    pub fn failing() -> Self {
        let transfer = Self::default();
        transfer.set_failing(true);
        transfer
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// All successful payouts, in order (for assertions).
    pub fn transfers(&self) -> Vec<(Address, Amount)> {
        self.transfers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Sum paid to `to`.
    pub fn total_to(&self, to: &Address) -> Amount {
        self.transfers()
            .iter()
            .filter(|(addr, _)| addr == to)
            .fold(Amount::ZERO, |acc, (_, amount)| acc.saturating_add(*amount))
    }

    /// Clear all state.
    pub fn reset(&self) {
        self.transfers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
        self.set_failing(false);
    }
}

impl EscrowTransfer for NullTransfer {
    fn transfer(&self, to: &Address, amount: Amount) -> Result<(), TransferError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransferError::Rejected(format!("null transfer to {to} disabled")));
        }
        self.transfers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((*to, amount));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_fails_on_demand() {
        let t = NullTransfer::new();
        t.transfer(&Address::repeat(1), Amount::new(5)).unwrap();
        t.transfer(&Address::repeat(1), Amount::new(7)).unwrap();
        assert_eq!(t.total_to(&Address::repeat(1)), Amount::new(12));

        t.set_failing(true);
        assert!(t.transfer(&Address::repeat(2), Amount::new(1)).is_err());
        assert_eq!(t.transfers().len(), 2);

        t.reset();
        assert!(t.transfers().is_empty());
    }
}
