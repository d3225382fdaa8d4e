//! Host seams: the clock and the value ledger.
//!
//! The machines never read wall-clock time or move value directly; both
//! go through these traits so that tests and embedders control them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use htlc_types::{Address, Amount, Timestamp};

use crate::error::ValueError;

/// Source of "now" for deadline checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time in unix seconds.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    secs: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            secs: AtomicU64::new(start.as_secs()),
        }
    }

    pub fn set(&self, now: Timestamp) {
        self.secs.store(now.as_secs(), Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        let _ = self
            .secs
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |s| Some(s.saturating_add(secs)));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_secs(self.secs.load(Ordering::SeqCst))
    }
}

/// Balances that escrow value moves between.
///
/// A failed `debit` or `credit` must leave every balance unchanged.
pub trait ValueLedger: Send + Sync {
    /// Take `amount` from `account`.
    fn debit(&self, account: &Address, amount: Amount) -> Result<(), ValueError>;

    /// Give `amount` to `account`.
    fn credit(&self, account: &Address, amount: Amount) -> Result<(), ValueError>;

    fn balance(&self, account: &Address) -> Result<Amount, ValueError>;
}

/// `HashMap`-backed value ledger.
#[derive(Debug, Default)]
pub struct InMemoryValueLedger {
    balances: RwLock<HashMap<Address, Amount>>,
}

impl InMemoryValueLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint `amount` into `account`.
    pub fn fund(&self, account: Address, amount: Amount) -> Result<(), ValueError> {
        self.credit(&account, amount)
    }

    /// Sum of all balances.
    pub fn total(&self) -> Result<Amount, ValueError> {
        let balances = self.balances.read().map_err(|_| ValueError::LockPoisoned)?;
        Ok(balances.values().fold(0, |acc: Amount, b| acc.saturating_add(*b)))
    }
}

impl ValueLedger for InMemoryValueLedger {
    fn debit(&self, account: &Address, amount: Amount) -> Result<(), ValueError> {
        let mut balances = self.balances.write().map_err(|_| ValueError::LockPoisoned)?;
        let available = balances.get(account).copied().unwrap_or(0);
        let remaining = available
            .checked_sub(amount)
            .ok_or(ValueError::InsufficientFunds {
                account: *account,
                needed: amount,
                available,
            })?;
        balances.insert(*account, remaining);
        Ok(())
    }

    fn credit(&self, account: &Address, amount: Amount) -> Result<(), ValueError> {
        let mut balances = self.balances.write().map_err(|_| ValueError::LockPoisoned)?;
        let current = balances.get(account).copied().unwrap_or(0);
        let updated = current
            .checked_add(amount)
            .ok_or(ValueError::BalanceOverflow { account: *account })?;
        balances.insert(*account, updated);
        Ok(())
    }

    fn balance(&self, account: &Address) -> Result<Amount, ValueError> {
        let balances = self.balances.read().map_err(|_| ValueError::LockPoisoned)?;
        Ok(balances.get(account).copied().unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_only_on_request() {
        let clock = ManualClock::new(Timestamp::from_secs(100));
        assert_eq!(clock.now(), Timestamp::from_secs(100));
        clock.advance(50);
        assert_eq!(clock.now(), Timestamp::from_secs(150));
        clock.set(Timestamp::from_secs(10));
        assert_eq!(clock.now(), Timestamp::from_secs(10));
        clock.set(Timestamp::from_secs(u64::MAX));
        clock.advance(1);
        assert_eq!(clock.now().as_secs(), u64::MAX);
    }

    #[test]
    fn debit_and_credit() {
        let ledger = InMemoryValueLedger::new();
        let alice = Address::from_label("alice");
        ledger.fund(alice, 100).unwrap();

        ledger.debit(&alice, 40).unwrap();
        assert_eq!(ledger.balance(&alice).unwrap(), 60);

        let err = ledger.debit(&alice, 61).unwrap_err();
        assert_eq!(
            err,
            ValueError::InsufficientFunds {
                account: alice,
                needed: 61,
                available: 60,
            }
        );
        assert_eq!(ledger.balance(&alice).unwrap(), 60);
        assert_eq!(ledger.total().unwrap(), 60);
    }

    #[test]
    fn credit_overflow_leaves_balance() {
        let ledger = InMemoryValueLedger::new();
        let bob = Address::from_label("bob");
        ledger.fund(bob, Amount::MAX).unwrap();
        assert!(matches!(
            ledger.credit(&bob, 1),
            Err(ValueError::BalanceOverflow { .. })
        ));
        assert_eq!(ledger.balance(&bob).unwrap(), Amount::MAX);
    }

    #[test]
    fn unknown_account_has_zero_balance() {
        let ledger = InMemoryValueLedger::new();
        assert_eq!(ledger.balance(&Address::from_label("nobody")).unwrap(), 0);
    }
}
