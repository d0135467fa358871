//! User accounts and balances.
//!
//! Balances only ever move through atomic increments on the book, never a
//! read-modify-write by the caller, so a placement and a settlement touching
//! the same user cannot lose an update.

use crate::types::{Amount, Timestamp, UserId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Banned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: UserId,
    pub balance: Amount,
    pub status: AccountStatus,
    pub created_at: Timestamp,
}

impl Account {
    pub fn new(id: UserId, timestamp: Timestamp) -> Self {
        Self {
            id,
            balance: Amount::zero(),
            status: AccountStatus::Active,
            created_at: timestamp,
        }
    }

    pub fn is_banned(&self) -> bool {
        self.status == AccountStatus::Banned
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountError {
    #[error("User {0:?} not found")]
    NotFound(UserId),

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: Amount, available: Amount },
}

#[derive(Debug, Default)]
pub struct AccountBook {
    accounts: RwLock<HashMap<UserId, Account>>,
}

impl AccountBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, id: UserId, timestamp: Timestamp) -> Account {
        let account = Account::new(id, timestamp);
        self.accounts.write().entry(id).or_insert(account).clone()
    }

    pub fn get(&self, id: UserId) -> Option<Account> {
        self.accounts.read().get(&id).cloned()
    }

    pub fn contains(&self, id: UserId) -> bool {
        self.accounts.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.accounts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn balance(&self, id: UserId) -> Result<Amount, AccountError> {
        self.accounts.read().get(&id).map(|a| a.balance).ok_or(AccountError::NotFound(id))
    }

    pub fn set_status(&self, id: UserId, status: AccountStatus) -> Result<(), AccountError> {
        let mut accounts = self.accounts.write();
        let account = accounts.get_mut(&id).ok_or(AccountError::NotFound(id))?;
        account.status = status;
        Ok(())
    }

    /// Atomic increment. Returns the new balance.
    pub fn increment(&self, id: UserId, delta: Amount) -> Result<Amount, AccountError> {
        let mut accounts = self.accounts.write();
        let account = accounts.get_mut(&id).ok_or(AccountError::NotFound(id))?;
        account.balance = account.balance.add(delta);
        Ok(account.balance)
    }

    /// Atomic increment behind a balance floor checked under the same lock.
    pub fn increment_if_at_least(&self, id: UserId, min_balance: Option<Amount>, delta: Amount) -> Result<Amount, AccountError> {
        let mut accounts = self.accounts.write();
        let account = accounts.get_mut(&id).ok_or(AccountError::NotFound(id))?;
        if let Some(required) = min_balance {
            if account.balance < required {
                return Err(AccountError::InsufficientBalance {
                    required,
                    available: account.balance,
                });
            }
        }
        account.balance = account.balance.add(delta);
        Ok(account.balance)
    }

    /// Applies every delta or none: all users are checked before any balance moves.
    pub fn apply_batch(&self, deltas: &BTreeMap<UserId, Amount>) -> Result<(), AccountError> {
        let mut accounts = self.accounts.write();
        if let Some(missing) = deltas.keys().find(|id| !accounts.contains_key(id)) {
            return Err(AccountError::NotFound(*missing));
        }
        for (id, delta) in deltas {
            if let Some(account) = accounts.get_mut(id) {
                account.balance = account.balance.add(*delta);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn book_with(ids: &[u64], balance: rust_decimal::Decimal) -> AccountBook {
        let book = AccountBook::new();
        for &id in ids {
            book.open(UserId(id), Timestamp(0));
            book.increment(UserId(id), Amount::new(balance)).unwrap();
        }
        book
    }

    #[test]
    fn open_is_idempotent() {
        let book = book_with(&[1], dec!(100));
        let again = book.open(UserId(1), Timestamp(5));
        assert_eq!(again.balance.value(), dec!(100));
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn increment_unknown_user() {
        let book = AccountBook::new();
        assert_eq!(
            book.increment(UserId(9), Amount::new(dec!(1))),
            Err(AccountError::NotFound(UserId(9)))
        );
    }

    #[test]
    fn guarded_increment() {
        let book = book_with(&[1], dec!(500));
        assert!(matches!(
            book.increment_if_at_least(UserId(1), Some(Amount::new(dec!(600))), Amount::new(dec!(-10))),
            Err(AccountError::InsufficientBalance { .. })
        ));
        assert_eq!(book.balance(UserId(1)).unwrap().value(), dec!(500));

        let after = book
            .increment_if_at_least(UserId(1), Some(Amount::new(dec!(500))), Amount::new(dec!(-10)))
            .unwrap();
        assert_eq!(after.value(), dec!(490));
    }

    #[test]
    fn batch_is_all_or_nothing() {
        let book = book_with(&[1, 2], dec!(100));
        let mut deltas = BTreeMap::new();
        deltas.insert(UserId(1), Amount::new(dec!(50)));
        deltas.insert(UserId(3), Amount::new(dec!(50)));
        assert_eq!(book.apply_batch(&deltas), Err(AccountError::NotFound(UserId(3))));
        assert_eq!(book.balance(UserId(1)).unwrap().value(), dec!(100));

        deltas.remove(&UserId(3));
        deltas.insert(UserId(2), Amount::new(dec!(-30)));
        book.apply_batch(&deltas).unwrap();
        assert_eq!(book.balance(UserId(1)).unwrap().value(), dec!(150));
        assert_eq!(book.balance(UserId(2)).unwrap().value(), dec!(70));
    }

    #[test]
    fn ban_and_unban() {
        let book = book_with(&[1], dec!(0));
        book.set_status(UserId(1), AccountStatus::Banned).unwrap();
        assert!(book.get(UserId(1)).unwrap().is_banned());
        book.set_status(UserId(1), AccountStatus::Active).unwrap();
        assert!(!book.get(UserId(1)).unwrap().is_banned());
    }
}
