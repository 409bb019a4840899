//! Settlement interface: moving funds between accounts.
//!
//! Token custody lives outside the market. The market only asks how much
//! an account can spend and then moves an exact amount. Every account has
//! an external wallet and an internal balance; [`SettlementMode`] picks
//! which one is debited or credited.

use std::collections::HashMap;

use crate::error::SettlementError;
use crate::types::{AccountId, Amount};

/// Where funds are taken from (or delivered to).
///
/// Represented as u8 for commitment encoding:
/// - ExternalWallet = 0
/// - InternalBalance = 1
/// - InternalTolerant = 2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SettlementMode {
    /// The account's external wallet.
    #[default]
    ExternalWallet,
    /// The internal balance; insufficient balance fails.
    InternalBalance,
    /// The internal balance; a debit clamps to what is available.
    /// As a destination this behaves like `InternalBalance`.
    InternalTolerant,
}

impl SettlementMode {
    pub fn to_u8(self) -> u8 {
        match self {
            SettlementMode::ExternalWallet => 0,
            SettlementMode::InternalBalance => 1,
            SettlementMode::InternalTolerant => 2,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(SettlementMode::ExternalWallet),
            1 => Some(SettlementMode::InternalBalance),
            2 => Some(SettlementMode::InternalTolerant),
            _ => None,
        }
    }

    #[inline]
    pub fn is_tolerant(self) -> bool {
        self == SettlementMode::InternalTolerant
    }

    #[inline]
    pub fn is_internal(self) -> bool {
        self != SettlementMode::ExternalWallet
    }
}

/// Custody backend consumed by the market.
pub trait Settlement {
    /// Amount `account` can pay from the source selected by `mode`.
    fn spendable(&self, account: AccountId, mode: SettlementMode) -> Amount;

    /// Debit `from` per `from_mode` and credit `to` per `to_mode`.
    ///
    /// Returns the amount actually moved: exactly `amount` for strict
    /// modes, possibly less under `InternalTolerant`. On error nothing
    /// moves.
    fn move_funds(
        &mut self,
        from: AccountId,
        to: AccountId,
        amount: Amount,
        from_mode: SettlementMode,
        to_mode: SettlementMode,
    ) -> Result<Amount, SettlementError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Balance {
    external: Amount,
    internal: Amount,
}

impl Balance {
    fn bucket(&self, mode: SettlementMode) -> Amount {
        if mode.is_internal() {
            self.internal
        } else {
            self.external
        }
    }

    fn bucket_mut(&mut self, mode: SettlementMode) -> &mut Amount {
        if mode.is_internal() {
            &mut self.internal
        } else {
            &mut self.external
        }
    }
}

/// In-memory custody with per-account external and internal balances.
///
/// ## Example
///
/// ```
/// use casual_market::external::{InMemorySettlement, Settlement, SettlementMode};
///
/// let mut bank = InMemorySettlement::new();
/// bank.deposit_internal(1, 100);
///
/// let moved = bank
///     .move_funds(1, 2, 150, SettlementMode::InternalTolerant, SettlementMode::ExternalWallet)
///     .unwrap();
/// assert_eq!(moved, 100);
/// assert_eq!(bank.external_balance(2), 100);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemorySettlement {
    balances: HashMap<AccountId, Balance>,
}

impl InMemorySettlement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deposit_external(&mut self, account: AccountId, amount: Amount) {
        let balance = self.balances.entry(account).or_default();
        balance.external = balance.external.saturating_add(amount);
    }

    pub fn deposit_internal(&mut self, account: AccountId, amount: Amount) {
        let balance = self.balances.entry(account).or_default();
        balance.internal = balance.internal.saturating_add(amount);
    }

    pub fn external_balance(&self, account: AccountId) -> Amount {
        self.balances.get(&account).map_or(0, |b| b.external)
    }

    pub fn internal_balance(&self, account: AccountId) -> Amount {
        self.balances.get(&account).map_or(0, |b| b.internal)
    }

    /// Sum of both buckets for `account`.
    pub fn total_balance(&self, account: AccountId) -> Amount {
        self.external_balance(account)
            .saturating_add(self.internal_balance(account))
    }
}

impl Settlement for InMemorySettlement {
    fn spendable(&self, account: AccountId, mode: SettlementMode) -> Amount {
        self.balances
            .get(&account)
            .map_or(0, |b| b.bucket(mode))
    }

    fn move_funds(
        &mut self,
        from: AccountId,
        to: AccountId,
        amount: Amount,
        from_mode: SettlementMode,
        to_mode: SettlementMode,
    ) -> Result<Amount, SettlementError> {
        let available = self.spendable(from, from_mode);
        let moved = if from_mode.is_tolerant() {
            amount.min(available)
        } else if available < amount {
            return Err(SettlementError::InsufficientBalance {
                account: from,
                required: amount,
                available,
            });
        } else {
            amount
        };

        let same_bucket = from == to && from_mode.is_internal() == to_mode.is_internal();
        if !same_bucket {
            self.spendable(to, to_mode)
                .checked_add(moved)
                .ok_or(SettlementError::Overflow { account: to })?;
        }

        let source = self.balances.entry(from).or_default();
        *source.bucket_mut(from_mode) -= moved;
        let destination = self.balances.entry(to).or_default();
        *destination.bucket_mut(to_mode) += moved;

        Ok(moved)
    }
}
