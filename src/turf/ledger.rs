//! Ownership of queue ranges.
//!
//! ## Data Structure
//!
//! ```text
//! turfs: BTreeMap<start, Turf>     disjoint half-open ranges
//!
//!   [1000 ─── A ─── 1250)[1250 ── B ── 1750)[1750 ── A ── 2000)
//! ```
//!
//! A transfer of part of a Turf splits it into at most three pieces:
//! the prefix stays with the owner under the original key, the middle
//! moves to the recipient, and the suffix stays with the owner under a
//! new key. The union of the ranges never changes.
//!
//! ## Allowances
//!
//! An owner may approve a spender for a number of queue units. Delegated
//! transfers draw the allowance down by the transferred length.

use std::collections::{BTreeMap, HashMap};

use crate::error::MarketError;
use crate::types::{is_reserved, AccountId, QueuePosition, NULL_ACCOUNT};

/// A contiguous range `[start, start + length)` owned by one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Turf {
    pub owner: AccountId,
    pub start: QueuePosition,
    pub length: u64,
}

impl Turf {
    #[inline]
    pub fn end(&self) -> QueuePosition {
        self.start + self.length
    }

    #[inline]
    pub fn contains(&self, position: QueuePosition) -> bool {
        position >= self.start && position < self.end()
    }
}

/// The Turfs that replace a source Turf after part of it changes hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSplit {
    /// Units before the moved range, kept by the previous owner.
    pub prefix: Option<Turf>,
    /// The transferred range, now owned by the recipient.
    pub moved: Turf,
    /// Units after the moved range, kept by the previous owner.
    pub suffix: Option<Turf>,
}

impl RangeSplit {
    pub fn pieces(&self) -> impl Iterator<Item = &Turf> {
        self.prefix.iter().chain(std::iter::once(&self.moved)).chain(self.suffix.iter())
    }
}

/// Account → disjoint queue ranges, plus delegated-transfer allowances.
#[derive(Debug, Clone, Default)]
pub struct TurfLedger {
    turfs: BTreeMap<QueuePosition, Turf>,
    allowances: HashMap<(AccountId, AccountId), u64>,
}

impl TurfLedger {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Turf keyed exactly at `start`.
    pub fn turf_at(&self, start: QueuePosition) -> Option<&Turf> {
        self.turfs.get(&start)
    }

    /// Turf containing `position`, wherever it starts.
    pub fn covering(&self, position: QueuePosition) -> Option<&Turf> {
        self.turfs
            .range(..=position)
            .next_back()
            .map(|(_, turf)| turf)
            .filter(|turf| turf.contains(position))
    }

    /// True when `account` owns every unit of `[start, end)` inside a
    /// single Turf.
    pub fn owns_range(&self, account: AccountId, start: QueuePosition, end: QueuePosition) -> bool {
        match self.covering(start) {
            Some(turf) => turf.owner == account && end > start && end <= turf.end(),
            None => false,
        }
    }

    pub fn turfs_of(&self, account: AccountId) -> Vec<Turf> {
        self.turfs.values().filter(|t| t.owner == account).copied().collect()
    }

    pub fn total_owned(&self, account: AccountId) -> u64 {
        self.turfs
            .values()
            .filter(|t| t.owner == account)
            .map(|t| t.length)
            .sum()
    }

    /// All Turfs in queue order.
    pub fn iter(&self) -> impl Iterator<Item = &Turf> {
        self.turfs.values()
    }

    pub fn len(&self) -> usize {
        self.turfs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turfs.is_empty()
    }

    pub fn allowance(&self, owner: AccountId, spender: AccountId) -> u64 {
        self.allowances.get(&(owner, spender)).copied().unwrap_or(0)
    }

    // ========================================================================
    // Issuance
    // ========================================================================

    /// Create a new Turf. Entry point for the queue ledger.
    pub fn issue(&mut self, account: AccountId, start: QueuePosition, length: u64) -> Result<Turf, MarketError> {
        if account == NULL_ACCOUNT {
            return Err(MarketError::NullRecipient);
        }
        if is_reserved(account) {
            return Err(MarketError::ReservedAccount(account));
        }
        if length == 0 {
            return Err(MarketError::ZeroLength);
        }
        let end = start
            .checked_add(length)
            .ok_or(MarketError::RangeOverflow { start, length })?;

        let overlaps_previous = self
            .turfs
            .range(..end)
            .next_back()
            .is_some_and(|(_, turf)| turf.end() > start);
        if overlaps_previous {
            return Err(MarketError::OverlappingTurf { start, end });
        }

        let turf = Turf { owner: account, start, length };
        self.turfs.insert(start, turf);
        Ok(turf)
    }

    // ========================================================================
    // Transfers
    // ========================================================================

    /// Check that `owner` holds `[range_start + offset, +length)` inside the
    /// Turf keyed at `range_start`.
    pub fn check_range(
        &self,
        owner: AccountId,
        range_start: QueuePosition,
        offset: u64,
        length: u64,
    ) -> Result<&Turf, MarketError> {
        if length == 0 {
            return Err(MarketError::ZeroLength);
        }
        let turf = self
            .turf_at(range_start)
            .filter(|turf| turf.owner == owner)
            .ok_or(MarketError::NotOwner { account: owner, position: range_start })?;

        let span = offset.checked_add(length).ok_or(MarketError::RangeOverflow {
            start: range_start.saturating_add(offset),
            length,
        })?;
        if span > turf.length {
            return Err(MarketError::RangeExceedsTurf {
                start: range_start.saturating_add(offset),
                end: range_start.saturating_add(span),
                turf_length: turf.length,
            });
        }
        Ok(turf)
    }

    /// Validate a transfer and compute the resulting split without applying it.
    pub fn plan_transfer(
        &self,
        owner: AccountId,
        recipient: AccountId,
        range_start: QueuePosition,
        offset: u64,
        length: u64,
    ) -> Result<RangeSplit, MarketError> {
        if recipient == NULL_ACCOUNT {
            return Err(MarketError::NullRecipient);
        }
        if let Some(account) = [owner, recipient].into_iter().find(|a| is_reserved(*a)) {
            return Err(MarketError::ReservedAccount(account));
        }
        if owner == recipient {
            return Err(MarketError::SelfTransfer(owner));
        }
        let turf = self.check_range(owner, range_start, offset, length)?;

        let moved_start = turf.start + offset;
        let moved_end = moved_start + length;
        let prefix = (offset > 0).then_some(Turf { owner, start: turf.start, length: offset });
        let suffix = (moved_end < turf.end()).then_some(Turf {
            owner,
            start: moved_end,
            length: turf.end() - moved_end,
        });

        Ok(RangeSplit {
            prefix,
            moved: Turf { owner: recipient, start: moved_start, length },
            suffix,
        })
    }

    /// Apply a split produced by [`plan_transfer`](Self::plan_transfer).
    ///
    /// The source Turf is keyed at the first piece's start, so inserting
    /// every piece replaces it.
    pub fn apply(&mut self, split: &RangeSplit) {
        for turf in split.pieces() {
            self.turfs.insert(turf.start, *turf);
        }
    }

    pub fn transfer(
        &mut self,
        owner: AccountId,
        recipient: AccountId,
        range_start: QueuePosition,
        offset: u64,
        length: u64,
    ) -> Result<RangeSplit, MarketError> {
        let split = self.plan_transfer(owner, recipient, range_start, offset, length)?;
        self.apply(&split);
        Ok(split)
    }

    /// Set the number of queue units `spender` may move on `owner`'s behalf.
    pub fn approve(&mut self, owner: AccountId, spender: AccountId, length: u64) -> Result<(), MarketError> {
        if spender == NULL_ACCOUNT {
            return Err(MarketError::NullRecipient);
        }
        if let Some(account) = [owner, spender].into_iter().find(|a| is_reserved(*a)) {
            return Err(MarketError::ReservedAccount(account));
        }
        if length == 0 {
            self.allowances.remove(&(owner, spender));
        } else {
            self.allowances.insert((owner, spender), length);
        }
        Ok(())
    }

    /// Validate a delegated transfer. An owner moving its own range needs
    /// no allowance.
    pub fn plan_transfer_from(
        &self,
        spender: AccountId,
        owner: AccountId,
        recipient: AccountId,
        range_start: QueuePosition,
        offset: u64,
        length: u64,
    ) -> Result<RangeSplit, MarketError> {
        if spender != owner {
            let allowed = self.allowance(owner, spender);
            if allowed < length {
                return Err(MarketError::InsufficientAllowance { allowed, requested: length });
            }
        }
        self.plan_transfer(owner, recipient, range_start, offset, length)
    }

    /// Delegated transfer, drawing down the spender's allowance.
    pub fn transfer_from(
        &mut self,
        spender: AccountId,
        owner: AccountId,
        recipient: AccountId,
        range_start: QueuePosition,
        offset: u64,
        length: u64,
    ) -> Result<RangeSplit, MarketError> {
        let split = self.plan_transfer_from(spender, owner, recipient, range_start, offset, length)?;
        if spender != owner {
            let remaining = self.allowance(owner, spender) - length;
            self.approve(owner, spender, remaining)?;
        }
        self.apply(&split);
        Ok(split)
    }

    /// Join the Turf at `start` with the Turf that begins where it ends.
    pub fn merge(&mut self, owner: AccountId, start: QueuePosition) -> Result<Turf, MarketError> {
        let first = *self
            .turf_at(start)
            .filter(|turf| turf.owner == owner)
            .ok_or(MarketError::NotOwner { account: owner, position: start })?;
        let second_start = first.end();
        let second = self
            .turf_at(second_start)
            .filter(|turf| turf.owner == owner)
            .copied()
            .ok_or(MarketError::NotMergeable { first: start, second: second_start })?;

        let merged = Turf {
            owner,
            start,
            length: first.length + second.length,
        };
        self.turfs.remove(&second_start);
        self.turfs.insert(start, merged);
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ESCROW_ACCOUNT;

    const ALICE: AccountId = 1;
    const BOB: AccountId = 2;
    const CAROL: AccountId = 3;

    fn ledger() -> TurfLedger {
        let mut ledger = TurfLedger::new();
        ledger.issue(ALICE, 1_000, 1_000).unwrap();
        ledger
    }

    #[test]
    fn test_issue_rejects_overlap() {
        let mut ledger = ledger();
        assert_eq!(
            ledger.issue(BOB, 1_999, 10),
            Err(MarketError::OverlappingTurf { start: 1_999, end: 2_009 })
        );
        assert_eq!(
            ledger.issue(BOB, 500, 501),
            Err(MarketError::OverlappingTurf { start: 500, end: 1_001 })
        );
        assert!(ledger.issue(BOB, 2_000, 10).is_ok());
        assert!(ledger.issue(BOB, 500, 500).is_ok());
        assert_eq!(ledger.issue(NULL_ACCOUNT, 5_000, 1), Err(MarketError::NullRecipient));
        assert_eq!(ledger.issue(BOB, 5_000, 0), Err(MarketError::ZeroLength));
        assert_eq!(
            ledger.issue(ESCROW_ACCOUNT, 5_000, 1),
            Err(MarketError::ReservedAccount(ESCROW_ACCOUNT))
        );
        assert_eq!(
            ledger.issue(BOB, u64::MAX, 2),
            Err(MarketError::RangeOverflow { start: u64::MAX, length: 2 })
        );
    }

    #[test]
    fn test_transfer_middle_splits_three_ways() {
        let mut ledger = ledger();
        let split = ledger.transfer(ALICE, BOB, 1_000, 250, 500).unwrap();

        assert_eq!(split.prefix, Some(Turf { owner: ALICE, start: 1_000, length: 250 }));
        assert_eq!(split.moved, Turf { owner: BOB, start: 1_250, length: 500 });
        assert_eq!(split.suffix, Some(Turf { owner: ALICE, start: 1_750, length: 250 }));

        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.total_owned(ALICE), 500);
        assert_eq!(ledger.total_owned(BOB), 500);
        assert_eq!(ledger.covering(1_600).unwrap().owner, BOB);
        assert!(ledger.owns_range(ALICE, 1_750, 2_000));
    }

    #[test]
    fn test_transfer_whole_and_edges() {
        let mut ledger = ledger();
        let split = ledger.transfer(ALICE, BOB, 1_000, 0, 100).unwrap();
        assert_eq!(split.prefix, None);
        assert!(split.suffix.is_some());

        let split = ledger.transfer(ALICE, BOB, 1_100, 800, 100).unwrap();
        assert!(split.prefix.is_some());
        assert_eq!(split.suffix, None);

        let split = ledger.transfer(BOB, CAROL, 1_000, 0, 100).unwrap();
        assert_eq!(split.prefix, None);
        assert_eq!(split.suffix, None);
        assert_eq!(ledger.turf_at(1_000).unwrap().owner, CAROL);
    }

    #[test]
    fn test_transfer_rejections() {
        let ledger = ledger();
        assert_eq!(
            ledger.plan_transfer(ALICE, BOB, 1_000, 900, 101),
            Err(MarketError::RangeExceedsTurf { start: 1_900, end: 2_001, turf_length: 1_000 })
        );
        assert_eq!(
            ledger.plan_transfer(BOB, CAROL, 1_000, 0, 1),
            Err(MarketError::NotOwner { account: BOB, position: 1_000 })
        );
        assert_eq!(
            ledger.plan_transfer(ALICE, BOB, 1_001, 0, 1),
            Err(MarketError::NotOwner { account: ALICE, position: 1_001 })
        );
        assert_eq!(ledger.plan_transfer(ALICE, ALICE, 1_000, 0, 1), Err(MarketError::SelfTransfer(ALICE)));
        assert_eq!(
            ledger.plan_transfer(ALICE, ESCROW_ACCOUNT, 1_000, 0, 1),
            Err(MarketError::ReservedAccount(ESCROW_ACCOUNT))
        );
        assert_eq!(ledger.plan_transfer(ALICE, NULL_ACCOUNT, 1_000, 0, 1), Err(MarketError::NullRecipient));
        assert_eq!(ledger.plan_transfer(ALICE, BOB, 1_000, 0, 0), Err(MarketError::ZeroLength));
    }

    #[test]
    fn test_allowance_drawdown() {
        let mut ledger = ledger();
        ledger.approve(ALICE, BOB, 300).unwrap();

        ledger.transfer_from(BOB, ALICE, CAROL, 1_000, 0, 200).unwrap();
        assert_eq!(ledger.allowance(ALICE, BOB), 100);

        assert_eq!(
            ledger.transfer_from(BOB, ALICE, CAROL, 1_200, 0, 101),
            Err(MarketError::InsufficientAllowance { allowed: 100, requested: 101 })
        );
        assert_eq!(ledger.total_owned(CAROL), 200);

        ledger.transfer_from(BOB, ALICE, CAROL, 1_200, 0, 100).unwrap();
        assert_eq!(ledger.allowance(ALICE, BOB), 0);
        assert_eq!(
            ledger.approve(ALICE, ESCROW_ACCOUNT, 1),
            Err(MarketError::ReservedAccount(ESCROW_ACCOUNT))
        );
    }

    #[test]
    fn test_merge() {
        let mut ledger = ledger();
        ledger.transfer(ALICE, BOB, 1_000, 250, 500).unwrap();
        assert_eq!(
            ledger.merge(ALICE, 1_000),
            Err(MarketError::NotMergeable { first: 1_000, second: 1_250 })
        );

        ledger.transfer(BOB, ALICE, 1_250, 0, 500).unwrap();
        let merged = ledger.merge(ALICE, 1_000).unwrap();
        assert_eq!(merged.length, 750);
        let merged = ledger.merge(ALICE, 1_000).unwrap();
        assert_eq!(merged, Turf { owner: ALICE, start: 1_000, length: 1_000 });
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_covering_gaps() {
        let mut ledger = ledger();
        ledger.issue(BOB, 3_000, 10).unwrap();
        assert!(ledger.covering(999).is_none());
        assert!(ledger.covering(2_000).is_none());
        assert_eq!(ledger.covering(3_009).unwrap().owner, BOB);
        assert!(ledger.covering(3_010).is_none());
    }
}
