//! Buy-side order book.
//!
//! ## Storage
//!
//! ```text
//! escrows: BTreeMap<OrderKey, Amount>
//! ```
//!
//! An order's terms are hashed into its key; the book stores only how
//! much of its escrow is left. Each fill releases the cost of the sold
//! range to the filler and the entry disappears when the escrow reaches
//! zero.

use std::collections::BTreeMap;

use crate::config::MarketConfig;
use crate::error::MarketError;
use crate::turf::{RangeSplit, TurfLedger};
use crate::types::{is_reserved, AccountId, Amount, CasualOrder, OrderKey, QueuePosition, NULL_ACCOUNT};

/// Everything an order fill will change, computed before any mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderFillPlan {
    pub key: OrderKey,
    pub position: QueuePosition,
    pub length: u64,
    pub cost: Amount,
    pub remaining_escrow: Amount,
    pub split: RangeSplit,
}

/// Arguments identifying the range a filler sells into an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillRange {
    pub range_start: QueuePosition,
    pub offset: u64,
    pub length: u64,
}

#[derive(Debug, Clone, Default)]
pub struct OrderBook {
    escrows: BTreeMap<OrderKey, Amount>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining escrow for `key`, 0 when absent.
    pub fn escrow(&self, key: &OrderKey) -> Amount {
        self.escrows.get(key).copied().unwrap_or(0)
    }

    pub fn contains(&self, key: &OrderKey) -> bool {
        self.escrows.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.escrows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.escrows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OrderKey, &Amount)> {
        self.escrows.iter()
    }

    /// Total escrow held across all orders.
    pub fn total_escrow(&self) -> Amount {
        self.escrows.values().fold(0, |acc, v| acc.saturating_add(*v))
    }

    // ========================================================================
    // Creation
    // ========================================================================

    /// Validate the order terms and return its key.
    pub fn check_create(&self, order: &CasualOrder, config: &MarketConfig) -> Result<OrderKey, MarketError> {
        if order.buyer == NULL_ACCOUNT {
            return Err(MarketError::NullRecipient);
        }
        if is_reserved(order.buyer) {
            return Err(MarketError::ReservedAccount(order.buyer));
        }
        order.pricing.validate(config)?;
        order.key()
    }

    /// Store `amount` as the escrow for `key`, returning the escrow it
    /// replaces.
    pub fn deposit(&mut self, key: OrderKey, amount: Amount) -> Option<Amount> {
        self.escrows.insert(key, amount)
    }

    // ========================================================================
    // Fill
    // ========================================================================

    /// Check that `filler` may sell `range` into `order` and price it.
    pub fn plan_fill(
        &self,
        order: &CasualOrder,
        filler: AccountId,
        range: FillRange,
        ledger: &TurfLedger,
        frontier: QueuePosition,
        price_scale: u128,
    ) -> Result<OrderFillPlan, MarketError> {
        let key = order.key()?;
        let escrow = *self
            .escrows
            .get(&key)
            .ok_or_else(|| MarketError::OrderNotFound { key: key.to_hex() })?;

        if range.length == 0 {
            return Err(MarketError::ZeroLength);
        }
        let position = range
            .range_start
            .checked_add(range.offset)
            .ok_or(MarketError::RangeOverflow {
                start: range.range_start,
                length: range.offset,
            })?;
        if position > order.max_queue_position {
            return Err(MarketError::TooFarInQueue {
                position,
                max: order.max_queue_position,
            });
        }
        if position < frontier {
            return Err(MarketError::AlreadyRedeemable { position, frontier });
        }
        if range.length < order.min_fill_length {
            return Err(MarketError::BelowMinimumFill {
                filled: range.length,
                minimum: order.min_fill_length,
            });
        }

        let split = ledger.plan_transfer(filler, order.buyer, range.range_start, range.offset, range.length)?;

        let cost = order.pricing.cost(position - frontier, range.length, price_scale);
        if cost > escrow {
            return Err(MarketError::EscrowExhausted {
                required: cost,
                remaining: escrow,
            });
        }

        Ok(OrderFillPlan {
            key,
            position,
            length: range.length,
            cost,
            remaining_escrow: escrow - cost,
            split,
        })
    }

    /// Decrement the escrow, removing the order once it is spent.
    pub fn commit_fill(&mut self, plan: &OrderFillPlan) {
        if plan.remaining_escrow == 0 {
            self.escrows.remove(&plan.key);
        } else {
            self.escrows.insert(plan.key, plan.remaining_escrow);
        }
    }

    // ========================================================================
    // Cancel
    // ========================================================================

    /// Check that `caller` may cancel `order`; returns its key and escrow.
    pub fn check_cancel(&self, order: &CasualOrder, caller: AccountId) -> Result<(OrderKey, Amount), MarketError> {
        if order.buyer != caller {
            return Err(MarketError::NotBuyer { account: caller });
        }
        let key = order.key()?;
        match self.escrows.get(&key) {
            Some(escrow) => Ok((key, *escrow)),
            None => Err(MarketError::OrderNotFound { key: key.to_hex() }),
        }
    }

    pub fn remove(&mut self, key: &OrderKey) -> Option<Amount> {
        self.escrows.remove(key)
    }
}
