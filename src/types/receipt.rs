//! Receipts returned by successful fills.

use crate::turf::RangeSplit;
use crate::types::{Amount, CasualListing, OrderKey, QueuePosition};

/// Outcome of filling a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingFill {
    /// Absolute position of the first purchased unit.
    pub position: QueuePosition,
    pub filled_length: u64,
    /// Amount moved from the buyer to the lister.
    pub amount_paid: Amount,
    /// Re-created listing for the unsold part, if any.
    pub remainder: Option<CasualListing>,
    pub split: RangeSplit,
    /// Other listings removed because their first unit was sold.
    pub invalidated: Vec<QueuePosition>,
}

/// Outcome of filling an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderFill {
    pub key: OrderKey,
    pub position: QueuePosition,
    pub length: u64,
    /// Amount released from escrow to the filler.
    pub amount_paid: Amount,
    /// Escrow left on the order; 0 means the order was removed.
    pub remaining_escrow: Amount,
    pub split: RangeSplit,
    /// Listings removed because their range moved to the buyer.
    pub invalidated_listings: Vec<QueuePosition>,
}

impl ListingFill {
    pub fn is_complete(&self) -> bool {
        self.remainder.is_none()
    }
}

impl OrderFill {
    pub fn is_complete(&self) -> bool {
        self.remaining_escrow == 0
    }
}
