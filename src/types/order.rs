//! Buy-side standing order.
//!
//! An order is identified by the hash of its terms. The book stores only
//! the remaining escrow under that key.

use ssz_rs::prelude::*;

use crate::error::MarketError;
use crate::pricing::Pricing;
use crate::types::commitment::{digest_vector, hash_ssz, Commitment};
use crate::types::{AccountId, QueuePosition};

/// Key under which an order's escrow is stored.
pub type OrderKey = Commitment;

/// A standing offer to buy any range that starts at or before
/// `max_queue_position`.
///
/// Creating the same order twice maps to the same key; the second creation
/// replaces the first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CasualOrder {
    pub buyer: AccountId,
    pub pricing: Pricing,
    pub max_queue_position: QueuePosition,
    pub min_fill_length: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, SimpleSerialize)]
struct OrderPreimage {
    buyer: u64,
    pricing_kind: u8,
    flat_price: u64,
    curve_digest: Vector<u8, 32>,
    max_queue_position: u64,
    min_fill_length: u64,
}

impl CasualOrder {
    pub fn key(&self) -> Result<OrderKey, MarketError> {
        let preimage = OrderPreimage {
            buyer: self.buyer,
            pricing_kind: self.pricing.kind_tag(),
            flat_price: self.pricing.flat_price(),
            curve_digest: digest_vector(&self.pricing.curve_digest())?,
            max_queue_position: self.max_queue_position,
            min_fill_length: self.min_fill_length,
        };
        hash_ssz(&preimage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CasualOrder {
        CasualOrder {
            buyer: 9,
            pricing: Pricing::flat(1_000),
            max_queue_position: 50_000,
            min_fill_length: 0,
        }
    }

    #[test]
    fn test_key_is_stable() {
        assert_eq!(sample().key().unwrap(), sample().key().unwrap());
    }

    #[test]
    fn test_key_depends_on_terms() {
        let base = sample().key().unwrap();
        assert_ne!(CasualOrder { buyer: 10, ..sample() }.key().unwrap(), base);
        assert_ne!(CasualOrder { pricing: Pricing::flat(1_001), ..sample() }.key().unwrap(), base);
        assert_ne!(CasualOrder { max_queue_position: 50_001, ..sample() }.key().unwrap(), base);
        assert_ne!(CasualOrder { min_fill_length: 1, ..sample() }.key().unwrap(), base);
    }
}
