//! Sell-side listing over part of a Turf.
//!
//! A listing is never stored. The book keeps only its SHA-256 commitment,
//! keyed by absolute queue position, and every fill or cancel presents
//! the full tuple again.

use ssz_rs::prelude::*;

use crate::error::MarketError;
use crate::external::SettlementMode;
use crate::pricing::Pricing;
use crate::types::commitment::{digest_vector, hash_ssz, Commitment};
use crate::types::{AccountId, QueuePosition};

/// An offer to sell `length` units starting at `range_start + range_offset`.
///
/// ## Example
///
/// ```
/// use casual_market::external::SettlementMode;
/// use casual_market::pricing::Pricing;
/// use casual_market::types::CasualListing;
///
/// let listing = CasualListing {
///     lister: 1,
///     range_start: 10_000,
///     range_offset: 0,
///     length: 1_000,
///     pricing: Pricing::flat(500_000),
///     expiry_position: u64::MAX,
///     min_fill_length: 0,
///     settlement_mode: SettlementMode::ExternalWallet,
/// };
///
/// let rest = listing.remainder_after(500).unwrap();
/// assert_eq!(rest.position(), 10_500);
/// assert_eq!(rest.length, 500);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CasualListing {
    pub lister: AccountId,
    /// Start of the Turf the listing is drawn from.
    pub range_start: QueuePosition,
    pub range_offset: u64,
    pub length: u64,
    pub pricing: Pricing,
    /// The listing is live while the frontier is below this position.
    pub expiry_position: QueuePosition,
    pub min_fill_length: u64,
    /// Where the lister receives payment.
    pub settlement_mode: SettlementMode,
}

/// Fixed-size preimage hashed into the listing commitment.
#[derive(Debug, Clone, PartialEq, Eq, Default, SimpleSerialize)]
struct ListingPreimage {
    lister: u64,
    range_start: u64,
    range_offset: u64,
    length: u64,
    pricing_kind: u8,
    flat_price: u64,
    curve_digest: Vector<u8, 32>,
    expiry_position: u64,
    min_fill_length: u64,
    settlement_mode: u8,
}

impl CasualListing {
    /// Absolute queue position of the first listed unit.
    ///
    /// Saturates; `create_listing` rejects ranges that would overflow.
    #[inline]
    pub fn position(&self) -> QueuePosition {
        self.range_start.saturating_add(self.range_offset)
    }

    /// One past the last listed unit.
    #[inline]
    pub fn end(&self) -> QueuePosition {
        self.position().saturating_add(self.length)
    }

    pub fn is_live(&self, frontier: QueuePosition) -> bool {
        frontier < self.expiry_position
    }

    pub fn commitment(&self) -> Result<Commitment, MarketError> {
        let preimage = ListingPreimage {
            lister: self.lister,
            range_start: self.range_start,
            range_offset: self.range_offset,
            length: self.length,
            pricing_kind: self.pricing.kind_tag(),
            flat_price: self.pricing.flat_price(),
            curve_digest: digest_vector(&self.pricing.curve_digest())?,
            expiry_position: self.expiry_position,
            min_fill_length: self.min_fill_length,
            settlement_mode: self.settlement_mode.to_u8(),
        };
        hash_ssz(&preimage)
    }

    /// The listing that remains after `filled` units are sold.
    ///
    /// After a fill the lister's Turf is re-keyed at the first unsold unit,
    /// so the remainder starts there with offset 0. `None` when nothing is
    /// left.
    pub fn remainder_after(&self, filled: u64) -> Option<CasualListing> {
        if filled >= self.length {
            return None;
        }
        Some(CasualListing {
            range_start: self.position() + filled,
            range_offset: 0,
            length: self.length - filled,
            ..self.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::PiecewiseCurve;

    fn sample() -> CasualListing {
        CasualListing {
            lister: 1,
            range_start: 5_000,
            range_offset: 250,
            length: 1_000,
            pricing: Pricing::flat(500_000),
            expiry_position: 100_000,
            min_fill_length: 10,
            settlement_mode: SettlementMode::ExternalWallet,
        }
    }

    #[test]
    fn test_position() {
        let listing = sample();
        assert_eq!(listing.position(), 5_250);
        assert_eq!(listing.end(), 6_250);
    }

    #[test]
    fn test_commitment_covers_every_field() {
        let base = sample().commitment().unwrap();
        assert_eq!(base, sample().commitment().unwrap());

        let variants = [
            CasualListing { lister: 2, ..sample() },
            CasualListing { range_start: 5_001, ..sample() },
            CasualListing { range_offset: 251, ..sample() },
            CasualListing { length: 999, ..sample() },
            CasualListing { pricing: Pricing::flat(500_001), ..sample() },
            CasualListing { pricing: Pricing::curve(PiecewiseCurve::constant(500_000)), ..sample() },
            CasualListing { expiry_position: 100_001, ..sample() },
            CasualListing { min_fill_length: 11, ..sample() },
            CasualListing { settlement_mode: SettlementMode::InternalBalance, ..sample() },
        ];
        for variant in variants {
            assert_ne!(variant.commitment().unwrap(), base, "{:?}", variant);
        }
    }

    #[test]
    fn test_remainder() {
        let rest = sample().remainder_after(400).unwrap();
        assert_eq!(rest.range_start, 5_650);
        assert_eq!(rest.range_offset, 0);
        assert_eq!(rest.length, 600);
        assert_eq!(rest.pricing, sample().pricing);
        assert_eq!(rest.min_fill_length, 10);

        assert!(sample().remainder_after(1_000).is_none());
    }

    #[test]
    fn test_liveness() {
        let listing = sample();
        assert!(listing.is_live(99_999));
        assert!(!listing.is_live(100_000));
    }
}
