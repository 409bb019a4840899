//! Sell-side listing book.
//!
//! ## Storage
//!
//! ```text
//! commitments: BTreeMap<position, Commitment>
//! ```
//!
//! Only the SHA-256 commitment of each listing is kept, keyed by the
//! absolute queue position of its first unit. Callers present the full
//! listing on every fill; a mismatch with the stored commitment means
//! someone else already changed it.
//!
//! ## Fill flow
//!
//! Filling is split into a pure planning step ([`ListingBook::plan_fill`])
//! and a commit step ([`ListingBook::commit_fill`]). The marketplace moves
//! funds and applies the range split between the two, so a rejection at
//! any point leaves nothing half-applied.

use std::collections::BTreeMap;

use crate::config::MarketConfig;
use crate::error::MarketError;
use crate::turf::{RangeSplit, TurfLedger};
use crate::types::{AccountId, Amount, CasualListing, Commitment, QueuePosition};

/// Everything a listing fill will change, computed before any mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingFillPlan {
    pub position: QueuePosition,
    pub length: u64,
    pub cost: Amount,
    pub split: RangeSplit,
    /// Listing for the unsold part and its commitment.
    pub remainder: Option<(CasualListing, Commitment)>,
}

/// Result of inserting a commitment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingInsert {
    pub commitment: Commitment,
    /// Commitment previously stored at the same position.
    pub superseded: Option<Commitment>,
}

#[derive(Debug, Clone, Default)]
pub struct ListingBook {
    commitments: BTreeMap<QueuePosition, Commitment>,
}

impl ListingBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, position: QueuePosition) -> Option<&Commitment> {
        self.commitments.get(&position)
    }

    pub fn contains(&self, position: QueuePosition) -> bool {
        self.commitments.contains_key(&position)
    }

    pub fn len(&self) -> usize {
        self.commitments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commitments.is_empty()
    }

    /// Stored commitments in queue order.
    pub fn iter(&self) -> impl Iterator<Item = (&QueuePosition, &Commitment)> {
        self.commitments.iter()
    }

    // ========================================================================
    // Creation
    // ========================================================================

    /// Validate `listing` against the ledger and the current frontier and
    /// return its commitment.
    pub fn check_create(
        &self,
        listing: &CasualListing,
        ledger: &TurfLedger,
        frontier: QueuePosition,
        config: &MarketConfig,
    ) -> Result<Commitment, MarketError> {
        if listing.length == 0 {
            return Err(MarketError::ZeroLength);
        }
        listing.pricing.validate(config)?;
        listing
            .range_start
            .checked_add(listing.range_offset)
            .and_then(|position| position.checked_add(listing.length))
            .ok_or(MarketError::RangeOverflow {
                start: listing.position(),
                length: listing.length,
            })?;
        ledger.check_range(
            listing.lister,
            listing.range_start,
            listing.range_offset,
            listing.length,
        )?;
        if !listing.is_live(frontier) {
            return Err(MarketError::Expired {
                expiry: listing.expiry_position,
                frontier,
            });
        }
        listing.commitment()
    }

    /// Store `commitment` at `position`, replacing any listing already there.
    pub fn insert(&mut self, position: QueuePosition, commitment: Commitment) -> ListingInsert {
        let superseded = self.commitments.insert(position, commitment);
        ListingInsert { commitment, superseded }
    }

    // ========================================================================
    // Fill
    // ========================================================================

    /// Check that `listing` is the one stored at its position.
    pub fn verify(&self, listing: &CasualListing) -> Result<Commitment, MarketError> {
        let position = listing.position();
        let stored = self
            .commitments
            .get(&position)
            .ok_or(MarketError::ListingNotFound { position })?;
        let presented = listing.commitment()?;
        if *stored != presented {
            return Err(MarketError::StaleListing { position });
        }
        Ok(presented)
    }

    /// Work out how much of `listing` `buyer` receives for `payment`.
    ///
    /// `payment` is the amount the buyer can actually spend, already
    /// clamped for tolerant settlement.
    pub fn plan_fill(
        &self,
        listing: &CasualListing,
        buyer: AccountId,
        payment: Amount,
        ledger: &TurfLedger,
        frontier: QueuePosition,
        price_scale: u128,
    ) -> Result<ListingFillPlan, MarketError> {
        self.verify(listing)?;
        let position = listing.position();

        if !listing.is_live(frontier) {
            return Err(MarketError::Expired {
                expiry: listing.expiry_position,
                frontier,
            });
        }
        if ledger
            .check_range(listing.lister, listing.range_start, listing.range_offset, listing.length)
            .is_err()
        {
            return Err(MarketError::StaleListing { position });
        }
        if payment == 0 {
            return Err(MarketError::ZeroAmount);
        }

        let distance = position.saturating_sub(frontier);
        let length = listing
            .pricing
            .max_length_for_payment(distance, listing.length, payment, price_scale);
        if length == 0 {
            return Err(MarketError::PaymentTooSmall { payment });
        }
        if length < listing.min_fill_length {
            return Err(MarketError::BelowMinimumFill {
                filled: length,
                minimum: listing.min_fill_length,
            });
        }
        let cost = listing.pricing.cost(distance, length, price_scale);

        let split = ledger.plan_transfer(
            listing.lister,
            buyer,
            listing.range_start,
            listing.range_offset,
            length,
        )?;

        let remainder = match listing.remainder_after(length) {
            Some(rest) => {
                let commitment = rest.commitment()?;
                Some((rest, commitment))
            }
            None => None,
        };

        Ok(ListingFillPlan {
            position,
            length,
            cost,
            split,
            remainder,
        })
    }

    /// Replace the filled listing with its remainder.
    ///
    /// Returns the positions of other listings dropped because their first
    /// unit was inside the sold range.
    pub fn commit_fill(&mut self, plan: &ListingFillPlan) -> Vec<QueuePosition> {
        self.commitments.remove(&plan.position);
        let invalidated = self.invalidate_range(plan.split.moved.start, plan.split.moved.end());
        if let Some((rest, commitment)) = &plan.remainder {
            self.commitments.insert(rest.position(), *commitment);
        }
        invalidated
    }

    // ========================================================================
    // Removal
    // ========================================================================

    pub fn remove(&mut self, position: QueuePosition) -> Option<Commitment> {
        self.commitments.remove(&position)
    }

    /// Drop every listing positioned inside `[start, end)`.
    pub fn invalidate_range(&mut self, start: QueuePosition, end: QueuePosition) -> Vec<QueuePosition> {
        if start >= end {
            return Vec::new();
        }
        let positions: Vec<QueuePosition> = self.commitments.range(start..end).map(|(p, _)| *p).collect();
        for position in &positions {
            self.commitments.remove(position);
        }
        positions
    }
}
