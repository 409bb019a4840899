//! The marketplace: single writer over the ledger and both books.
//!
//! Every operation follows the same shape:
//!
//! 1. read the frontier and validate, producing a plan (no mutation)
//! 2. move funds through the settlement backend
//! 3. apply the Turf split
//! 4. update commitments / escrow and record events
//!
//! Step 2 is the only step that can still fail after validation, and it
//! fails before anything else has changed.

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::book::{FillRange, ListingBook, ListingFillPlan, OrderBook};
use crate::config::MarketConfig;
use crate::error::{MarketError, SettlementError};
use crate::external::{Frontier, Settlement, SettlementMode};
use crate::pricing::{self, PiecewiseCurve};
use crate::turf::{RangeSplit, Turf, TurfLedger};
use crate::types::{
    is_reserved, AccountId, Amount, CancelReason, CasualListing, CasualOrder, Commitment,
    ListingFill, MarketEvent, OrderFill, OrderKey, QueuePosition, ESCROW_ACCOUNT,
};

/// Log a rejected transition and hand the error back.
fn rejected(op: &'static str, err: MarketError) -> MarketError {
    warn!(op, kind = ?err.kind(), error = %err, "transition rejected");
    err
}

/// The escrow custody account never acts in its own name.
fn participant(op: &'static str, account: AccountId) -> Result<(), MarketError> {
    if is_reserved(account) {
        return Err(rejected(op, MarketError::ReservedAccount(account)));
    }
    Ok(())
}

/// Owns the Turf ledger, the listing book and the order book.
///
/// ## Example
///
/// ```
/// use casual_market::config::MarketConfig;
/// use casual_market::engine::Marketplace;
/// use casual_market::external::{InMemorySettlement, ManualFrontier, SettlementMode};
/// use casual_market::pricing::Pricing;
/// use casual_market::types::CasualListing;
///
/// let config = MarketConfig { price_decimals: 3, ..MarketConfig::default() };
/// let mut bank = InMemorySettlement::new();
/// bank.deposit_external(2, 1_000_000);
///
/// let mut market = Marketplace::new(config, ManualFrontier::new(0), bank);
/// market.issue_turf(1, 10_000, 1_000).unwrap();
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
/// market.create_listing(1, &listing).unwrap();
///
/// let fill = market
///     .fill_listing(2, &listing, 250_000, SettlementMode::ExternalWallet)
///     .unwrap();
/// assert_eq!(fill.filled_length, 500);
/// assert_eq!(fill.remainder.unwrap().position(), 10_500);
/// ```
#[derive(Debug)]
pub struct Marketplace<F: Frontier, S: Settlement> {
    config: MarketConfig,
    ledger: TurfLedger,
    listings: ListingBook,
    orders: OrderBook,
    frontier: F,
    settlement: S,
    events: Vec<MarketEvent>,
}

impl<F: Frontier, S: Settlement> Marketplace<F, S> {
    pub fn new(config: MarketConfig, frontier: F, settlement: S) -> Self {
        Self {
            config,
            ledger: TurfLedger::new(),
            listings: ListingBook::new(),
            orders: OrderBook::new(),
            frontier,
            settlement,
            events: Vec::new(),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    pub fn ledger(&self) -> &TurfLedger {
        &self.ledger
    }

    pub fn listings(&self) -> &ListingBook {
        &self.listings
    }

    pub fn orders(&self) -> &OrderBook {
        &self.orders
    }

    pub fn frontier(&self) -> &F {
        &self.frontier
    }

    /// The queue ledger advances the frontier through this handle.
    pub fn frontier_mut(&mut self) -> &mut F {
        &mut self.frontier
    }

    pub fn current_frontier(&self) -> QueuePosition {
        self.frontier.current_frontier()
    }

    pub fn settlement(&self) -> &S {
        &self.settlement
    }

    pub fn settlement_mut(&mut self) -> &mut S {
        &mut self.settlement
    }

    pub fn listing_commitment(&self, position: QueuePosition) -> Option<Commitment> {
        self.listings.get(position).copied()
    }

    pub fn order_escrow(&self, key: &OrderKey) -> Amount {
        self.orders.escrow(key)
    }

    pub fn allowance(&self, owner: AccountId, spender: AccountId) -> u64 {
        self.ledger.allowance(owner, spender)
    }

    pub fn events(&self) -> &[MarketEvent] {
        &self.events
    }

    /// Hand recorded events to the host, oldest first.
    pub fn drain_events(&mut self) -> Vec<MarketEvent> {
        std::mem::take(&mut self.events)
    }

    // ========================================================================
    // Read-only pricing
    // ========================================================================

    pub fn price_at(&self, curve: &PiecewiseCurve, x: u64) -> u128 {
        pricing::evaluate(curve, x)
    }

    pub fn total_price_for_range(&self, curve: &PiecewiseCurve, start: u64, length: u64) -> u128 {
        pricing::amount_for_range(curve, start, length)
    }

    pub fn find_segment(&self, curve: &PiecewiseCurve, x: u64, hint_upper_bound: usize) -> usize {
        pricing::find_segment(curve, x, hint_upper_bound)
    }

    // ========================================================================
    // Turfs
    // ========================================================================

    /// Record a new Turf handed out by the queue ledger.
    pub fn issue_turf(&mut self, account: AccountId, start: QueuePosition, length: u64) -> Result<Turf, MarketError> {
        let turf = self
            .ledger
            .issue(account, start, length)
            .map_err(|e| rejected("issue_turf", e))?;

        info!(account, start, length, "turf issued");
        self.events.push(MarketEvent::TurfIssued { account, start, length });
        Ok(turf)
    }

    /// Move part of a Turf. `caller` is either the owner or a spender with
    /// enough allowance.
    pub fn transfer_range(
        &mut self,
        caller: AccountId,
        owner: AccountId,
        recipient: AccountId,
        range_start: QueuePosition,
        offset: u64,
        length: u64,
    ) -> Result<RangeSplit, MarketError> {
        participant("transfer_range", caller)?;
        let split = self
            .ledger
            .transfer_from(caller, owner, recipient, range_start, offset, length)
            .map_err(|e| rejected("transfer_range", e))?;
        let invalidated = self
            .listings
            .invalidate_range(split.moved.start, split.moved.end());

        info!(caller, owner, recipient, start = split.moved.start, length, "range transferred");
        self.record_transfer(owner, &split);
        self.record_invalidated(&invalidated);
        Ok(split)
    }

    pub fn approve_range_transfer(
        &mut self,
        owner: AccountId,
        spender: AccountId,
        length: u64,
    ) -> Result<(), MarketError> {
        self.ledger
            .approve(owner, spender, length)
            .map_err(|e| rejected("approve_range_transfer", e))?;
        debug!(owner, spender, length, "range transfer approved");
        Ok(())
    }

    /// Join two adjacent Turfs of `owner`.
    ///
    /// Listings drawn from the second Turf go stale, since their range
    /// start no longer keys a Turf.
    pub fn merge_turfs(&mut self, owner: AccountId, start: QueuePosition) -> Result<Turf, MarketError> {
        let merged = self
            .ledger
            .merge(owner, start)
            .map_err(|e| rejected("merge_turfs", e))?;

        info!(owner, start, length = merged.length, "turfs merged");
        self.events.push(MarketEvent::TurfsMerged {
            account: owner,
            start,
            length: merged.length,
        });
        Ok(merged)
    }

    // ========================================================================
    // Listings
    // ========================================================================

    /// Publish `listing`. Only its lister may do so.
    ///
    /// A listing already stored at the same position is replaced.
    pub fn create_listing(&mut self, caller: AccountId, listing: &CasualListing) -> Result<Commitment, MarketError> {
        participant("create_listing", caller)?;
        if caller != listing.lister {
            return Err(rejected("create_listing", MarketError::NotLister { account: caller }));
        }
        let frontier = self.current_frontier();
        let commitment = self
            .listings
            .check_create(listing, &self.ledger, frontier, &self.config)
            .map_err(|e| rejected("create_listing", e))?;

        let position = listing.position();
        let insert = self.listings.insert(position, commitment);
        if insert.superseded.is_some() {
            debug!(position, "listing superseded");
            self.events.push(MarketEvent::ListingCancelled {
                position,
                reason: CancelReason::Superseded,
            });
        }

        info!(
            lister = listing.lister,
            position,
            length = listing.length,
            commitment = %commitment.short(),
            "listing created"
        );
        self.events.push(MarketEvent::ListingCreated {
            lister: listing.lister,
            position,
            length: listing.length,
            commitment,
        });
        Ok(commitment)
    }

    /// Price a fill without applying it.
    pub fn quote_listing_fill(
        &self,
        buyer: AccountId,
        listing: &CasualListing,
        payment: Amount,
        mode: SettlementMode,
    ) -> Result<ListingFillPlan, MarketError> {
        let payment = self.effective_payment(buyer, payment, mode);
        self.listings.plan_fill(
            listing,
            buyer,
            payment,
            &self.ledger,
            self.current_frontier(),
            self.config.price_scale(),
        )
    }

    /// Buy as much of `listing` as `payment` covers.
    ///
    /// Under `InternalTolerant` the payment is first clamped to the buyer's
    /// internal balance. Only the cost of the filled length is charged.
    pub fn fill_listing(
        &mut self,
        buyer: AccountId,
        listing: &CasualListing,
        payment: Amount,
        mode: SettlementMode,
    ) -> Result<ListingFill, MarketError> {
        participant("fill_listing", buyer)?;
        let plan = self
            .quote_listing_fill(buyer, listing, payment, mode)
            .map_err(|e| rejected("fill_listing", e))?;

        self.settlement
            .move_funds(buyer, listing.lister, plan.cost, mode, listing.settlement_mode)
            .map_err(|e| rejected("fill_listing", e.into()))?;
        self.ledger.apply(&plan.split);
        let invalidated = self.listings.commit_fill(&plan);

        info!(
            buyer,
            lister = listing.lister,
            position = plan.position,
            length = plan.length,
            cost = %plan.cost,
            "listing filled"
        );
        self.record_transfer(listing.lister, &plan.split);
        self.record_invalidated(&invalidated);
        self.events.push(MarketEvent::ListingFilled {
            lister: listing.lister,
            buyer,
            position: plan.position,
            length: plan.length,
            amount: plan.cost,
        });
        if let Some((rest, commitment)) = &plan.remainder {
            debug!(position = rest.position(), length = rest.length, "listing remainder relisted");
            self.events.push(MarketEvent::ListingCreated {
                lister: rest.lister,
                position: rest.position(),
                length: rest.length,
                commitment: *commitment,
            });
        }

        Ok(ListingFill {
            position: plan.position,
            filled_length: plan.length,
            amount_paid: plan.cost,
            remainder: plan.remainder.map(|(rest, _)| rest),
            split: plan.split,
            invalidated,
        })
    }

    /// Withdraw the listing at `position`. The caller must own the Turf
    /// covering it.
    pub fn cancel_listing(&mut self, caller: AccountId, position: QueuePosition) -> Result<(), MarketError> {
        participant("cancel_listing", caller)?;
        let owns = self
            .ledger
            .covering(position)
            .is_some_and(|turf| turf.owner == caller);
        if !owns {
            return Err(rejected(
                "cancel_listing",
                MarketError::NotOwner { account: caller, position },
            ));
        }
        if self.listings.remove(position).is_none() {
            return Err(rejected("cancel_listing", MarketError::ListingNotFound { position }));
        }

        info!(caller, position, "listing cancelled");
        self.events.push(MarketEvent::ListingCancelled {
            position,
            reason: CancelReason::Explicit,
        });
        Ok(())
    }

    // ========================================================================
    // Orders
    // ========================================================================

    /// Escrow `amount` behind `order`. Only its buyer may do so.
    ///
    /// Re-creating an order with identical terms replaces it: the new
    /// amount is escrowed and the old escrow is refunded to the buyer's
    /// internal balance.
    pub fn create_order(
        &mut self,
        caller: AccountId,
        order: &CasualOrder,
        amount: Amount,
        mode: SettlementMode,
    ) -> Result<OrderKey, MarketError> {
        participant("create_order", caller)?;
        if caller != order.buyer {
            return Err(rejected("create_order", MarketError::NotBuyer { account: caller }));
        }
        let key = self
            .orders
            .check_create(order, &self.config)
            .map_err(|e| rejected("create_order", e))?;

        let amount = self.effective_payment(order.buyer, amount, mode);
        if amount == 0 {
            return Err(rejected("create_order", MarketError::ZeroAmount));
        }

        let previous = self.orders.escrow(&key);
        if previous > 0 {
            self.settlement
                .spendable(order.buyer, SettlementMode::InternalBalance)
                .checked_add(previous)
                .ok_or(SettlementError::Overflow { account: order.buyer })
                .map_err(|e| rejected("create_order", e.into()))?;
        }

        let escrowed = self
            .settlement
            .move_funds(order.buyer, ESCROW_ACCOUNT, amount, mode, SettlementMode::InternalBalance)
            .map_err(|e| rejected("create_order", e.into()))?;
        if previous > 0 {
            self.settlement
                .move_funds(
                    ESCROW_ACCOUNT,
                    order.buyer,
                    previous,
                    SettlementMode::InternalBalance,
                    SettlementMode::InternalBalance,
                )
                .map_err(|e| rejected("create_order", e.into()))?;
            debug!(key = %key.short(), refunded = %previous, "order superseded");
            self.events.push(MarketEvent::OrderCancelled { key, refunded: previous });
        }
        self.orders.deposit(key, escrowed);

        info!(buyer = order.buyer, key = %key.short(), escrow = %escrowed, "order created");
        self.events.push(MarketEvent::OrderCreated {
            buyer: order.buyer,
            key,
            escrow: escrowed,
        });
        Ok(key)
    }

    /// Sell `range` into `order`. The filler is paid from escrow into the
    /// bucket selected by `mode`.
    pub fn fill_order(
        &mut self,
        filler: AccountId,
        order: &CasualOrder,
        range: FillRange,
        mode: SettlementMode,
    ) -> Result<OrderFill, MarketError> {
        participant("fill_order", filler)?;
        let plan = self
            .orders
            .plan_fill(
                order,
                filler,
                range,
                &self.ledger,
                self.current_frontier(),
                self.config.price_scale(),
            )
            .map_err(|e| rejected("fill_order", e))?;

        self.settlement
            .move_funds(ESCROW_ACCOUNT, filler, plan.cost, SettlementMode::InternalBalance, mode)
            .map_err(|e| rejected("fill_order", e.into()))?;
        self.ledger.apply(&plan.split);
        self.orders.commit_fill(&plan);
        let invalidated = self
            .listings
            .invalidate_range(plan.split.moved.start, plan.split.moved.end());

        info!(
            filler,
            buyer = order.buyer,
            key = %plan.key.short(),
            position = plan.position,
            length = plan.length,
            cost = %plan.cost,
            remaining = %plan.remaining_escrow,
            "order filled"
        );
        self.record_transfer(filler, &plan.split);
        self.record_invalidated(&invalidated);
        self.events.push(MarketEvent::OrderFilled {
            key: plan.key,
            filler,
            position: plan.position,
            length: plan.length,
            amount: plan.cost,
        });

        Ok(OrderFill {
            key: plan.key,
            position: plan.position,
            length: plan.length,
            amount_paid: plan.cost,
            remaining_escrow: plan.remaining_escrow,
            split: plan.split,
            invalidated_listings: invalidated,
        })
    }

    /// Withdraw `order` and refund its escrow to the buyer.
    pub fn cancel_order(
        &mut self,
        caller: AccountId,
        order: &CasualOrder,
        mode: SettlementMode,
    ) -> Result<Amount, MarketError> {
        participant("cancel_order", caller)?;
        let (key, escrow) = self
            .orders
            .check_cancel(order, caller)
            .map_err(|e| rejected("cancel_order", e))?;

        self.settlement
            .move_funds(ESCROW_ACCOUNT, caller, escrow, SettlementMode::InternalBalance, mode)
            .map_err(|e| rejected("cancel_order", e.into()))?;
        self.orders.remove(&key);

        info!(caller, key = %key.short(), refunded = %escrow, "order cancelled");
        self.events.push(MarketEvent::OrderCancelled { key, refunded: escrow });
        Ok(escrow)
    }

    // ========================================================================
    // State root
    // ========================================================================

    /// SHA-256 over the listing commitments, order escrows and Turfs, each
    /// in key order.
    pub fn state_root(&self) -> Commitment {
        let mut hasher = Sha256::new();

        hasher.update(b"listings");
        hasher.update((self.listings.len() as u64).to_le_bytes());
        for (position, commitment) in self.listings.iter() {
            hasher.update(position.to_le_bytes());
            hasher.update(commitment.as_bytes());
        }

        hasher.update(b"orders");
        hasher.update((self.orders.len() as u64).to_le_bytes());
        for (key, escrow) in self.orders.iter() {
            hasher.update(key.as_bytes());
            hasher.update(escrow.to_le_bytes());
        }

        hasher.update(b"turfs");
        hasher.update((self.ledger.len() as u64).to_le_bytes());
        for turf in self.ledger.iter() {
            hasher.update(turf.start.to_le_bytes());
            hasher.update(turf.length.to_le_bytes());
            hasher.update(turf.owner.to_le_bytes());
        }

        Commitment(hasher.finalize().into())
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    fn effective_payment(&self, account: AccountId, amount: Amount, mode: SettlementMode) -> Amount {
        if mode.is_tolerant() {
            amount.min(self.settlement.spendable(account, mode))
        } else {
            amount
        }
    }

    fn record_transfer(&mut self, from: AccountId, split: &RangeSplit) {
        self.events.push(MarketEvent::TurfTransferred {
            from,
            to: split.moved.owner,
            start: split.moved.start,
            length: split.moved.length,
        });
    }

    fn record_invalidated(&mut self, positions: &[QueuePosition]) {
        for &position in positions {
            debug!(position, "listing invalidated by range move");
            self.events.push(MarketEvent::ListingCancelled {
                position,
                reason: CancelReason::RangeMoved,
            });
        }
    }
}
