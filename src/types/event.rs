//! Market events recorded on every accepted transition.
//!
//! The marketplace appends events in execution order; hosts drain them to
//! index listings and orders off-line.

use crate::types::{AccountId, Amount, Commitment, OrderKey, QueuePosition};

/// Why a listing left the book without being filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancelReason {
    /// The lister cancelled it.
    Explicit,
    /// A new listing was created at the same position.
    Superseded,
    /// The listed range changed owner.
    RangeMoved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketEvent {
    TurfIssued {
        account: AccountId,
        start: QueuePosition,
        length: u64,
    },
    TurfTransferred {
        from: AccountId,
        to: AccountId,
        start: QueuePosition,
        length: u64,
    },
    TurfsMerged {
        account: AccountId,
        start: QueuePosition,
        length: u64,
    },
    ListingCreated {
        lister: AccountId,
        position: QueuePosition,
        length: u64,
        commitment: Commitment,
    },
    ListingFilled {
        lister: AccountId,
        buyer: AccountId,
        position: QueuePosition,
        length: u64,
        amount: Amount,
    },
    ListingCancelled {
        position: QueuePosition,
        reason: CancelReason,
    },
    OrderCreated {
        buyer: AccountId,
        key: OrderKey,
        escrow: Amount,
    },
    OrderFilled {
        key: OrderKey,
        filler: AccountId,
        position: QueuePosition,
        length: u64,
        amount: Amount,
    },
    OrderCancelled {
        key: OrderKey,
        refunded: Amount,
    },
}
