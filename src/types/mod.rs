//! Core data types for the Casual market
//!
//! Commitment preimages implement SSZ serialization for deterministic
//! encoding; every digest is SHA-256 over those bytes.
//!
//! ## Types
//!
//! - [`CasualListing`]: a sell-side offer over part of a Turf
//! - [`CasualOrder`]: a standing buy order backed by escrow
//! - [`Commitment`]: the 32-byte digest stored in place of a listing/order
//! - [`MarketEvent`]: a recorded state transition
//! - [`ListingFill`], [`OrderFill`]: fill receipts returned to callers
//!
//! ## Units
//!
//! Queue positions and lengths are `u64` units of the debt queue. Token
//! amounts are `u128` fixed-point values; flat prices carry
//! `MarketConfig::price_decimals` fractional digits.

mod commitment;
mod event;
mod listing;
mod order;
mod receipt;
pub mod price;

pub use commitment::{hash_ssz, Commitment};
pub use event::{CancelReason, MarketEvent};
pub use listing::CasualListing;
pub use order::{CasualOrder, OrderKey};
pub use receipt::{ListingFill, OrderFill};

/// Identifier of a market participant.
pub type AccountId = u64;

/// Place in the global FIFO queue.
pub type QueuePosition = u64;

/// Fixed-point token amount.
pub type Amount = u128;

/// The null account. Never a valid recipient.
pub const NULL_ACCOUNT: AccountId = 0;

/// Custody account holding order escrow.
pub const ESCROW_ACCOUNT: AccountId = u64::MAX;

/// Accounts the market uses internally. They never list, buy, fill,
/// hold Turfs or act as a caller.
pub fn is_reserved(account: AccountId) -> bool {
    account == ESCROW_ACCOUNT
}
