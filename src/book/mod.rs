//! Listing and order books.
//!
//! - [`ListingBook`]: sell-side commitments keyed by queue position
//! - [`OrderBook`]: buy-side escrow counters keyed by order hash
//!
//! Both books validate and plan against a read-only
//! [`TurfLedger`](crate::turf::TurfLedger); the marketplace applies the plans.

pub mod listings;
pub mod orders;

pub use listings::{ListingBook, ListingFillPlan, ListingInsert};
pub use orders::{FillRange, OrderBook, OrderFillPlan};
