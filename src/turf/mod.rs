//! Turf ownership ledger.
//!
//! Maps accounts to disjoint queue ranges and performs the range splits
//! that fills and transfers require.

mod ledger;

pub use ledger::{RangeSplit, Turf, TurfLedger};
