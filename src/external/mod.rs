//! Collaborators the market consumes but does not own.
//!
//! - [`Frontier`]: the advancing redemption frontier of the queue ledger
//! - [`Settlement`]: token custody and fund movement
//!
//! In-memory implementations ([`ManualFrontier`], [`InMemorySettlement`])
//! back the tests, benchmarks and the demo binary.

pub mod frontier;
pub mod settlement;

pub use frontier::{Frontier, ManualFrontier};
pub use settlement::{InMemorySettlement, Settlement, SettlementMode};
