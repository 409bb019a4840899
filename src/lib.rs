//! # Casual Market
//!
//! Order book for queue-position-indexed future claims ("Casuals").
//!
//! ## Architecture
//!
//! The market consists of:
//! - **Pricing**: piecewise-polynomial curves with exact integer integration
//! - **Turf**: ownership ledger of disjoint queue ranges
//! - **Book**: hash-committed listings and escrow-backed orders
//! - **Engine**: the marketplace that orchestrates fills and records events
//!
//! ## Design Principles
//!
//! 1. **Determinism**: Identical operation sequences yield identical state roots
//! 2. **No Floating Point**: Curve math runs on 1024-bit integers
//! 3. **Commitment Storage**: Listings and orders are stored as hashes
//! 4. **All-or-nothing**: Rejected operations change nothing

// ============================================================================
// Module declarations
// ============================================================================

/// Market configuration loaded from the environment
pub mod config;

/// Error types and classification
pub mod error;

/// Core data types: CasualListing, CasualOrder, Commitment, MarketEvent
pub mod types;

/// Frontier and settlement collaborators
pub mod external;

/// Piecewise-polynomial pricing engine
pub mod pricing;

/// Turf ownership ledger
pub mod turf;

/// Listing and order books
pub mod book;

/// Marketplace orchestrating the books and the ledger
pub mod engine;

// ============================================================================
// Re-exports for convenience
// ============================================================================

pub use config::MarketConfig;
pub use engine::Marketplace;
pub use error::{ErrorKind, MarketError};
pub use pricing::{PiecewiseCurve, Pricing};
pub use turf::{Turf, TurfLedger};
pub use types::{CasualListing, CasualOrder, Commitment, MarketEvent};
