//! Market engine for the Casual market.
//!
//! ## Design Principles
//!
//! The engine is designed for:
//!
//! 1. **Determinism**: Same operation sequence always produces the same state root
//! 2. **Fixed-Point Math**: No floating-point operations in pricing
//! 3. **Synchronous Execution**: One writer, every operation takes `&mut self`
//! 4. **All-or-nothing**: A rejected operation leaves no trace
//!
//! ## Lifecycle
//!
//! - **Listings** are filled partially and re-listed for the remainder
//! - **Orders** release escrow per fill and disappear when it runs out
//! - **Range moves** invalidate every listing positioned in the moved range

pub mod marketplace;

pub use marketplace::Marketplace;
