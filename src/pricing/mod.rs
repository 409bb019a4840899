//! Piecewise-polynomial pricing engine.
//!
//! ## Components
//!
//! - [`PiecewiseCurve`]: validated breakpoints + per-piece polynomials
//! - [`find_segment`], [`evaluate`], [`evaluate_definite_integral`],
//!   [`amount_for_range`]: pure numeric routines over a curve
//! - [`Pricing`]: flat-or-curve terms carried by listings and orders
//!
//! No floating point is used anywhere in this module.

pub mod curve;
pub mod engine;
pub mod terms;

pub use curve::{Piece, PiecewiseCurve, Sign, Term, MAX_CURVE_PIECES, MAX_EXPONENT, MAX_SUPPORTED_DEGREE};
pub use engine::{amount_for_range, check_non_negative, evaluate, evaluate_definite_integral, find_segment, Wide};
pub use terms::Pricing;
