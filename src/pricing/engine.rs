//! Point evaluation and definite integration of piecewise curves.
//!
//! ## Exactness
//!
//! All intermediate products are computed in 1024-bit unsigned integers
//! ([`Wide`]). With `x < 2^64`, coefficients `< 2^128`, degree `<= 7`,
//! exponents `<= 36` and at most 4096 pieces, no intermediate value exceeds
//! roughly 2^790, so nothing is lost before the single final division.
//!
//! Terms are summed over a common denominator (positive and negative terms
//! accumulated separately) and floored once. A result above `u128::MAX`
//! saturates.
//!
//! ## Integration
//!
//! The antiderivative `F(x) = ⌊∫₀ˣ p(t) dt⌋` is accumulated segment by
//! segment and kept signed. A definite integral is `F(x1) - F(x0)`, which
//! makes the result exactly additive: `I(a, c) == I(a, b) + I(b, c)` for
//! every `a <= b <= c`.
//!
//! ## Sign
//!
//! [`PiecewiseCurve::new`] only accepts curves whose pieces are provably
//! non-negative over the positions they price (see [`check_non_negative`]),
//! so `F` never decreases and every price and range cost is `>= 0`.

use alloy_primitives::Uint;

use crate::error::CurveError;
use crate::pricing::curve::{Piece, PiecewiseCurve, Sign};

/// Wide unsigned integer used for all intermediate curve arithmetic.
pub type Wide = Uint<1024, 16>;

// ============================================================================
// Segment lookup
// ============================================================================

/// Index of the piece whose domain contains `x`.
///
/// Binary search over breakpoints `[0, min(hint_upper_bound, len - 1)]`.
/// A position exactly on a breakpoint belongs to the piece starting there;
/// positions before the first breakpoint return 0 and positions after the
/// last return the last index. Any hint at or above the true answer yields
/// the same result.
///
/// # Example
///
/// ```
/// use casual_market::pricing::{find_segment, PiecewiseCurve, Piece};
///
/// let curve = PiecewiseCurve::new(vec![
///     Piece::constant(0, 900_000),
///     Piece::constant(1_000, 900_000),
///     Piece::constant(2_000, 800_000),
///     Piece::constant(3_000, 800_000),
/// ]).unwrap();
///
/// assert_eq!(find_segment(&curve, 2_500, 3), 2);
/// assert_eq!(find_segment(&curve, 2_000, 3), 2);
/// assert_eq!(find_segment(&curve, 9_999, 3), 3);
/// ```
pub fn find_segment(curve: &PiecewiseCurve, x: u64, hint_upper_bound: usize) -> usize {
    let mut low = 0usize;
    let mut high = hint_upper_bound.min(curve.len() - 1);

    if x < curve.breakpoint(0) {
        return 0;
    }

    // Invariant: breakpoint(low) <= x
    while low < high {
        let mid = low + (high - low + 1) / 2;
        if curve.breakpoint(mid) <= x {
            low = mid;
        } else {
            high = mid - 1;
        }
    }
    low
}

// ============================================================================
// Evaluation
// ============================================================================

/// Price at `x`: the containing piece's polynomial evaluated in native
/// coordinates.
pub fn evaluate(curve: &PiecewiseCurve, x: u64) -> u128 {
    let index = find_segment(curve, x, curve.len() - 1);
    let piece = curve.piece(index);
    let max_exponent = piece_exponent(piece);

    let (positive, negative) = term_sums(piece, x, max_exponent);
    floor_ratio(positive, negative, pow10(max_exponent))
}

/// Positive and negative parts of `piece` at `x`, scaled by
/// `10^max_exponent`.
fn term_sums(piece: &Piece, x: u64, max_exponent: u8) -> (Wide, Wide) {
    let base = Wide::from(x);
    let mut power = Wide::from(1u64);
    let mut positive = Wide::ZERO;
    let mut negative = Wide::ZERO;

    for term in &piece.terms {
        let value = Wide::from(term.coefficient)
            .saturating_mul(power)
            .saturating_mul(pow10(max_exponent - term.exponent));
        match term.sign {
            Sign::Positive => positive = positive.saturating_add(value),
            Sign::Negative => negative = negative.saturating_add(value),
        }
        power = power.saturating_mul(base);
    }

    (positive, negative)
}

fn piece_exponent(piece: &Piece) -> u8 {
    piece.terms.iter().map(|t| t.exponent).max().unwrap_or(0)
}

// ============================================================================
// Sign check
// ============================================================================

/// Interval tests allowed per piece before the piece is rejected.
const SIGN_CHECK_BUDGET: usize = 4_096;

/// Reject any piece that cannot be shown `>= 0` over the positions it
/// prices: `[0, b₁]` for the first piece (earlier positions clamp to it),
/// `[bᵢ, bᵢ₊₁]` for inner pieces and `[bₙ, u64::MAX]` for the last.
///
/// On `[a, b]` with `a >= 0` each positive term is at least its value at
/// `a` and each negative term at most its value at `b`, so
/// `pos(a) >= neg(b)` bounds the piece below by zero. Where the bound
/// fails the interval is halved. A piece is rejected when a position
/// evaluates below zero, when a unit-wide interval still fails, or when the
/// budget runs out.
pub fn check_non_negative(curve: &PiecewiseCurve) -> Result<(), CurveError> {
    for (index, piece) in curve.pieces().iter().enumerate() {
        if piece.terms.iter().all(|t| t.sign == Sign::Positive || t.is_zero()) {
            continue;
        }
        let lo = if index == 0 { 0 } else { piece.breakpoint };
        let hi = curve.pieces().get(index + 1).map_or(u64::MAX, |next| next.breakpoint);
        if !piece_non_negative(piece, lo, hi) {
            return Err(CurveError::NegativePrice { piece: index });
        }
    }
    Ok(())
}

fn piece_non_negative(piece: &Piece, lo: u64, hi: u64) -> bool {
    let max_exponent = piece_exponent(piece);
    let mut pending = vec![(lo, hi)];
    let mut budget = SIGN_CHECK_BUDGET;

    while let Some((a, b)) = pending.pop() {
        if budget == 0 {
            return false;
        }
        budget -= 1;

        let (positive, _) = term_sums(piece, a, max_exponent);
        let (_, negative) = term_sums(piece, b, max_exponent);
        if positive >= negative {
            continue;
        }
        if b - a <= 1 {
            return false;
        }
        let mid = a + (b - a) / 2;
        pending.push((mid, b));
        pending.push((a, mid));
    }
    true
}

// ============================================================================
// Integration
// ============================================================================

/// `⌊∫ₓ₀^x1 p(t) dt⌋` as a difference of floored antiderivatives.
///
/// Returns 0 when `x1 <= x0`.
///
/// # Example
///
/// ```
/// use casual_market::pricing::{evaluate_definite_integral, PiecewiseCurve, Piece};
///
/// let curve = PiecewiseCurve::new(vec![
///     Piece::constant(0, 900_000),
///     Piece::constant(1_000, 900_000),
///     Piece::constant(2_000, 800_000),
///     Piece::constant(3_000, 800_000),
/// ]).unwrap();
///
/// assert_eq!(
///     evaluate_definite_integral(&curve, 1_000, 2_500),
///     900_000 * 1_000 + 800_000 * 500
/// );
/// ```
pub fn evaluate_definite_integral(curve: &PiecewiseCurve, x0: u64, x1: u64) -> u128 {
    if x1 <= x0 {
        return 0;
    }
    antiderivative(curve, x1).minus(antiderivative(curve, x0))
}

/// Total price of `length` units starting at `start`.
pub fn amount_for_range(curve: &PiecewiseCurve, start: u64, length: u64) -> u128 {
    evaluate_definite_integral(curve, start, start.saturating_add(length))
}

/// `⌊∫₀ˣ p(t) dt⌋`.
fn antiderivative(curve: &PiecewiseCurve, x: u64) -> Floored {
    let (positive, negative) = accumulate(curve, 0, x);
    let denominator = Wide::from(curve.denominator_lcm()).saturating_mul(pow10(curve.max_exponent()));
    Floored::of(positive, negative, denominator)
}

/// A signed floored value: `magnitude`, negated when `negative` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Floored {
    negative: bool,
    magnitude: Wide,
}

impl Floored {
    /// `⌊(positive - negative) / denominator⌋`, rounding toward -∞.
    fn of(positive: Wide, negative: Wide, denominator: Wide) -> Self {
        if positive >= negative {
            return Self {
                negative: false,
                magnitude: (positive - negative) / denominator,
            };
        }
        let deficit = negative - positive;
        let mut magnitude = deficit / denominator;
        if deficit % denominator != Wide::ZERO {
            magnitude = magnitude.saturating_add(Wide::from(1u64));
        }
        Self { negative: true, magnitude }
    }

    /// `self - other`, clamped to `[0, u128::MAX]`.
    fn minus(self, other: Self) -> u128 {
        let difference = match (self.negative, other.negative) {
            (false, false) => self.magnitude.checked_sub(other.magnitude),
            (false, true) => Some(self.magnitude.saturating_add(other.magnitude)),
            (true, false) => None,
            (true, true) => other.magnitude.checked_sub(self.magnitude),
        };
        difference.map_or(0, saturate_u128)
    }
}

/// Scaled integral numerators over `[lo, hi)`: the partial first segment,
/// every full intervening segment, and the partial last segment. Each
/// breakpoint is the upper bound of one segment and the lower bound of the
/// next, never both of the same one.
fn accumulate(curve: &PiecewiseCurve, lo: u64, hi: u64) -> (Wide, Wide) {
    let mut positive = Wide::ZERO;
    let mut negative = Wide::ZERO;
    if hi <= lo {
        return (positive, negative);
    }

    let last = curve.len() - 1;
    let first = find_segment(curve, lo, last);
    let final_segment = find_segment(curve, hi, last);

    for index in first..=final_segment {
        let seg_lo = if index == first { lo } else { curve.breakpoint(index) };
        let seg_hi = if index == final_segment {
            hi
        } else {
            curve.breakpoint(index + 1)
        };
        if seg_hi <= seg_lo {
            continue;
        }
        let (p, n) = piece_integral(curve, curve.piece(index), seg_lo, seg_hi);
        positive = positive.saturating_add(p);
        negative = negative.saturating_add(n);
    }

    (positive, negative)
}

/// Integral numerators of one piece over `[lo, hi)`, scaled by the curve's
/// common denominator `lcm · 10^max_exponent`.
fn piece_integral(curve: &PiecewiseCurve, piece: &Piece, lo: u64, hi: u64) -> (Wide, Wide) {
    let lcm = Wide::from(curve.denominator_lcm());
    let max_exponent = curve.max_exponent();

    let lo_base = Wide::from(lo);
    let hi_base = Wide::from(hi);
    let mut lo_power = lo_base;
    let mut hi_power = hi_base;

    let mut positive = Wide::ZERO;
    let mut negative = Wide::ZERO;

    for (k, term) in piece.terms.iter().enumerate() {
        // ∫ c·t^k dt = c·(hi^(k+1) - lo^(k+1)) / (k+1)
        let span = hi_power.saturating_sub(lo_power);
        let scale = (lcm / Wide::from((k + 1) as u64)).saturating_mul(pow10(max_exponent - term.exponent));
        let value = Wide::from(term.coefficient)
            .saturating_mul(span)
            .saturating_mul(scale);
        match term.sign {
            Sign::Positive => positive = positive.saturating_add(value),
            Sign::Negative => negative = negative.saturating_add(value),
        }
        lo_power = lo_power.saturating_mul(lo_base);
        hi_power = hi_power.saturating_mul(hi_base);
    }

    (positive, negative)
}

// ============================================================================
// Helpers
// ============================================================================

fn pow10(exponent: u8) -> Wide {
    let ten = Wide::from(10u64);
    let mut result = Wide::from(1u64);
    for _ in 0..exponent {
        result = result.saturating_mul(ten);
    }
    result
}

/// `⌊(positive - negative) / denominator⌋`, clamped to `[0, u128::MAX]`.
fn floor_ratio(positive: Wide, negative: Wide, denominator: Wide) -> u128 {
    if negative >= positive {
        return 0;
    }
    saturate_u128((positive - negative) / denominator)
}

fn saturate_u128(value: Wide) -> u128 {
    let limbs = value.as_limbs();
    if limbs[2..].iter().any(|&limb| limb != 0) {
        return u128::MAX;
    }
    (limbs[0] as u128) | ((limbs[1] as u128) << 64)
}

// ============================================================================
// Unit Tests
// ============================================================================
