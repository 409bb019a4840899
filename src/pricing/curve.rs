//! Piecewise-polynomial curve representation.
//!
//! ## Layout
//!
//! A curve is an ordered list of [`Piece`]s. Piece `i` starts at its
//! breakpoint and is valid until the next breakpoint; the last piece
//! extends to infinity and positions before the first breakpoint clamp to
//! piece 0.
//!
//! Each piece holds up to `MAX_SUPPORTED_DEGREE + 1` [`Term`]s, where
//! `terms[k]` is the coefficient of `x^k`:
//!
//! ```text
//! p(x) = Σ sign_k · coefficient_k · x^k / 10^exponent_k
//! ```
//!
//! ## Packed Encoding
//!
//! ```text
//! u32 LE   piece count n
//! u8       terms per piece t
//! n × u64 LE breakpoints
//! n × t × (u128 LE coefficient, u8 exponent, u8 sign)
//! ```
//!
//! The encoded length is always `5 + 8n + 18nt`. Construction is the only
//! validation point: once a curve exists, evaluation never fails.

use sha2::{Digest, Sha256};

use crate::error::CurveError;
use crate::pricing::engine::check_non_negative;

/// Highest polynomial degree the wide arithmetic can evaluate without overflow.
pub const MAX_SUPPORTED_DEGREE: usize = 7;

/// Largest decimal exponent a term may divide by.
pub const MAX_EXPONENT: u8 = 36;

/// Hard cap on the number of pieces in one curve.
pub const MAX_CURVE_PIECES: usize = 4096;

const HEADER_BYTES: usize = 5;
const BREAKPOINT_BYTES: usize = 8;
const TERM_BYTES: usize = 18;

// ============================================================================
// Sign / Term / Piece
// ============================================================================

/// Sign of a polynomial term.
///
/// Represented as u8 in the packed encoding:
/// - Negative = 0
/// - Positive = 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Sign {
    #[default]
    Positive,
    Negative,
}

impl Sign {
    pub fn to_u8(self) -> u8 {
        match self {
            Sign::Negative => 0,
            Sign::Positive => 1,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Sign::Negative),
            1 => Some(Sign::Positive),
            _ => None,
        }
    }
}

/// One term `sign · coefficient · x^k / 10^exponent` of a piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Term {
    pub coefficient: u128,
    pub exponent: u8,
    pub sign: Sign,
}

impl Term {
    pub fn new(coefficient: u128, exponent: u8, sign: Sign) -> Self {
        Self {
            coefficient,
            exponent,
            sign,
        }
    }

    /// Positive integer coefficient.
    pub fn positive(coefficient: u128) -> Self {
        Self::new(coefficient, 0, Sign::Positive)
    }

    /// Negative integer coefficient.
    pub fn negative(coefficient: u128) -> Self {
        Self::new(coefficient, 0, Sign::Negative)
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.coefficient == 0
    }
}

/// A polynomial valid from `breakpoint` up to the next piece's breakpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Piece {
    pub breakpoint: u64,
    pub terms: Vec<Term>,
}

impl Piece {
    pub fn new(breakpoint: u64, terms: Vec<Term>) -> Self {
        Self { breakpoint, terms }
    }

    /// Degree-0 piece with a constant integer value.
    pub fn constant(breakpoint: u64, value: u128) -> Self {
        Self::new(breakpoint, vec![Term::positive(value)])
    }

    /// Degree of the polynomial (number of terms minus one).
    pub fn degree(&self) -> usize {
        self.terms.len().saturating_sub(1)
    }

    fn max_exponent(&self) -> u8 {
        self.terms.iter().map(|t| t.exponent).max().unwrap_or(0)
    }
}

// ============================================================================
// PiecewiseCurve
// ============================================================================

/// An immutable, validated piecewise-polynomial curve.
///
/// ## Example
///
/// ```
/// use casual_market::pricing::{PiecewiseCurve, Piece};
///
/// let curve = PiecewiseCurve::new(vec![
///     Piece::constant(0, 900_000),
///     Piece::constant(2_000, 800_000),
/// ]).unwrap();
///
/// assert_eq!(curve.len(), 2);
/// assert_eq!(curve.breakpoint(1), 2_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PiecewiseCurve {
    pieces: Vec<Piece>,
    /// Largest exponent over every term of the curve.
    max_exponent: u8,
    /// lcm(1..=terms) over the widest piece; with `10^max_exponent` this
    /// forms the common denominator of the antiderivative.
    denominator_lcm: u64,
}

impl PiecewiseCurve {
    /// Validate and build a curve.
    ///
    /// Trailing zero-coefficient terms are dropped (a piece always keeps at
    /// least one term) and zero terms are normalized, so equal curves
    /// always encode to the same bytes. Pieces that may go negative over
    /// the positions they price are rejected.
    pub fn new(pieces: Vec<Piece>) -> Result<Self, CurveError> {
        if pieces.is_empty() {
            return Err(CurveError::Empty);
        }
        if pieces.len() > MAX_CURVE_PIECES {
            return Err(CurveError::TooManyPieces {
                count: pieces.len(),
                max: MAX_CURVE_PIECES,
            });
        }

        let mut normalized = Vec::with_capacity(pieces.len());
        for (index, mut piece) in pieces.into_iter().enumerate() {
            if piece.terms.is_empty() {
                return Err(CurveError::EmptyPiece { piece: index });
            }
            while piece.terms.len() > 1 && piece.terms.last().map_or(false, Term::is_zero) {
                piece.terms.pop();
            }
            for term in piece.terms.iter_mut() {
                if term.is_zero() {
                    *term = Term::default();
                }
                if term.exponent > MAX_EXPONENT {
                    return Err(CurveError::ExponentTooLarge {
                        piece: index,
                        exponent: term.exponent,
                        max: MAX_EXPONENT,
                    });
                }
            }
            if piece.degree() > MAX_SUPPORTED_DEGREE {
                return Err(CurveError::DegreeTooHigh {
                    piece: index,
                    degree: piece.degree(),
                    max: MAX_SUPPORTED_DEGREE,
                });
            }
            if let Some(prev) = normalized.last().map(|p: &Piece| p.breakpoint) {
                if piece.breakpoint <= prev {
                    return Err(CurveError::NonIncreasingBreakpoints { index });
                }
            }
            normalized.push(piece);
        }

        let max_exponent = normalized.iter().map(Piece::max_exponent).max().unwrap_or(0);
        let widest = normalized.iter().map(|p| p.terms.len()).max().unwrap_or(1);
        let denominator_lcm = (1..=widest as u64).fold(1, lcm);

        let curve = Self {
            pieces: normalized,
            max_exponent,
            denominator_lcm,
        };
        check_non_negative(&curve)?;
        Ok(curve)
    }

    /// Constant curve: a flat price expressed as a single piece.
    pub fn constant(value: u128) -> Self {
        Self {
            pieces: vec![Piece::constant(0, value)],
            max_exponent: 0,
            denominator_lcm: 1,
        }
    }

    /// Number of pieces (always at least one).
    #[inline]
    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    /// Always false; kept for API symmetry with `len`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    #[inline]
    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    #[inline]
    pub fn piece(&self, index: usize) -> &Piece {
        &self.pieces[index]
    }

    /// Breakpoint of piece `index`.
    #[inline]
    pub fn breakpoint(&self, index: usize) -> u64 {
        self.pieces[index].breakpoint
    }

    /// Highest degree among all pieces.
    pub fn max_degree(&self) -> usize {
        self.pieces.iter().map(Piece::degree).max().unwrap_or(0)
    }

    #[inline]
    pub(crate) fn max_exponent(&self) -> u8 {
        self.max_exponent
    }

    #[inline]
    pub(crate) fn denominator_lcm(&self) -> u64 {
        self.denominator_lcm
    }

    /// Check the curve against market-configured limits, which may be
    /// tighter than the hard limits enforced by [`PiecewiseCurve::new`].
    pub fn check_limits(&self, max_pieces: usize, max_degree: usize) -> Result<(), CurveError> {
        if self.len() > max_pieces {
            return Err(CurveError::TooManyPieces {
                count: self.len(),
                max: max_pieces,
            });
        }
        for (index, piece) in self.pieces.iter().enumerate() {
            if piece.degree() > max_degree {
                return Err(CurveError::DegreeTooHigh {
                    piece: index,
                    degree: piece.degree(),
                    max: max_degree,
                });
            }
        }
        Ok(())
    }

    // ========================================================================
    // Packed encoding
    // ========================================================================

    /// Expected byte length for `pieces` pieces of `terms` terms each.
    pub fn encoded_len(pieces: usize, terms: usize) -> usize {
        HEADER_BYTES + pieces * BREAKPOINT_BYTES + pieces * terms * TERM_BYTES
    }

    /// Encode into the packed little-endian layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let terms = self.max_degree() + 1;
        let mut out = Vec::with_capacity(Self::encoded_len(self.len(), terms));

        out.extend_from_slice(&(self.len() as u32).to_le_bytes());
        out.push(terms as u8);
        for piece in &self.pieces {
            out.extend_from_slice(&piece.breakpoint.to_le_bytes());
        }
        for piece in &self.pieces {
            for k in 0..terms {
                let term = piece.terms.get(k).copied().unwrap_or_default();
                out.extend_from_slice(&term.coefficient.to_le_bytes());
                out.push(term.exponent);
                out.push(term.sign.to_u8());
            }
        }
        out
    }

    /// Decode and validate a packed curve.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CurveError> {
        if bytes.len() < HEADER_BYTES {
            return Err(CurveError::TruncatedHeader);
        }
        let count = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        let terms = bytes[4] as usize;

        if count == 0 {
            return Err(CurveError::Empty);
        }
        if count > MAX_CURVE_PIECES {
            return Err(CurveError::TooManyPieces {
                count,
                max: MAX_CURVE_PIECES,
            });
        }
        if terms == 0 {
            return Err(CurveError::EmptyPiece { piece: 0 });
        }

        let expected = Self::encoded_len(count, terms);
        if bytes.len() != expected {
            return Err(CurveError::LengthMismatch {
                expected,
                actual: bytes.len(),
            });
        }

        let mut offset = HEADER_BYTES;
        let mut breakpoints = Vec::with_capacity(count);
        for _ in 0..count {
            let mut buf = [0u8; BREAKPOINT_BYTES];
            buf.copy_from_slice(&bytes[offset..offset + BREAKPOINT_BYTES]);
            breakpoints.push(u64::from_le_bytes(buf));
            offset += BREAKPOINT_BYTES;
        }

        let mut pieces = Vec::with_capacity(count);
        for breakpoint in breakpoints {
            let mut piece_terms = Vec::with_capacity(terms);
            for _ in 0..terms {
                let mut buf = [0u8; 16];
                buf.copy_from_slice(&bytes[offset..offset + 16]);
                let exponent = bytes[offset + 16];
                let sign_raw = bytes[offset + 17];
                let sign = Sign::from_u8(sign_raw).ok_or(CurveError::InvalidSign(sign_raw))?;
                piece_terms.push(Term::new(u128::from_le_bytes(buf), exponent, sign));
                offset += TERM_BYTES;
            }
            pieces.push(Piece::new(breakpoint, piece_terms));
        }

        Self::new(pieces)
    }

    /// SHA-256 of the packed encoding.
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.to_bytes());
        hasher.finalize().into()
    }
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

fn lcm(a: u64, b: u64) -> u64 {
    a / gcd(a, b) * b
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn step_curve() -> PiecewiseCurve {
        PiecewiseCurve::new(vec![
            Piece::constant(0, 900_000),
            Piece::constant(1_000, 900_000),
            Piece::constant(2_000, 800_000),
            Piece::constant(3_000, 800_000),
        ])
        .unwrap()
    }

    #[test]
    fn test_sign_conversion() {
        assert_eq!(Sign::from_u8(0), Some(Sign::Negative));
        assert_eq!(Sign::from_u8(1), Some(Sign::Positive));
        assert_eq!(Sign::from_u8(2), None);
        assert_eq!(Sign::Positive.to_u8(), 1);
    }

    #[test]
    fn test_rejects_empty() {
        assert_eq!(PiecewiseCurve::new(vec![]), Err(CurveError::Empty));
        assert_eq!(
            PiecewiseCurve::new(vec![Piece::new(0, vec![])]),
            Err(CurveError::EmptyPiece { piece: 0 })
        );
    }

    #[test]
    fn test_rejects_non_increasing_breakpoints() {
        let result = PiecewiseCurve::new(vec![
            Piece::constant(0, 1),
            Piece::constant(100, 1),
            Piece::constant(100, 1),
        ]);
        assert_eq!(result, Err(CurveError::NonIncreasingBreakpoints { index: 2 }));

        let result = PiecewiseCurve::new(vec![Piece::constant(50, 1), Piece::constant(10, 1)]);
        assert_eq!(result, Err(CurveError::NonIncreasingBreakpoints { index: 1 }));
    }

    #[test]
    fn test_rejects_degree_and_exponent() {
        let terms = vec![Term::positive(1); MAX_SUPPORTED_DEGREE + 2];
        assert!(matches!(
            PiecewiseCurve::new(vec![Piece::new(0, terms)]),
            Err(CurveError::DegreeTooHigh { piece: 0, .. })
        ));

        let term = Term::new(1, MAX_EXPONENT + 1, Sign::Positive);
        assert!(matches!(
            PiecewiseCurve::new(vec![Piece::new(0, vec![term])]),
            Err(CurveError::ExponentTooLarge { piece: 0, .. })
        ));
    }

    #[test]
    fn test_trailing_zero_terms_trimmed() {
        let curve = PiecewiseCurve::new(vec![Piece::new(
            0,
            vec![Term::positive(5), Term::positive(2), Term::negative(0), Term::positive(0)],
        )])
        .unwrap();
        assert_eq!(curve.piece(0).terms.len(), 2);
        assert_eq!(curve.max_degree(), 1);
    }

    #[test]
    fn test_check_limits() {
        let curve = step_curve();
        assert!(curve.check_limits(4, 0).is_ok());
        assert!(matches!(
            curve.check_limits(3, 3),
            Err(CurveError::TooManyPieces { count: 4, max: 3 })
        ));

        let cubic = PiecewiseCurve::new(vec![Piece::new(0, vec![Term::positive(1); 4])]).unwrap();
        assert!(matches!(
            cubic.check_limits(8, 2),
            Err(CurveError::DegreeTooHigh { degree: 3, max: 2, .. })
        ));
    }

    #[test]
    fn test_denominator_lcm() {
        assert_eq!(step_curve().denominator_lcm(), 1);
        let cubic = PiecewiseCurve::new(vec![Piece::new(0, vec![Term::positive(1); 4])]).unwrap();
        assert_eq!(cubic.denominator_lcm(), 12);
    }

    #[test]
    fn test_encoding_roundtrip() {
        let curve = PiecewiseCurve::new(vec![
            Piece::new(0, vec![Term::positive(7), Term::new(3, 3, Sign::Negative)]),
            Piece::constant(500, 42),
        ])
        .unwrap();

        let bytes = curve.to_bytes();
        assert_eq!(bytes.len(), PiecewiseCurve::encoded_len(2, 2));
        assert_eq!(PiecewiseCurve::from_bytes(&bytes).unwrap(), curve);
    }

    #[test]
    fn test_decode_length_mismatch() {
        let mut bytes = step_curve().to_bytes();
        bytes.push(0);
        assert!(matches!(
            PiecewiseCurve::from_bytes(&bytes),
            Err(CurveError::LengthMismatch { .. })
        ));
        assert_eq!(
            PiecewiseCurve::from_bytes(&[1, 0]),
            Err(CurveError::TruncatedHeader)
        );
    }

    #[test]
    fn test_decode_invalid_sign() {
        let mut bytes = PiecewiseCurve::constant(9).to_bytes();
        let last = bytes.len() - 1;
        bytes[last] = 7;
        assert_eq!(PiecewiseCurve::from_bytes(&bytes), Err(CurveError::InvalidSign(7)));
    }

    #[test]
    fn test_decode_validates_breakpoints() {
        let mut bytes = step_curve().to_bytes();
        // Overwrite breakpoint 1 with 0.
        bytes[HEADER_BYTES + 8..HEADER_BYTES + 16].copy_from_slice(&0u64.to_le_bytes());
        assert_eq!(
            PiecewiseCurve::from_bytes(&bytes),
            Err(CurveError::NonIncreasingBreakpoints { index: 1 })
        );
    }

    #[test]
    fn test_digest_is_canonical() {
        let a = PiecewiseCurve::new(vec![Piece::new(0, vec![Term::positive(3), Term::negative(0)])]).unwrap();
        let b = PiecewiseCurve::constant(3);
        assert_eq!(a, b);
        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.digest(), PiecewiseCurve::constant(4).digest());
    }
}
