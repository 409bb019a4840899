//! Error types for the Casual market.
//!
//! Every rejected transition is reported through [`MarketError`]. Nothing
//! is applied when an error is returned, so callers can re-read state and
//! retry with corrected parameters.

use thiserror::Error;

use crate::types::{AccountId, Amount, QueuePosition};

/// Broad classification of a rejected transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input (zero amount, empty range, invalid curve).
    Validation,
    /// Commitment mismatch, missing commitment, or expired listing.
    Stale,
    /// Caller is not the owner/buyer, or allowance is too small.
    Authorization,
    /// Not enough length, escrow, or funds to complete the transition.
    Insufficiency,
}

/// Rejections raised while constructing or decoding a pricing curve.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CurveError {
    #[error("curve has no pieces")]
    Empty,

    #[error("curve has {count} pieces, limit is {max}")]
    TooManyPieces { count: usize, max: usize },

    #[error("breakpoint {index} does not increase over its predecessor")]
    NonIncreasingBreakpoints { index: usize },

    #[error("piece {piece} has no terms")]
    EmptyPiece { piece: usize },

    #[error("piece {piece} has degree {degree}, limit is {max}")]
    DegreeTooHigh { piece: usize, degree: usize, max: usize },

    #[error("piece {piece} uses exponent {exponent}, limit is {max}")]
    ExponentTooLarge { piece: usize, exponent: u8, max: u8 },

    #[error("encoded curve is {actual} bytes, expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("encoded curve header is truncated")]
    TruncatedHeader,

    #[error("invalid sign byte {0}")]
    InvalidSign(u8),

    #[error("piece {piece} cannot be shown non-negative on its domain")]
    NegativePrice { piece: usize },
}

/// Rejections raised by a settlement backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettlementError {
    #[error("account {account} has {available} available, {required} required")]
    InsufficientBalance {
        account: AccountId,
        required: Amount,
        available: Amount,
    },

    #[error("balance overflow crediting account {account}")]
    Overflow { account: AccountId },
}

/// Every way a market operation can be rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarketError {
    // ---------------------------------------------------------------- validation
    #[error("length must be greater than zero")]
    ZeroLength,

    #[error("flat price must be greater than zero")]
    ZeroPrice,

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("invalid pricing curve: {0}")]
    InvalidCurve(#[from] CurveError),

    #[error("recipient must not be the null account")]
    NullRecipient,

    #[error("account {0} is reserved for market custody")]
    ReservedAccount(AccountId),

    #[error("account {0} cannot transfer to itself")]
    SelfTransfer(AccountId),

    #[error("range {start}+{length} overflows the queue")]
    RangeOverflow { start: QueuePosition, length: u64 },

    #[error("range [{start}, {end}) overlaps an existing turf")]
    OverlappingTurf { start: QueuePosition, end: QueuePosition },

    #[error("position {position} is already redeemable (frontier {frontier})")]
    AlreadyRedeemable {
        position: QueuePosition,
        frontier: QueuePosition,
    },

    #[error("cannot read {0:?} as a non-negative fixed-point amount")]
    InvalidDecimal(String),

    #[error("commitment encoding failed: {0}")]
    Encoding(String),

    // --------------------------------------------------------------------- stale
    #[error("listing at {position} does not match the stored commitment")]
    StaleListing { position: QueuePosition },

    #[error("no listing at position {position}")]
    ListingNotFound { position: QueuePosition },

    #[error("expired: frontier {frontier} reached expiry position {expiry}")]
    Expired {
        expiry: QueuePosition,
        frontier: QueuePosition,
    },

    #[error("no order with key {key}")]
    OrderNotFound { key: String },

    // ------------------------------------------------------------- authorization
    #[error("account {account} does not own the turf at {position}")]
    NotOwner {
        account: AccountId,
        position: QueuePosition,
    },

    #[error("account {account} is not the buyer of this order")]
    NotBuyer { account: AccountId },

    #[error("account {account} is not the lister")]
    NotLister { account: AccountId },

    #[error("allowance {allowed} is below requested length {requested}")]
    InsufficientAllowance { allowed: u64, requested: u64 },

    #[error("turfs at {first} and {second} cannot be merged")]
    NotMergeable {
        first: QueuePosition,
        second: QueuePosition,
    },

    // ------------------------------------------------------------- insufficiency
    #[error("range [{start}, {end}) exceeds the turf (length {turf_length})")]
    RangeExceedsTurf {
        start: QueuePosition,
        end: QueuePosition,
        turf_length: u64,
    },

    #[error("fill of {filled} is below the minimum fill {minimum}")]
    BelowMinimumFill { filled: u64, minimum: u64 },

    #[error("position {position} is beyond the order limit {max}")]
    TooFarInQueue {
        position: QueuePosition,
        max: QueuePosition,
    },

    #[error("fill costs {required}, order has {remaining} escrowed")]
    EscrowExhausted { required: Amount, remaining: Amount },

    #[error("payment {payment} does not cover a single unit")]
    PaymentTooSmall { payment: Amount },

    #[error(transparent)]
    Settlement(#[from] SettlementError),
}

impl MarketError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        use MarketError::*;
        match self {
            ZeroLength
            | ZeroPrice
            | ZeroAmount
            | InvalidCurve(_)
            | NullRecipient
            | ReservedAccount(_)
            | SelfTransfer(_)
            | RangeOverflow { .. }
            | OverlappingTurf { .. }
            | AlreadyRedeemable { .. }
            | InvalidDecimal(_)
            | Encoding(_) => ErrorKind::Validation,
            StaleListing { .. } | ListingNotFound { .. } | Expired { .. } | OrderNotFound { .. } => {
                ErrorKind::Stale
            }
            NotOwner { .. }
            | NotBuyer { .. }
            | NotLister { .. }
            | InsufficientAllowance { .. }
            | NotMergeable { .. } => ErrorKind::Authorization,
            RangeExceedsTurf { .. }
            | BelowMinimumFill { .. }
            | TooFarInQueue { .. }
            | EscrowExhausted { .. }
            | PaymentTooSmall { .. }
            | Settlement(_) => ErrorKind::Insufficiency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(MarketError::ZeroLength.kind(), ErrorKind::Validation);
        assert_eq!(
            MarketError::InvalidCurve(CurveError::Empty).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            MarketError::StaleListing { position: 1 }.kind(),
            ErrorKind::Stale
        );
        assert_eq!(
            MarketError::NotOwner { account: 1, position: 2 }.kind(),
            ErrorKind::Authorization
        );
        assert_eq!(MarketError::ReservedAccount(u64::MAX).kind(), ErrorKind::Validation);
        assert_eq!(
            MarketError::NotLister { account: 3 }.kind(),
            ErrorKind::Authorization
        );
        assert_eq!(
            MarketError::Settlement(SettlementError::Overflow { account: 1 }).kind(),
            ErrorKind::Insufficiency
        );
    }

    #[test]
    fn test_curve_error_converts() {
        let err: MarketError = CurveError::NonIncreasingBreakpoints { index: 2 }.into();
        assert_eq!(
            err.to_string(),
            "invalid pricing curve: breakpoint 2 does not increase over its predecessor"
        );
    }
}
