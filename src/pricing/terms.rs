//! Pricing terms attached to a listing or order.
//!
//! A claim is priced either at a flat rate per unit or along a piecewise
//! curve whose input is the distance from the redemption frontier.
//!
//! ## Flat pricing
//!
//! `price_per_unit` is fixed-point with `price_decimals` fractional digits:
//!
//! ```text
//! cost(length) = ⌊price_per_unit · length / 10^price_decimals⌋
//! ```
//!
//! ## Curve pricing
//!
//! The curve's own term exponents carry its scaling, so the cost of a range
//! is the definite integral of the curve over it.

use crate::config::MarketConfig;
use crate::error::MarketError;
use crate::pricing::curve::PiecewiseCurve;
use crate::pricing::engine::amount_for_range;
use crate::types::Amount;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Pricing {
    Flat { price_per_unit: u64 },
    Curve(PiecewiseCurve),
}

impl Pricing {
    pub fn flat(price_per_unit: u64) -> Self {
        Pricing::Flat { price_per_unit }
    }

    /// Flat pricing from a decimal price per unit, e.g. `"0.5"`.
    pub fn flat_decimal(price: &str, config: &MarketConfig) -> Result<Self, MarketError> {
        let fixed = config.parse_amount(price)?;
        let price_per_unit =
            u64::try_from(fixed).map_err(|_| MarketError::InvalidDecimal(price.to_string()))?;
        Ok(Self::flat(price_per_unit))
    }

    pub fn curve(curve: PiecewiseCurve) -> Self {
        Pricing::Curve(curve)
    }

    /// 0 = flat, 1 = curve. Part of the commitment preimage.
    pub fn kind_tag(&self) -> u8 {
        match self {
            Pricing::Flat { .. } => 0,
            Pricing::Curve(_) => 1,
        }
    }

    /// Flat price, or 0 for curve pricing.
    pub fn flat_price(&self) -> u64 {
        match self {
            Pricing::Flat { price_per_unit } => *price_per_unit,
            Pricing::Curve(_) => 0,
        }
    }

    /// Curve digest, or all zeroes for flat pricing.
    pub fn curve_digest(&self) -> [u8; 32] {
        match self {
            Pricing::Flat { .. } => [0u8; 32],
            Pricing::Curve(curve) => curve.digest(),
        }
    }

    /// Reject a zero flat price or a curve beyond the configured limits.
    pub fn validate(&self, config: &MarketConfig) -> Result<(), MarketError> {
        match self {
            Pricing::Flat { price_per_unit } if *price_per_unit == 0 => Err(MarketError::ZeroPrice),
            Pricing::Flat { .. } => Ok(()),
            Pricing::Curve(curve) => {
                curve.check_limits(config.max_curve_pieces, config.max_curve_degree)?;
                Ok(())
            }
        }
    }

    /// Total cost of `length` units whose first unit sits `distance` past
    /// the frontier.
    pub fn cost(&self, distance: u64, length: u64, price_scale: u128) -> Amount {
        match self {
            Pricing::Flat { price_per_unit } => {
                (*price_per_unit as u128).saturating_mul(length as u128) / price_scale
            }
            Pricing::Curve(curve) => amount_for_range(curve, distance, length),
        }
    }

    /// Largest length in `[0, max_length]` whose cost does not exceed
    /// `payment`.
    ///
    /// Closed form for flat prices. For curves this is a binary search over
    /// the length: curves are non-negative by construction, so cost never
    /// decreases as the length grows.
    pub fn max_length_for_payment(
        &self,
        distance: u64,
        max_length: u64,
        payment: Amount,
        price_scale: u128,
    ) -> u64 {
        match self {
            Pricing::Flat { price_per_unit } => {
                // ⌊p·L / s⌋ <= payment  ⇔  p·L <= (payment + 1)·s - 1
                let ceiling = payment
                    .saturating_add(1)
                    .saturating_mul(price_scale)
                    .saturating_sub(1);
                let length = ceiling / (*price_per_unit).max(1) as u128;
                length.min(max_length as u128) as u64
            }
            Pricing::Curve(_) => {
                let mut low = 0u64;
                let mut high = max_length;
                while low < high {
                    let mid = low + (high - low) / 2 + (high - low) % 2;
                    if self.cost(distance, mid, price_scale) <= payment {
                        low = mid;
                    } else {
                        high = mid - 1;
                    }
                }
                low
            }
        }
    }
}
