//! Market configuration.
//!
//! Defaults match the protocol's fixed-point conventions. Hosts can
//! override them through `MARKET_*` environment variables.

use std::collections::HashMap;
use thiserror::Error;

use crate::error::MarketError;
use crate::pricing::MAX_SUPPORTED_DEGREE;
use crate::pricing::MAX_CURVE_PIECES;
use crate::types::price::{from_fixed, to_fixed, MAX_DECIMALS};
use crate::types::Amount;

/// Number of fractional digits in a flat price per unit.
pub const DEFAULT_PRICE_DECIMALS: u32 = 6;

/// Most pieces a listing or order curve may carry.
pub const DEFAULT_MAX_CURVE_PIECES: usize = 64;

/// Highest polynomial degree a listing or order curve may use.
pub const DEFAULT_MAX_CURVE_DEGREE: usize = 3;

/// Largest supported `price_decimals`, bounded by what `rust_decimal` can
/// represent.
const MAX_PRICE_DECIMALS: u32 = MAX_DECIMALS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketConfig {
    /// Fractional digits of `Pricing::Flat` prices.
    pub price_decimals: u32,
    /// Piece-count limit enforced when a listing or order is created.
    pub max_curve_pieces: usize,
    /// Degree limit enforced when a listing or order is created.
    pub max_curve_degree: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            price_decimals: DEFAULT_PRICE_DECIMALS,
            max_curve_pieces: DEFAULT_MAX_CURVE_PIECES,
            max_curve_degree: DEFAULT_MAX_CURVE_DEGREE,
        }
    }
}

impl MarketConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let price_decimals = parse_or(&env_map, "MARKET_PRICE_DECIMALS", defaults.price_decimals)?;
        if price_decimals > MAX_PRICE_DECIMALS {
            return Err(ConfigError::InvalidValue(
                "MARKET_PRICE_DECIMALS".to_string(),
                format!("must be at most {}", MAX_PRICE_DECIMALS),
            ));
        }

        let max_curve_pieces =
            parse_or(&env_map, "MARKET_MAX_CURVE_PIECES", defaults.max_curve_pieces)?;
        if max_curve_pieces == 0 || max_curve_pieces > MAX_CURVE_PIECES {
            return Err(ConfigError::InvalidValue(
                "MARKET_MAX_CURVE_PIECES".to_string(),
                format!("must be between 1 and {}", MAX_CURVE_PIECES),
            ));
        }

        let max_curve_degree =
            parse_or(&env_map, "MARKET_MAX_CURVE_DEGREE", defaults.max_curve_degree)?;
        if max_curve_degree > MAX_SUPPORTED_DEGREE {
            return Err(ConfigError::InvalidValue(
                "MARKET_MAX_CURVE_DEGREE".to_string(),
                format!("must be at most {}", MAX_SUPPORTED_DEGREE),
            ));
        }

        Ok(Self {
            price_decimals,
            max_curve_pieces,
            max_curve_degree,
        })
    }

    /// `10^price_decimals`, the denominator of a flat price.
    pub fn price_scale(&self) -> u128 {
        10u128.pow(self.price_decimals)
    }

    /// Parse a decimal string such as `"0.5"` into a fixed-point amount
    /// with `price_decimals` fractional digits.
    pub fn parse_amount(&self, value: &str) -> Result<Amount, MarketError> {
        to_fixed(value, self.price_decimals).ok_or_else(|| MarketError::InvalidDecimal(value.to_string()))
    }

    /// Render a fixed-point amount with exactly `price_decimals` digits.
    pub fn format_amount(&self, amount: Amount) -> String {
        from_fixed(amount, self.price_decimals).unwrap_or_else(|| amount.to_string())
    }
}

fn parse_or<T: std::str::FromStr>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match env_map.get(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<T>().map_err(|_| {
            ConfigError::InvalidValue(key.to_string(), format!("cannot parse {:?}", raw))
        }),
    }
}
