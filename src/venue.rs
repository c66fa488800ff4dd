//! Venue identity.
//!
//! A closed four-way enumeration. Venue is a small integer so it can index
//! the premium matrix and per-venue arrays directly without a hash lookup.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Venue {
    Upbit,
    Bithumb,
    Binance,
    Mexc,
}

/// Total venue count; also the premium matrix dimension.
pub const VENUE_COUNT: usize = 4;

pub const ALL_VENUES: [Venue; VENUE_COUNT] =
    [Venue::Upbit, Venue::Bithumb, Venue::Binance, Venue::Mexc];

impl Venue {
    /// Dense index into the 4x4 premium matrix and per-venue arrays.
    #[inline]
    pub fn index(&self) -> usize {
        match self {
            Venue::Upbit => 0,
            Venue::Bithumb => 1,
            Venue::Binance => 2,
            Venue::Mexc => 3,
        }
    }

    pub fn from_index(idx: usize) -> Option<Venue> {
        ALL_VENUES.get(idx).copied()
    }

    /// KRW-quoted venues trade the symbol in Korean won; USDT venues need an
    /// FX conversion before they can be compared in the premium matrix.
    #[inline]
    pub fn is_krw_quoted(&self) -> bool {
        matches!(self, Venue::Upbit | Venue::Bithumb)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Venue::Upbit => "upbit",
            Venue::Bithumb => "bithumb",
            Venue::Binance => "binance",
            Venue::Mexc => "mexc",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Venue> {
        match s.to_lowercase().as_str() {
            "upbit" => Some(Venue::Upbit),
            "bithumb" => Some(Venue::Bithumb),
            "binance" => Some(Venue::Binance),
            "mexc" => Some(Venue::Mexc),
            _ => None,
        }
    }
}

impl std::fmt::Display for Venue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_are_dense_and_reversible() {
        for (i, v) in ALL_VENUES.iter().enumerate() {
            assert_eq!(v.index(), i);
            assert_eq!(Venue::from_index(i), Some(*v));
        }
    }

    #[test]
    fn krw_predicate() {
        assert!(Venue::Upbit.is_krw_quoted());
        assert!(Venue::Bithumb.is_krw_quoted());
        assert!(!Venue::Binance.is_krw_quoted());
        assert!(!Venue::Mexc.is_krw_quoted());
    }

    #[test]
    fn round_trips_through_str() {
        for v in ALL_VENUES {
            assert_eq!(Venue::from_str_loose(v.as_str()), Some(v));
        }
    }
}
