//! Compile-time venue constants: withdraw fees and minimums.
//!
//! The executor and transfer manager use these for profitability math; they
//! are not enforced against the live venue (the venue's own API is the
//! source of truth), only reported.

use crate::venue::Venue;

/// XRP withdraw fee, in XRP, per venue.
pub fn xrp_withdraw_fee(venue: Venue) -> f64 {
    match venue {
        Venue::Upbit => 0.0,
        Venue::Bithumb => 0.0,
        Venue::Binance => 0.25,
        Venue::Mexc => 0.25,
    }
}

/// Minimum transfer amount accepted by the venue's withdraw API, in XRP.
pub fn xrp_min_withdraw(venue: Venue) -> f64 {
    match venue {
        Venue::Upbit => 1.0,
        Venue::Bithumb => 1.0,
        Venue::Binance => 20.0,
        Venue::Mexc => 20.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn krw_venues_withdraw_free() {
        assert_eq!(xrp_withdraw_fee(Venue::Upbit), 0.0);
        assert_eq!(xrp_withdraw_fee(Venue::Bithumb), 0.0);
    }

    #[test]
    fn usdt_venues_charge_quarter_xrp() {
        assert_eq!(xrp_withdraw_fee(Venue::Binance), 0.25);
        assert_eq!(xrp_withdraw_fee(Venue::Mexc), 0.25);
    }
}
