//! Synthetic quote generation
//!
//! Produces plausible QuotePoints by random-walking a seed price. Used
//! whenever a live fetch is unavailable: outside trading hours, or as the
//! fallback when the upstream quote provider fails mid-session. All price
//! math stays in Decimal so the drift bound is exact.

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;

use crate::models::QuotePoint;

/// Maximum perturbation per tick, in tenths of a basis point (300 = 0.3%)
const MAX_DRIFT_TENTH_BPS: i64 = 300;
/// Fabricated day high/low sit 2% either side of the synthesized price
const DAY_BAND: Decimal = Decimal::from_parts(2, 0, 0, false, 2);
/// Fabricated bid/ask sit one cent either side of the synthesized price
const HALF_SPREAD: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Synthesize the next point for `symbol` from the last known price
///
/// The price moves by a uniform random drift in [-0.3%, +0.3%] of the
/// seed; change and change_percent are derived from the same drift so the
/// three fields stay mutually consistent. Volume is fabricated, market cap
/// is omitted.
pub fn synthesize_point(symbol: &str, seed: Decimal, now: DateTime<Utc>) -> QuotePoint {
    let mut rng = rand::rng();

    // drift in units of 0.001% keeps the walk in exact Decimal arithmetic
    let drift = Decimal::new(rng.random_range(-MAX_DRIFT_TENTH_BPS..=MAX_DRIFT_TENTH_BPS), 5);
    let change = seed * drift;
    let price = seed + change;
    let change_percent = drift * Decimal::ONE_HUNDRED;

    QuotePoint {
        symbol: symbol.to_string(),
        timestamp: now,
        price,
        change,
        change_percent,
        volume: rng.random_range(50_000..=2_000_000),
        day_high: price * (Decimal::ONE + DAY_BAND),
        day_low: price * (Decimal::ONE - DAY_BAND),
        bid: price - HALF_SPREAD,
        ask: price + HALF_SPREAD,
        market_cap: None,
        currency: "USD".to_string(),
    }
}
