//! Immutable exchange-rate snapshots and the conversion arithmetic over them.

use crate::core::error::ConversionError;
use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// A full set of rates from a single fetch, all relative to one base currency.
///
/// A snapshot is never mutated after construction. Replacing the rates means
/// building a new snapshot and swapping it in whole.
#[derive(Debug, Clone, PartialEq)]
pub struct RateSnapshot {
    base: Option<String>,
    rates: HashMap<String, f64>,
    fetched_at: DateTime<Utc>,
    published_at: Option<DateTime<Utc>>,
}

impl RateSnapshot {
    /// Builds a snapshot, dropping rates that cannot be divided by.
    pub fn new(
        base: Option<String>,
        rates: HashMap<String, f64>,
        fetched_at: DateTime<Utc>,
        published_at: Option<DateTime<Utc>>,
    ) -> Self {
        let rates = rates
            .into_iter()
            .filter(|(code, rate)| {
                let usable = rate.is_finite() && *rate > 0.0;
                if !usable {
                    debug!("Dropping unusable rate for {}: {}", code, rate);
                }
                usable
            })
            .collect();

        Self {
            base,
            rates,
            fetched_at,
            published_at,
        }
    }

    /// The snapshot a failed fetch produces.
    pub fn empty(fetched_at: DateTime<Utc>) -> Self {
        Self {
            base: None,
            rates: HashMap::new(),
            fetched_at,
            published_at: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }

    pub fn rate(&self, code: &str) -> Option<f64> {
        self.rates.get(code).copied()
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// Time the remote source says the rates were published, if it reported one.
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }

    pub fn age(&self, now: DateTime<Utc>) -> TimeDelta {
        now.signed_duration_since(self.fetched_at)
    }

    /// Whether `now` is at least `max_age` past the fetch time.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        TimeDelta::from_std(max_age).is_ok_and(|limit| self.age(now) >= limit)
    }

    /// Converts `amount` from one currency to another through the base.
    ///
    /// Identical codes return `amount` untouched, even for an empty snapshot.
    /// The result is rounded to 2 decimal places, ties to even.
    pub fn convert(&self, from: &str, to: &str, amount: f64) -> Result<f64, ConversionError> {
        if from == to {
            return Ok(amount);
        }

        if self.is_empty() {
            return Err(ConversionError::RatesUnavailable);
        }

        let from_rate = self
            .rate(from)
            .ok_or_else(|| ConversionError::UnknownCurrency(from.to_string()))?;
        let to_rate = self
            .rate(to)
            .ok_or_else(|| ConversionError::UnknownCurrency(to.to_string()))?;

        Ok(round_to_cents((to_rate / from_rate) * amount))
    }
}

/// Rounds half-to-even at 2 decimal places.
///
/// Values outside the decimal range (or NaN) are returned as-is.
fn round_to_cents(value: f64) -> f64 {
    Decimal::from_f64(value)
        .and_then(|d| {
            d.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
                .to_f64()
        })
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> RateSnapshot {
        let rates = HashMap::from([
            ("USD".to_string(), 1.0),
            ("EUR".to_string(), 0.9),
            ("BGN".to_string(), 1.76),
        ]);
        RateSnapshot::new(
            Some("USD".to_string()),
            rates,
            Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap(),
            None,
        )
    }

    #[test]
    fn test_cross_rate_conversion() {
        let snapshot = sample();
        let result = snapshot.convert("EUR", "BGN", 100.0).unwrap();
        assert!((result - 195.56).abs() < 1e-9, "got {result}");
    }

    #[test]
    fn test_conversion_from_base() {
        let snapshot = sample();
        let result = snapshot.convert("USD", "EUR", 3.0).unwrap();
        assert!((result - 2.7).abs() < 1e-9, "got {result}");
    }

    #[test]
    fn test_identity_on_empty_snapshot() {
        let snapshot = RateSnapshot::empty(Utc::now());
        assert_eq!(snapshot.convert("USD", "USD", 10.123).unwrap(), 10.123);
        assert_eq!(snapshot.convert("XYZ", "XYZ", -4.5).unwrap(), -4.5);
    }

    #[test]
    fn test_identity_is_case_sensitive() {
        let snapshot = sample();
        assert_eq!(
            snapshot.convert("usd", "USD", 10.0),
            Err(ConversionError::UnknownCurrency("usd".to_string()))
        );
    }

    #[test]
    fn test_empty_snapshot_is_unavailable() {
        let snapshot = RateSnapshot::empty(Utc::now());
        assert_eq!(
            snapshot.convert("USD", "EUR", 10.0),
            Err(ConversionError::RatesUnavailable)
        );
    }

    #[test]
    fn test_unknown_currency_names_offending_code() {
        let snapshot = sample();
        assert_eq!(
            snapshot.convert("USD", "ZZZ", 10.0),
            Err(ConversionError::UnknownCurrency("ZZZ".to_string()))
        );
        assert_eq!(
            snapshot.convert("ZZZ", "USD", 10.0),
            Err(ConversionError::UnknownCurrency("ZZZ".to_string()))
        );
        // Source is checked first
        assert_eq!(
            snapshot.convert("AAA", "ZZZ", 10.0),
            Err(ConversionError::UnknownCurrency("AAA".to_string()))
        );
    }

    #[test]
    fn test_round_trip_stays_within_rounding_error() {
        let snapshot = sample();
        let pairs = [
            ("USD", "EUR"),
            ("EUR", "USD"),
            ("EUR", "BGN"),
            ("BGN", "EUR"),
            ("BGN", "USD"),
            ("USD", "BGN"),
        ];
        for amount in [0.01, 1.0, 3.33, 99.99, 1234.56, 98765.43, 1_000_000_000.37] {
            for (from, to) in pairs {
                let there = snapshot.convert(from, to, amount).unwrap();
                let back = snapshot.convert(to, from, there).unwrap();
                assert!(
                    (back - amount).abs() <= 0.02 + 1e-9,
                    "{amount} {from}->{to}->{from} gave {back}"
                );
            }
        }
    }

    #[test]
    fn test_rounding_ties_to_even() {
        let rates = HashMap::from([("USD".to_string(), 1.0), ("HLF".to_string(), 0.5)]);
        let snapshot = RateSnapshot::new(None, rates, Utc::now(), None);

        // 0.25 * 0.5 = 0.125 -> 0.12, 0.75 * 0.5 = 0.375 -> 0.38
        let low = snapshot.convert("USD", "HLF", 0.25).unwrap();
        let high = snapshot.convert("USD", "HLF", 0.75).unwrap();
        assert!((low - 0.12).abs() < 1e-9, "got {low}");
        assert!((high - 0.38).abs() < 1e-9, "got {high}");
    }

    #[test]
    fn test_unusable_rates_are_dropped() {
        let rates = HashMap::from([
            ("USD".to_string(), 1.0),
            ("ZER".to_string(), 0.0),
            ("NEG".to_string(), -2.0),
            ("NAN".to_string(), f64::NAN),
        ]);
        let snapshot = RateSnapshot::new(None, rates, Utc::now(), None);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(
            snapshot.convert("ZER", "USD", 1.0),
            Err(ConversionError::UnknownCurrency("ZER".to_string()))
        );
    }

    #[test]
    fn test_staleness_is_pure_function_of_age() {
        let snapshot = sample();
        let interval = Duration::from_secs(4 * 60 * 60);
        let fetched = snapshot.fetched_at();

        assert!(!snapshot.is_stale(fetched, interval));
        assert!(!snapshot.is_stale(fetched + TimeDelta::minutes(239), interval));
        assert!(snapshot.is_stale(fetched + TimeDelta::hours(4), interval));
        assert!(snapshot.is_stale(fetched + TimeDelta::days(1), interval));
        assert_eq!(
            snapshot.age(fetched + TimeDelta::minutes(90)),
            TimeDelta::minutes(90)
        );
    }
}
