use crate::domain::market_data::{Bar, BarSeries, Period};
use chrono::{NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Stand-in bars for when no provider can deliver.
///
/// Series built here are flagged `synthetic` so results computed on them
/// can be told apart downstream.
pub struct SyntheticSeries;

impl SyntheticSeries {
    pub const VOLATILITY: f64 = 0.02;

    /// Seeded random walk, one bar per calendar day of `period`, ending today
    pub fn random_walk(instrument: &str, period: Period, seed: u64) -> BarSeries {
        let end = Utc::now().date_naive();
        Self::random_walk_until(instrument, period, seed, end)
    }

    pub fn random_walk_until(instrument: &str, period: Period, seed: u64, end: NaiveDate) -> BarSeries {
        let mut rng = StdRng::seed_from_u64(seed);
        let days = period.synthetic_days();
        let mut close = 100.0 + rng.random::<f64>() * 900.0;

        let bars = (0..days)
            .map(|i| {
                let change = (rng.random::<f64>() - 0.5) * 2.0 * Self::VOLATILITY;
                close *= 1.0 + change;
                let open = close * (1.0 + (rng.random::<f64>() - 0.5) * 0.01);
                let high = open.max(close) * (1.0 + rng.random::<f64>() * Self::VOLATILITY);
                let low = open.min(close) * (1.0 - rng.random::<f64>() * Self::VOLATILITY);
                Bar {
                    date: end - chrono::Duration::days((days - i) as i64),
                    open,
                    high,
                    low,
                    close,
                    volume: rng.random_range(100_000.0..1_100_000.0_f64).floor(),
                }
            })
            .collect();

        BarSeries::synthetic(instrument, period, bars)
    }

    /// Closes that move by `+step`, `-step`, `+step`, ... from 100
    pub fn alternating(instrument: &str, bars: usize, step: f64) -> BarSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default();
        let mut close = 100.0;
        let bars = (0..bars)
            .map(|k| {
                if k > 0 {
                    close *= if k % 2 == 1 { 1.0 + step } else { 1.0 - step };
                }
                Bar {
                    date: start + chrono::Duration::days(k as i64),
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: 1_000.0,
                }
            })
            .collect();
        BarSeries::synthetic(instrument, Period::OneYear, bars)
    }
}
