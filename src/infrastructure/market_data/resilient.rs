use crate::application::optimization::instrument_seed;
use crate::domain::errors::DataError;
use crate::domain::market_data::{BarSeries, Period};
use crate::domain::ports::{MarketDataFeed, SeriesSource};
use crate::infrastructure::cache::TtlCache;
use crate::infrastructure::market_data::synthetic::SyntheticSeries;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Bar source that never fails.
///
/// Wraps an optional provider with a timeout and the shared cache, and
/// substitutes a seeded synthetic series whenever the provider errors,
/// stalls or returns nothing. Synthetic series are cached too, so every
/// evaluation of an instrument within the TTL sees the same bars.
pub struct ResilientDataFeed {
    primary: Option<Arc<dyn MarketDataFeed>>,
    cache: Arc<TtlCache<Arc<BarSeries>>>,
    timeout: Duration,
    seed: u64,
}

impl ResilientDataFeed {
    pub fn new(
        primary: Arc<dyn MarketDataFeed>,
        cache: Arc<TtlCache<Arc<BarSeries>>>,
        timeout: Duration,
        seed: u64,
    ) -> Self {
        Self {
            primary: Some(primary),
            cache,
            timeout,
            seed,
        }
    }

    /// Synthetic data only
    pub fn offline(cache: Arc<TtlCache<Arc<BarSeries>>>, seed: u64) -> Self {
        Self {
            primary: None,
            cache,
            timeout: Duration::ZERO,
            seed,
        }
    }

    fn cache_key(instrument: &str, period: Period) -> String {
        format!("bars_{}_{}", instrument, period.as_str())
    }

    async fn fetch_primary(
        &self,
        primary: &Arc<dyn MarketDataFeed>,
        instrument: &str,
        period: Period,
    ) -> anyhow::Result<BarSeries> {
        let bars = tokio::time::timeout(self.timeout, primary.fetch_bars(instrument, period))
            .await
            .map_err(|_| DataError::Timeout {
                instrument: instrument.to_string(),
                duration_ms: self.timeout.as_millis() as u64,
            })??;
        if bars.is_empty() {
            return Err(DataError::Unavailable {
                instrument: instrument.to_string(),
                reason: "provider returned no bars".to_string(),
            }
            .into());
        }
        Ok(BarSeries::new(instrument, period, bars))
    }
}

#[async_trait]
impl SeriesSource for ResilientDataFeed {
    async fn series(&self, instrument: &str, period: Period) -> Arc<BarSeries> {
        let key = Self::cache_key(instrument, period);
        if let Some(series) = self.cache.get(&key) {
            return series;
        }

        let fetched = match &self.primary {
            Some(primary) => match self.fetch_primary(primary, instrument, period).await {
                Ok(series) => {
                    debug!(
                        "MarketData [{}]: fetched {} bars ({})",
                        instrument,
                        series.len(),
                        period
                    );
                    Some(series)
                }
                Err(e) => {
                    warn!(
                        "MarketData [{}]: {:#}, using synthetic series",
                        instrument, e
                    );
                    None
                }
            },
            None => None,
        };

        let series = Arc::new(fetched.unwrap_or_else(|| {
            SyntheticSeries::random_walk(instrument, period, instrument_seed(self.seed, instrument))
        }));
        self.cache.set(key, Arc::clone(&series));
        series
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market_data::Bar;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFeed {
        calls: AtomicUsize,
        bars: usize,
    }

    #[async_trait]
    impl MarketDataFeed for CountingFeed {
        async fn fetch_bars(&self, _instrument: &str, _period: Period) -> anyhow::Result<Vec<Bar>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
            Ok((0..self.bars)
                .map(|i| Bar {
                    date: start + chrono::Duration::days(i as i64),
                    open: 10.0,
                    high: 10.0,
                    low: 10.0,
                    close: 10.0,
                    volume: 1.0,
                })
                .collect())
        }
    }

    struct DownFeed;

    #[async_trait]
    impl MarketDataFeed for DownFeed {
        async fn fetch_bars(&self, instrument: &str, _period: Period) -> anyhow::Result<Vec<Bar>> {
            anyhow::bail!("connection refused for {}", instrument)
        }
    }

    struct StalledFeed;

    #[async_trait]
    impl MarketDataFeed for StalledFeed {
        async fn fetch_bars(&self, _instrument: &str, _period: Period) -> anyhow::Result<Vec<Bar>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    fn cache() -> Arc<TtlCache<Arc<BarSeries>>> {
        Arc::new(TtlCache::new(Duration::from_secs(60)))
    }

    #[tokio::test]
    async fn test_real_data_is_cached() {
        let feed = Arc::new(CountingFeed {
            calls: AtomicUsize::new(0),
            bars: 50,
        });
        let source = ResilientDataFeed::new(feed.clone(), cache(), Duration::from_secs(5), 1);

        let first = source.series("AAPL", Period::OneYear).await;
        let second = source.series("AAPL", Period::OneYear).await;

        assert_eq!(first.len(), 50);
        assert!(!first.synthetic);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(feed.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_synthetic() {
        let source = ResilientDataFeed::new(Arc::new(DownFeed), cache(), Duration::from_secs(5), 1);
        let series = source.series("AAPL", Period::SixMonths).await;
        assert!(series.synthetic);
        assert_eq!(series.len(), 180);
    }

    #[tokio::test]
    async fn test_empty_reply_falls_back_to_synthetic() {
        let feed = Arc::new(CountingFeed {
            calls: AtomicUsize::new(0),
            bars: 0,
        });
        let source = ResilientDataFeed::new(feed, cache(), Duration::from_secs(5), 1);
        assert!(source.series("AAPL", Period::OneYear).await.synthetic);
    }

    #[tokio::test]
    async fn test_timeout_falls_back_to_synthetic() {
        let source =
            ResilientDataFeed::new(Arc::new(StalledFeed), cache(), Duration::from_millis(20), 1);
        let series = source.series("TSLA", Period::ThreeMonths).await;
        assert!(series.synthetic);
        assert_eq!(series.len(), 90);
    }

    #[tokio::test]
    async fn test_offline_series_differ_per_instrument() {
        let source = ResilientDataFeed::offline(cache(), 5);
        let a = source.series("AAPL", Period::OneYear).await;
        let b = source.series("MSFT", Period::OneYear).await;
        assert_ne!(a.closes(), b.closes());
        assert!(Arc::ptr_eq(&a, &source.series("AAPL", Period::OneYear).await));
    }
}
