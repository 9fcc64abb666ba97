use crate::domain::errors::DataError;
use crate::domain::market_data::{Bar, Period};
use crate::domain::ports::MarketDataFeed;
use crate::infrastructure::http_client_factory::{HttpClientFactory, build_url_with_query};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Daily bars from the public Yahoo Finance chart endpoint
pub struct YahooChartFeed {
    client: ClientWithMiddleware,
    base_url: String,
}

impl YahooChartFeed {
    pub fn new(timeout: Duration) -> Self {
        Self::with_base_url(DEFAULT_CHART_URL, timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: HttpClientFactory::create_client(timeout),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl MarketDataFeed for YahooChartFeed {
    async fn fetch_bars(&self, instrument: &str, period: Period) -> Result<Vec<Bar>> {
        let symbol: String = url::form_urlencoded::byte_serialize(instrument.as_bytes()).collect();
        let url = build_url_with_query(
            &format!("{}/{}", self.base_url, symbol),
            &[("interval", "1d"), ("range", period.as_str())],
        )?;

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch chart for {}", instrument))?;

        if !response.status().is_success() {
            return Err(DataError::Unavailable {
                instrument: instrument.to_string(),
                reason: format!("HTTP {}", response.status()),
            }
            .into());
        }

        let body = response
            .text()
            .await
            .context("Failed to read chart response")?;
        let bars = parse_chart(instrument, &body)?;
        debug!("YahooChartFeed: {} bars for {}", bars.len(), instrument);
        Ok(bars)
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Quote {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

/// Parses a chart payload; rows without a positive close are dropped.
pub fn parse_chart(instrument: &str, body: &str) -> Result<Vec<Bar>> {
    let malformed = |reason: String| DataError::Malformed {
        instrument: instrument.to_string(),
        reason,
    };

    let response: ChartResponse =
        serde_json::from_str(body).map_err(|e| malformed(e.to_string()))?;

    if let Some(err) = response.chart.error {
        return Err(DataError::Unavailable {
            instrument: instrument.to_string(),
            reason: format!(
                "{}: {}",
                err.code.unwrap_or_default(),
                err.description.unwrap_or_default()
            ),
        }
        .into());
    }

    let result = response
        .chart
        .result
        .and_then(|mut r| if r.is_empty() { None } else { Some(r.swap_remove(0)) })
        .ok_or_else(|| malformed("no chart result".to_string()))?;
    let quote = result
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| malformed("no quote data".to_string()))?;

    let at = |values: &[Option<f64>], i: usize| values.get(i).copied().flatten().unwrap_or(0.0);

    let bars = result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, &ts)| {
            let date = DateTime::from_timestamp(ts, 0)?.date_naive();
            Some(Bar {
                date,
                open: at(&quote.open, i),
                high: at(&quote.high, i),
                low: at(&quote.low, i),
                close: at(&quote.close, i),
                volume: at(&quote.volume, i),
            })
        })
        .filter(|bar| bar.close > 0.0)
        .collect();

    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "chart": {
            "result": [{
                "timestamp": [1704205800, 1704292200, 1704378600],
                "indicators": {
                    "quote": [{
                        "open": [187.15, 184.22, null],
                        "high": [188.44, 185.88, null],
                        "low": [183.89, 183.43, null],
                        "close": [185.64, 184.25, null],
                        "volume": [82488700, 58414500, null]
                    }]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn test_parse_chart_drops_empty_rows() {
        let bars = parse_chart("AAPL", SAMPLE).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date.to_string(), "2024-01-02");
        assert_eq!(bars[1].close, 184.25);
        assert_eq!(bars[0].volume, 82_488_700.0);
    }

    #[test]
    fn test_parse_chart_error_payload() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let err = parse_chart("ZZZZ", body).unwrap_err();
        assert!(err.to_string().contains("delisted"));
    }

    #[test]
    fn test_parse_chart_garbage() {
        let err = parse_chart("AAPL", "<html>").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DataError>(),
            Some(DataError::Malformed { .. })
        ));
    }
}
