use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One daily OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// History window requested from a market data provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Period {
    #[default]
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "6mo")]
    SixMonths,
    #[serde(rename = "3mo")]
    ThreeMonths,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::OneYear => "1y",
            Period::SixMonths => "6mo",
            Period::ThreeMonths => "3mo",
        }
    }

    /// Number of daily bars produced when a synthetic series stands in
    pub fn synthetic_days(&self) -> usize {
        match self {
            Period::OneYear => 365,
            Period::SixMonths => 180,
            Period::ThreeMonths => 90,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1y" => Ok(Period::OneYear),
            "6mo" | "6m" => Ok(Period::SixMonths),
            "3mo" | "3m" => Ok(Period::ThreeMonths),
            other => Err(format!("unknown period '{}'", other)),
        }
    }
}

/// Ordered bar history for one instrument.
///
/// `synthetic` marks series produced by the generator after the
/// real provider failed, so scores computed on it can be told apart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarSeries {
    pub instrument: String,
    pub period: Period,
    pub bars: Vec<Bar>,
    pub synthetic: bool,
}

impl BarSeries {
    pub fn new(instrument: impl Into<String>, period: Period, bars: Vec<Bar>) -> Self {
        Self {
            instrument: instrument.into(),
            period,
            bars,
            synthetic: false,
        }
    }

    pub fn synthetic(instrument: impl Into<String>, period: Period, bars: Vec<Bar>) -> Self {
        Self {
            synthetic: true,
            ..Self::new(instrument, period, bars)
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn close(&self, index: usize) -> Option<f64> {
        self.bars.get(index).map(|b| b.close)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }
}
