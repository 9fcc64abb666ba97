use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Directional call produced by a workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl Signal {
    /// Buy and sell count as trades; hold never does.
    pub fn is_directional(&self) -> bool {
        !matches!(self, Signal::Hold)
    }

    /// Return earned when acting on this signal over a move of `actual_return`.
    pub fn realized_return(&self, actual_return: f64) -> f64 {
        match self {
            Signal::Buy => actual_return,
            Signal::Sell => -actual_return,
            Signal::Hold => 0.0,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Signal::Buy => "buy",
            Signal::Sell => "sell",
            Signal::Hold => "hold",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub signal: Signal,
    /// In [0, 1]
    pub confidence: f64,
    pub reasoning: String,
}

impl Prediction {
    pub fn new(signal: Signal, confidence: f64, reasoning: impl Into<String>) -> Self {
        Self {
            signal,
            confidence: confidence.clamp(0.0, 1.0),
            reasoning: reasoning.into(),
        }
    }

    pub fn hold(reasoning: impl Into<String>) -> Self {
        Self::new(Signal::Hold, 0.5, reasoning)
    }
}

/// Aggregated view of the indicator votes at one point in history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalSummary {
    /// `Hold` when neither side is strong enough
    pub direction: Signal,
    pub strength: f64,
    pub buy_votes: usize,
    pub sell_votes: usize,
    pub neutral_votes: usize,
    pub rsi: f64,
    pub macd_histogram: f64,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Headline {
    pub title: String,
    pub source: String,
    pub published: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentReading {
    /// Mean headline polarity in [-1, 1]
    pub score: f64,
    pub label: SentimentLabel,
    /// Share of headlines agreeing with the overall label
    pub confidence: f64,
    pub headline_count: usize,
}

impl SentimentReading {
    pub fn neutral() -> Self {
        Self {
            score: 0.0,
            label: SentimentLabel::Neutral,
            confidence: 0.0,
            headline_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_realized_return_follows_direction() {
        assert_eq!(Signal::Buy.realized_return(0.02), 0.02);
        assert_eq!(Signal::Sell.realized_return(0.02), -0.02);
        assert_eq!(Signal::Hold.realized_return(0.02), 0.0);
    }

    #[test]
    fn test_prediction_clamps_confidence() {
        assert_eq!(Prediction::new(Signal::Buy, 1.7, "x").confidence, 1.0);
        assert_eq!(Prediction::new(Signal::Sell, -0.2, "x").confidence, 0.0);
    }
}
