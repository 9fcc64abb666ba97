//! Indicator votes reduced to a single directional summary.
//!
//! Each indicator casts a buy, sell or neutral vote with a strength in
//! [0, 1]. The summary direction is the side whose average strength is
//! both above [`MIN_DIRECTION_STRENGTH`] and above the other side.

use crate::domain::errors::StepError;
use crate::domain::market_data::Bar;
use crate::domain::signals::{Signal, TechnicalSummary};
use ta::Next;
use ta::indicators::{
    BollingerBands, ExponentialMovingAverage, MovingAverageConvergenceDivergence,
    RelativeStrengthIndex, SimpleMovingAverage,
};

/// Fewest bars the indicator set is computed on
pub const MIN_TECHNICAL_BARS: usize = 15;

pub const MIN_DIRECTION_STRENGTH: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Vote {
    signal: Signal,
    strength: f64,
}

impl Vote {
    fn buy(strength: f64) -> Self {
        Self {
            signal: Signal::Buy,
            strength,
        }
    }

    fn sell(strength: f64) -> Self {
        Self {
            signal: Signal::Sell,
            strength,
        }
    }

    fn neutral() -> Self {
        Self {
            signal: Signal::Hold,
            strength: 0.0,
        }
    }
}

struct IndicatorSnapshot {
    price: f64,
    rsi: f64,
    macd: f64,
    macd_signal: f64,
    macd_histogram: f64,
    bb_upper: f64,
    bb_lower: f64,
    sma_20: f64,
    sma_50: f64,
    ema_12: f64,
    ema_26: f64,
}

pub struct TechnicalAnalyzer;

impl TechnicalAnalyzer {
    pub fn analyze(bars: &[Bar]) -> Result<TechnicalSummary, StepError> {
        if bars.len() < MIN_TECHNICAL_BARS {
            return Err(StepError::InsufficientHistory {
                step: "technical_analysis".to_string(),
                available: bars.len(),
                required: MIN_TECHNICAL_BARS,
            });
        }

        let snapshot = Self::snapshot(bars)?;
        let votes = [
            rsi_vote(snapshot.rsi),
            macd_vote(snapshot.macd, snapshot.macd_signal, snapshot.macd_histogram),
            bollinger_vote(snapshot.price, snapshot.bb_upper, snapshot.bb_lower),
            sma_vote(snapshot.price, snapshot.sma_20, snapshot.sma_50),
            ema_vote(snapshot.ema_12, snapshot.ema_26),
        ];

        Ok(summarize(&votes, &snapshot))
    }

    fn snapshot(bars: &[Bar]) -> Result<IndicatorSnapshot, StepError> {
        let map_err = |e: ta::errors::TaError| StepError::Provider {
            step: "technical_analysis".to_string(),
            reason: format!("{:?}", e),
        };

        let mut rsi = RelativeStrengthIndex::new(14).map_err(map_err)?;
        let mut macd = MovingAverageConvergenceDivergence::new(12, 26, 9).map_err(map_err)?;
        let mut bb = BollingerBands::new(20, 2.0).map_err(map_err)?;
        let mut sma_20 = SimpleMovingAverage::new(20).map_err(map_err)?;
        let mut sma_50 = SimpleMovingAverage::new(50).map_err(map_err)?;
        let mut ema_12 = ExponentialMovingAverage::new(12).map_err(map_err)?;
        let mut ema_26 = ExponentialMovingAverage::new(26).map_err(map_err)?;

        let mut snapshot = IndicatorSnapshot {
            price: 0.0,
            rsi: 50.0,
            macd: 0.0,
            macd_signal: 0.0,
            macd_histogram: 0.0,
            bb_upper: 0.0,
            bb_lower: 0.0,
            sma_20: 0.0,
            sma_50: 0.0,
            ema_12: 0.0,
            ema_26: 0.0,
        };

        for bar in bars {
            let price = bar.close;
            let macd_out = macd.next(price);
            let bb_out = bb.next(price);
            snapshot.price = price;
            let rsi_value = rsi.next(price);
            // no movement at all leaves RSI undefined
            snapshot.rsi = if rsi_value.is_finite() { rsi_value } else { 50.0 };
            snapshot.macd = macd_out.macd;
            snapshot.macd_signal = macd_out.signal;
            snapshot.macd_histogram = macd_out.histogram;
            snapshot.bb_upper = bb_out.upper;
            snapshot.bb_lower = bb_out.lower;
            snapshot.sma_20 = sma_20.next(price);
            snapshot.sma_50 = sma_50.next(price);
            snapshot.ema_12 = ema_12.next(price);
            snapshot.ema_26 = ema_26.next(price);
        }

        Ok(snapshot)
    }
}

fn rsi_vote(rsi: f64) -> Vote {
    if rsi > 70.0 {
        Vote::sell((rsi - 70.0) / 30.0)
    } else if rsi < 30.0 {
        Vote::buy((30.0 - rsi) / 30.0)
    } else {
        Vote::neutral()
    }
}

fn macd_vote(macd: f64, signal: f64, histogram: f64) -> Vote {
    let strength = (histogram.abs() / 10.0).min(1.0);
    if macd > signal && histogram > 0.0 {
        Vote::buy(strength)
    } else if macd < signal && histogram < 0.0 {
        Vote::sell(strength)
    } else {
        Vote::neutral()
    }
}

fn bollinger_vote(price: f64, upper: f64, lower: f64) -> Vote {
    if price > upper {
        Vote::sell(0.8)
    } else if price < lower {
        Vote::buy(0.8)
    } else {
        Vote::neutral()
    }
}

fn sma_vote(price: f64, sma_20: f64, sma_50: f64) -> Vote {
    if price > sma_20 && sma_20 > sma_50 {
        Vote::buy(0.6)
    } else if price < sma_20 && sma_20 < sma_50 {
        Vote::sell(0.6)
    } else {
        Vote::neutral()
    }
}

fn ema_vote(ema_12: f64, ema_26: f64) -> Vote {
    if ema_12 > ema_26 {
        Vote::buy(0.5)
    } else if ema_12 < ema_26 {
        Vote::sell(0.5)
    } else {
        Vote::neutral()
    }
}

fn average_strength(votes: &[Vote], side: Signal) -> (usize, f64) {
    let matching: Vec<f64> = votes
        .iter()
        .filter(|v| v.signal == side)
        .map(|v| v.strength)
        .collect();
    if matching.is_empty() {
        return (0, 0.0);
    }
    (matching.len(), matching.iter().sum::<f64>() / matching.len() as f64)
}

fn summarize(votes: &[Vote], snapshot: &IndicatorSnapshot) -> TechnicalSummary {
    let (buy_votes, buy_strength) = average_strength(votes, Signal::Buy);
    let (sell_votes, sell_strength) = average_strength(votes, Signal::Sell);

    let (direction, strength) =
        if buy_strength > sell_strength && buy_strength > MIN_DIRECTION_STRENGTH {
            (Signal::Buy, buy_strength)
        } else if sell_strength > buy_strength && sell_strength > MIN_DIRECTION_STRENGTH {
            (Signal::Sell, sell_strength)
        } else {
            (Signal::Hold, buy_strength.max(sell_strength))
        };

    TechnicalSummary {
        direction,
        strength,
        buy_votes,
        sell_votes,
        neutral_votes: votes.len() - buy_votes - sell_votes,
        rsi: snapshot.rsi,
        macd_histogram: snapshot.macd_histogram,
        price: snapshot.price,
    }
}
