use crate::domain::signals::{Prediction, SentimentReading, Signal, TechnicalSummary};
use crate::domain::workflow::PromptStyle;

/// Combined votes inside this band produce a hold
const HOLD_BAND: f64 = 0.05;

/// Deterministic prediction from whatever analysis a workflow produced.
pub struct RuleBasedPredictor;

impl RuleBasedPredictor {
    pub fn predict(
        technical: Option<&TechnicalSummary>,
        sentiment: Option<&SentimentReading>,
        style: PromptStyle,
    ) -> Prediction {
        let (tech_weight, sentiment_weight) = match style {
            PromptStyle::Standard => (0.7, 0.3),
            PromptStyle::MultiFactor => (0.5, 0.5),
        };

        let mut weighted = 0.0;
        let mut total_weight = 0.0;
        let mut reasons = Vec::new();

        if let Some(tech) = technical {
            let vote = match tech.direction {
                Signal::Buy => tech.strength,
                Signal::Sell => -tech.strength,
                Signal::Hold => 0.0,
            };
            weighted += tech_weight * vote;
            total_weight += tech_weight;
            reasons.push(format!(
                "technical {} ({:.2}, {}B/{}S/{}N)",
                tech.direction, tech.strength, tech.buy_votes, tech.sell_votes, tech.neutral_votes
            ));
        }

        if let Some(reading) = sentiment {
            weighted += sentiment_weight * reading.score.clamp(-1.0, 1.0);
            total_weight += sentiment_weight;
            reasons.push(format!(
                "sentiment {:.2} over {} headlines",
                reading.score, reading.headline_count
            ));
        }

        if total_weight == 0.0 {
            return Prediction::hold("no analysis available");
        }

        let combined = (weighted / total_weight).clamp(-1.0, 1.0);
        let signal = if combined > HOLD_BAND {
            Signal::Buy
        } else if combined < -HOLD_BAND {
            Signal::Sell
        } else {
            Signal::Hold
        };

        Prediction::new(signal, 0.5 + 0.5 * combined.abs(), reasons.join("; "))
    }
}

/// Directional calls below `threshold` are downgraded to hold.
pub fn apply_confidence_threshold(prediction: Prediction, threshold: f64) -> Prediction {
    if prediction.signal.is_directional() && prediction.confidence < threshold {
        return Prediction {
            signal: Signal::Hold,
            reasoning: format!(
                "{} (confidence {:.2} below {:.2})",
                prediction.reasoning, prediction.confidence, threshold
            ),
            ..prediction
        };
    }
    prediction
}

/// Averages confidence with a second opinion, keeping the primary signal.
pub fn blend_confidence(primary: Prediction, secondary: &Prediction) -> Prediction {
    Prediction {
        confidence: ((primary.confidence + secondary.confidence) / 2.0).clamp(0.0, 1.0),
        ..primary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signals::SentimentLabel;

    fn tech(direction: Signal, strength: f64) -> TechnicalSummary {
        TechnicalSummary {
            direction,
            strength,
            buy_votes: 2,
            sell_votes: 1,
            neutral_votes: 2,
            rsi: 50.0,
            macd_histogram: 0.0,
            price: 100.0,
        }
    }

    fn sentiment(score: f64) -> SentimentReading {
        SentimentReading {
            score,
            label: SentimentLabel::Neutral,
            confidence: 1.0,
            headline_count: 5,
        }
    }

    #[test]
    fn test_technical_only_follows_direction() {
        let p = RuleBasedPredictor::predict(
            Some(&tech(Signal::Sell, 0.6)),
            None,
            PromptStyle::Standard,
        );
        assert_eq!(p.signal, Signal::Sell);
        assert!((p.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_multi_factor_lets_sentiment_flip_weak_technicals() {
        let t = tech(Signal::Buy, 0.35);
        let s = sentiment(-0.9);

        let standard = RuleBasedPredictor::predict(Some(&t), Some(&s), PromptStyle::Standard);
        let multi = RuleBasedPredictor::predict(Some(&t), Some(&s), PromptStyle::MultiFactor);

        // 0.7 * 0.35 - 0.3 * 0.9 = -0.025 -> hold; 0.5 * (0.35 - 0.9) -> sell
        assert_eq!(standard.signal, Signal::Hold);
        assert_eq!(multi.signal, Signal::Sell);
    }

    #[test]
    fn test_no_inputs_holds() {
        let p = RuleBasedPredictor::predict(None, None, PromptStyle::Standard);
        assert_eq!(p.signal, Signal::Hold);
    }

    #[test]
    fn test_threshold_downgrades_only_directional_calls() {
        let weak = Prediction::new(Signal::Buy, 0.6, "weak");
        assert_eq!(apply_confidence_threshold(weak, 0.65).signal, Signal::Hold);

        let strong = Prediction::new(Signal::Buy, 0.7, "strong");
        assert_eq!(apply_confidence_threshold(strong, 0.65).signal, Signal::Buy);

        let hold = Prediction::new(Signal::Hold, 0.1, "hold");
        assert_eq!(apply_confidence_threshold(hold.clone(), 0.65), hold);
    }

    #[test]
    fn test_blend_keeps_primary_signal() {
        let primary = Prediction::new(Signal::Sell, 0.9, "primary");
        let secondary = Prediction::new(Signal::Buy, 0.5, "secondary");
        let blended = blend_confidence(primary, &secondary);
        assert_eq!(blended.signal, Signal::Sell);
        assert!((blended.confidence - 0.7).abs() < 1e-9);
    }
}
