//! Headline sentiment using VADER with financial keyword boosting.
//!
//! VADER's general lexicon misses much of market jargon ("downgrade",
//! "beats estimates", "sell-off"), so a small keyword table nudges the
//! compound score before it is clamped back into [-1, 1].

use crate::domain::ports::SentimentScorer;
use crate::domain::signals::{Headline, SentimentLabel, SentimentReading};
use anyhow::Result;
use vader_sentiment::SentimentIntensityAnalyzer;

const BULLISH_KEYWORDS: &[(&str, f64)] = &[
    ("surge", 0.4),
    ("surges", 0.4),
    ("rally", 0.4),
    ("rallies", 0.4),
    ("soar", 0.5),
    ("soars", 0.5),
    ("bullish", 0.5),
    ("all-time high", 0.5),
    ("record high", 0.4),
    ("breakout", 0.3),
    ("upgrade", 0.3),
    ("beats estimates", 0.4),
    ("strong quarterly", 0.3),
    ("outperform", 0.3),
    ("partnership", 0.2),
    ("buyback", 0.2),
    ("expands", 0.1),
];

const BEARISH_KEYWORDS: &[(&str, f64)] = &[
    ("crash", -0.5),
    ("plunge", -0.5),
    ("plunges", -0.5),
    ("bearish", -0.5),
    ("collapse", -0.5),
    ("downgrade", -0.4),
    ("misses estimates", -0.4),
    ("lawsuit", -0.4),
    ("probe", -0.3),
    ("recall", -0.3),
    ("layoffs", -0.3),
    ("sell-off", -0.4),
    ("selloff", -0.4),
    ("regulatory", -0.2),
    ("volatility", -0.1),
    ("fraud", -0.5),
];

/// Above this magnitude a headline counts as positive or negative
pub const LABEL_THRESHOLD: f64 = 0.05;

pub struct LexiconSentimentScorer {
    analyzer: SentimentIntensityAnalyzer<'static>,
}

impl LexiconSentimentScorer {
    pub fn new() -> Self {
        Self {
            analyzer: SentimentIntensityAnalyzer::new(),
        }
    }

    fn financial_boost(&self, text: &str) -> f64 {
        let lower = text.to_lowercase();
        BULLISH_KEYWORDS
            .iter()
            .chain(BEARISH_KEYWORDS)
            .filter(|(keyword, _)| lower.contains(keyword))
            .map(|(_, score)| score)
            .sum()
    }

    /// Polarity of one piece of text in [-1, 1]
    pub fn analyze(&self, text: &str) -> f64 {
        if text.trim().is_empty() {
            return 0.0;
        }
        let scores = self.analyzer.polarity_scores(text);
        let compound = scores.get("compound").copied().unwrap_or(0.0);
        (compound + self.financial_boost(text) * 0.5).clamp(-1.0, 1.0)
    }
}

impl Default for LexiconSentimentScorer {
    fn default() -> Self {
        Self::new()
    }
}

fn label_for(score: f64) -> SentimentLabel {
    if score > LABEL_THRESHOLD {
        SentimentLabel::Positive
    } else if score < -LABEL_THRESHOLD {
        SentimentLabel::Negative
    } else {
        SentimentLabel::Neutral
    }
}

impl SentimentScorer for LexiconSentimentScorer {
    /// Mean polarity over headlines; confidence is the share of headlines
    /// whose own label matches the overall one.
    fn score(&self, headlines: &[Headline]) -> Result<SentimentReading> {
        if headlines.is_empty() {
            return Ok(SentimentReading::neutral());
        }

        let scores: Vec<f64> = headlines.iter().map(|h| self.analyze(&h.title)).collect();
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        let label = label_for(mean);
        let agreeing = scores.iter().filter(|s| label_for(**s) == label).count();

        Ok(SentimentReading {
            score: mean,
            label,
            confidence: agreeing as f64 / scores.len() as f64,
            headline_count: headlines.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headlines(titles: &[&str]) -> Vec<Headline> {
        titles
            .iter()
            .map(|t| Headline {
                title: t.to_string(),
                source: "test".to_string(),
                published: None,
            })
            .collect()
    }

    #[test]
    fn test_bullish_headlines() {
        let scorer = LexiconSentimentScorer::new();
        for headline in [
            "Apple shares surge to record high after strong quarterly results",
            "Analysts upgrade Nvidia as rally continues",
            "Tesla soars after earnings beats estimates",
        ] {
            let score = scorer.analyze(headline);
            assert!(score > 0.0, "expected bullish score for '{}', got {}", headline, score);
        }
    }

    #[test]
    fn test_bearish_headlines() {
        let scorer = LexiconSentimentScorer::new();
        for headline in [
            "Shares plunge as company misses estimates",
            "Regulators open fraud probe, stock collapses",
            "Broad sell-off drags market lower amid layoffs",
        ] {
            let score = scorer.analyze(headline);
            assert!(score < 0.0, "expected bearish score for '{}', got {}", headline, score);
        }
    }

    #[test]
    fn test_empty_text() {
        let scorer = LexiconSentimentScorer::new();
        assert_eq!(scorer.analyze(""), 0.0);
        assert_eq!(scorer.analyze("   "), 0.0);
    }

    #[test]
    fn test_score_aggregates_headlines() {
        let scorer = LexiconSentimentScorer::new();
        let reading = scorer
            .score(&headlines(&[
                "Stock soars to all-time high",
                "Analysts upgrade shares on bullish outlook",
                "Shares plunge after lawsuit",
            ]))
            .unwrap();
        assert_eq!(reading.headline_count, 3);
        assert_eq!(reading.label, SentimentLabel::Positive);
        assert!((reading.confidence - 2.0 / 3.0).abs() < 1e-9);
        assert!(reading.score > 0.0 && reading.score <= 1.0);
    }

    #[test]
    fn test_no_headlines_is_neutral() {
        let reading = LexiconSentimentScorer::new().score(&[]).unwrap();
        assert_eq!(reading, SentimentReading::neutral());
    }
}
