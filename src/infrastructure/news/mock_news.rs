use crate::domain::ports::NewsFeed;
use crate::domain::signals::Headline;
use anyhow::Result;
use async_trait::async_trait;

const TEMPLATES: &[&str] = &[
    "{} reports strong quarterly earnings",
    "Analysts upgrade {} stock rating",
    "{} announces new product launch",
    "Market volatility affects {} shares",
    "{} expands into new markets",
];

/// Canned headlines used offline and when every live source fails
pub struct MockNewsFeed;

impl MockNewsFeed {
    pub fn new() -> Self {
        Self
    }

    pub fn headlines(instrument: &str) -> Vec<Headline> {
        TEMPLATES
            .iter()
            .map(|t| Headline {
                title: t.replace("{}", instrument),
                source: "mock".to_string(),
                published: None,
            })
            .collect()
    }
}

impl Default for MockNewsFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NewsFeed for MockNewsFeed {
    async fn fetch_headlines(&self, instrument: &str) -> Result<Vec<Headline>> {
        Ok(Self::headlines(instrument))
    }
}
