use crate::domain::ports::NewsFeed;
use crate::domain::signals::Headline;
use crate::infrastructure::cache::TtlCache;
use crate::infrastructure::news::mock_news::MockNewsFeed;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Tries each source in order under a timeout, caching the first
/// non-empty answer. Ends with the canned headlines, so it never fails.
pub struct ResilientNewsFeed {
    sources: Vec<Arc<dyn NewsFeed>>,
    cache: Arc<TtlCache<Vec<Headline>>>,
    timeout: Duration,
}

impl ResilientNewsFeed {
    pub fn new(
        sources: Vec<Arc<dyn NewsFeed>>,
        cache: Arc<TtlCache<Vec<Headline>>>,
        timeout: Duration,
    ) -> Self {
        Self {
            sources,
            cache,
            timeout,
        }
    }

    async fn try_source(&self, source: &Arc<dyn NewsFeed>, instrument: &str) -> Result<Vec<Headline>> {
        match tokio::time::timeout(self.timeout, source.fetch_headlines(instrument)).await {
            Ok(result) => result,
            Err(_) => anyhow::bail!("timed out after {}ms", self.timeout.as_millis()),
        }
    }
}

#[async_trait]
impl NewsFeed for ResilientNewsFeed {
    async fn fetch_headlines(&self, instrument: &str) -> Result<Vec<Headline>> {
        let key = format!("news_{}", instrument);
        if let Some(headlines) = self.cache.get(&key) {
            return Ok(headlines);
        }

        for (index, source) in self.sources.iter().enumerate() {
            match self.try_source(source, instrument).await {
                Ok(headlines) if !headlines.is_empty() => {
                    debug!(
                        "News [{}]: {} headlines from source {}",
                        instrument,
                        headlines.len(),
                        index
                    );
                    self.cache.set(key, headlines.clone());
                    return Ok(headlines);
                }
                Ok(_) => debug!("News [{}]: source {} had no headlines", instrument, index),
                Err(e) => warn!("News [{}]: source {} failed: {:#}", instrument, index, e),
            }
        }

        let headlines = MockNewsFeed::headlines(instrument);
        self.cache.set(key, headlines.clone());
        Ok(headlines)
    }
}
