use crate::domain::errors::DataError;
use crate::domain::ports::NewsFeed;
use crate::domain::signals::Headline;
use crate::infrastructure::http_client_factory::{HttpClientFactory, build_url_with_query};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest_middleware::ClientWithMiddleware;
use rss::Channel;
use std::io::Cursor;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_HEADLINE_URL: &str = "https://feeds.finance.yahoo.com/rss/2.0/headline";

/// Per-instrument headlines from an RSS 2.0 endpoint (`?s={instrument}`)
pub struct RssNewsFeed {
    client: ClientWithMiddleware,
    url: String,
    max_items: usize,
}

impl RssNewsFeed {
    pub fn new(timeout: Duration) -> Self {
        Self::with_url(DEFAULT_HEADLINE_URL, timeout)
    }

    pub fn with_url(url: &str, timeout: Duration) -> Self {
        Self {
            client: HttpClientFactory::create_client_with_retries(timeout, 1),
            url: url.to_string(),
            max_items: 10,
        }
    }
}

#[async_trait]
impl NewsFeed for RssNewsFeed {
    async fn fetch_headlines(&self, instrument: &str) -> Result<Vec<Headline>> {
        let url = build_url_with_query(
            &self.url,
            &[("s", instrument), ("region", "US"), ("lang", "en-US")],
        )?;
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch headlines for {}", instrument))?;
        if !response.status().is_success() {
            return Err(DataError::Unavailable {
                instrument: instrument.to_string(),
                reason: format!("HTTP {}", response.status()),
            }
            .into());
        }
        let bytes = response.bytes().await.context("Failed to read RSS body")?;
        let headlines = parse_channel(instrument, &bytes, self.max_items)?;
        debug!("RssNewsFeed: {} headlines for {}", headlines.len(), instrument);
        Ok(headlines)
    }
}

pub fn parse_channel(instrument: &str, bytes: &[u8], max_items: usize) -> Result<Vec<Headline>> {
    let channel = Channel::read_from(Cursor::new(bytes)).map_err(|e| DataError::Malformed {
        instrument: instrument.to_string(),
        reason: e.to_string(),
    })?;
    let source = channel.title().to_string();

    Ok(channel
        .items()
        .iter()
        .filter_map(|item| {
            let title = item.title()?.trim();
            if title.is_empty() {
                return None;
            }
            // RSS dates are RFC 2822
            let published = item
                .pub_date()
                .and_then(|d| DateTime::parse_from_rfc2822(d).ok())
                .map(|d| d.with_timezone(&Utc));
            Some(Headline {
                title: title.to_string(),
                source: source.clone(),
                published,
            })
        })
        .take(max_items)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel>
  <title>Yahoo! Finance: AAPL News</title>
  <link>https://finance.yahoo.com</link>
  <description>Latest headlines</description>
  <item>
    <title>Apple shares rally after record quarter</title>
    <pubDate>Tue, 02 Jan 2024 14:30:00 +0000</pubDate>
  </item>
  <item><title>   </title></item>
  <item><title>Analysts upgrade Apple</title></item>
</channel></rss>"#;

    #[test]
    fn test_parse_channel() {
        let headlines = parse_channel("AAPL", FEED.as_bytes(), 10).unwrap();
        assert_eq!(headlines.len(), 2);
        assert_eq!(headlines[0].title, "Apple shares rally after record quarter");
        assert_eq!(headlines[0].source, "Yahoo! Finance: AAPL News");
        assert_eq!(
            headlines[0].published.map(|d| d.to_rfc3339()),
            Some("2024-01-02T14:30:00+00:00".to_string())
        );
        assert!(headlines[1].published.is_none());
    }

    #[test]
    fn test_parse_channel_limits_items() {
        assert_eq!(parse_channel("AAPL", FEED.as_bytes(), 1).unwrap().len(), 1);
    }

    #[test]
    fn test_parse_channel_rejects_html() {
        assert!(parse_channel("AAPL", b"<html><body>blocked</body></html>", 10).is_err());
    }
}
