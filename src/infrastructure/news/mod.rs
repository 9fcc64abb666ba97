pub mod mock_news;
pub mod resilient;
pub mod rss;
pub mod sentiment_analyzer;

pub use mock_news::MockNewsFeed;
pub use resilient::ResilientNewsFeed;
pub use rss::RssNewsFeed;
pub use sentiment_analyzer::LexiconSentimentScorer;
