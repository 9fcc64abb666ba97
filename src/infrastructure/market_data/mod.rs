pub mod csv_feed;
pub mod resilient;
pub mod synthetic;
pub mod yahoo;

pub use csv_feed::CsvBarFeed;
pub use resilient::ResilientDataFeed;
pub use synthetic::SyntheticSeries;
pub use yahoo::YahooChartFeed;
