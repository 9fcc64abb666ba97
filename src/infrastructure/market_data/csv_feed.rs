use crate::domain::errors::DataError;
use crate::domain::market_data::{Bar, Period};
use crate::domain::ports::MarketDataFeed;
use anyhow::Result;
use async_trait::async_trait;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// Reads `{dir}/{instrument}.csv` with a `date,open,high,low,close,volume`
/// header, dates as `YYYY-MM-DD`.
pub struct CsvBarFeed {
    dir: PathBuf,
}

impl CsvBarFeed {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, instrument: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", instrument))
    }
}

#[async_trait]
impl MarketDataFeed for CsvBarFeed {
    async fn fetch_bars(&self, instrument: &str, period: Period) -> Result<Vec<Bar>> {
        let path = self.path_for(instrument);
        let instrument = instrument.to_string();
        // csv is blocking IO
        tokio::task::spawn_blocking(move || load_bars(&instrument, &path, period)).await?
    }
}

fn load_bars(instrument: &str, path: &Path, period: Period) -> Result<Vec<Bar>> {
    let file = File::open(path).map_err(|e| DataError::Unavailable {
        instrument: instrument.to_string(),
        reason: format!("{}: {}", path.display(), e),
    })?;
    read_bars(instrument, BufReader::new(file), period)
}

/// Bars sorted by date, limited to the calendar window of `period` ending
/// at the newest row.
pub fn read_bars<R: Read>(instrument: &str, reader: R, period: Period) -> Result<Vec<Bar>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut bars = Vec::new();
    for (line, record) in rdr.deserialize::<Bar>().enumerate() {
        let bar = record.map_err(|e| DataError::Malformed {
            instrument: instrument.to_string(),
            reason: format!("row {}: {}", line + 1, e),
        })?;
        if bar.close > 0.0 {
            bars.push(bar);
        }
    }
    bars.sort_by_key(|b| b.date);

    if let Some(last) = bars.last().map(|b| b.date) {
        let window_start = last - chrono::Duration::days(period.synthetic_days() as i64);
        bars.retain(|b| b.date > window_start);
    }
    Ok(bars)
}
