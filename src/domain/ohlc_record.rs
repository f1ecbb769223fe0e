use serde::{Deserialize, Serialize};

/// One normalized one-minute candle.
///
/// Fields are private so a record cannot change after the fetcher builds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcRecord {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    symbol: String,
}

impl OhlcRecord {
    /// Column names in the order the presentation layer expects them.
    pub const COLUMNS: [&'static str; 7] = [
        "timestamp", "open", "high", "low", "close", "volume", "symbol",
    ];

    pub fn new(
        symbol: impl Into<String>,
        timestamp: impl Into<String>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        OhlcRecord {
            timestamp: timestamp.into(),
            open,
            high,
            low,
            close,
            volume,
            symbol: symbol.into(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// "YYYY-MM-DD HH:MM:SS" in UTC.
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn open(&self) -> f64 {
        self.open
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn close(&self) -> f64 {
        self.close
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }
}

impl std::fmt::Display for OhlcRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} {} O:{} H:{} L:{} C:{} V:{}",
            self.symbol, self.timestamp, self.open, self.high, self.low, self.close, self.volume
        )
    }
}
