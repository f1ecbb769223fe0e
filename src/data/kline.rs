use {
    crate::{domain::OhlcRecord, utils::epoch_ms_to_record_time},
    serde_json::Value,
    std::{convert::TryFrom, error::Error, fmt},
};

/// One upstream candle tuple: `[open_time_ms, open, high, low, close, volume, ...]`.
pub type RawKline = Vec<Value>;

/// Typed form of a raw tuple. Trailing upstream fields are dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Kline {
    pub open_time_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum KlineError {
    InvalidLength(usize),
    InvalidType { field: &'static str, value: String },
    InvalidNumber { field: &'static str, value: String },
    InvalidTimestamp(i64),
}

impl fmt::Display for KlineError {
    fn fmt(&self, f: &mut fmt::Formatter) -> std::fmt::Result {
        match self {
            KlineError::InvalidLength(len) => {
                write!(f, "Invalid length: expected at least 6 fields, got {}", len)
            }
            KlineError::InvalidType { field, value } => {
                write!(f, "Invalid type for {}: {}", field, value)
            }
            KlineError::InvalidNumber { field, value } => {
                write!(f, "Invalid number for {}: {:?}", field, value)
            }
            KlineError::InvalidTimestamp(ms) => write!(f, "Invalid open time: {}ms", ms),
        }
    }
}

impl Error for KlineError {}

const PRICE_FIELDS: [&str; 5] = ["open", "high", "low", "close", "volume"];

fn parse_open_time(value: &Value) -> Result<i64, KlineError> {
    value.as_i64().ok_or_else(|| KlineError::InvalidType {
        field: "open_time",
        value: value.to_string(),
    })
}

// Numeric strings are the normal upstream encoding; plain JSON numbers are accepted too.
fn parse_f64(field: &'static str, value: &Value) -> Result<f64, KlineError> {
    match value {
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| KlineError::InvalidNumber {
            field,
            value: s.clone(),
        }),
        Value::Number(n) => n.as_f64().ok_or_else(|| KlineError::InvalidNumber {
            field,
            value: n.to_string(),
        }),
        other => Err(KlineError::InvalidType {
            field,
            value: other.to_string(),
        }),
    }
}

impl TryFrom<&[Value]> for Kline {
    type Error = KlineError;

    fn try_from(raw: &[Value]) -> Result<Self, Self::Error> {
        if raw.len() < 6 {
            return Err(KlineError::InvalidLength(raw.len()));
        }

        let open_time_ms = parse_open_time(&raw[0])?;
        let mut prices = [0.0; 5];
        for (slot, (field, value)) in prices
            .iter_mut()
            .zip(PRICE_FIELDS.iter().zip(&raw[1..6]))
        {
            *slot = parse_f64(*field, value)?;
        }
        let [open, high, low, close, volume] = prices;

        Ok(Kline {
            open_time_ms,
            open,
            high,
            low,
            close,
            volume,
        })
    }
}

pub fn convert_klines(raw: &[RawKline]) -> Result<Vec<Kline>, KlineError> {
    raw.iter().map(|k| Kline::try_from(k.as_slice())).collect()
}

impl Kline {
    /// Normalized record for `symbol`, which is copied verbatim.
    pub fn into_record(self, symbol: &str) -> Result<OhlcRecord, KlineError> {
        let timestamp = epoch_ms_to_record_time(self.open_time_ms)
            .ok_or(KlineError::InvalidTimestamp(self.open_time_ms))?;
        Ok(OhlcRecord::new(
            symbol,
            timestamp,
            self.open,
            self.high,
            self.low,
            self.close,
            self.volume,
        ))
    }
}
