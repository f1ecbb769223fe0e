mod kline;
mod kline_source;
mod range_fetcher;
mod rate_limiter;
mod storage;

pub use {
    kline::{Kline, KlineError, RawKline, convert_klines},
    kline_source::{BinanceKlineSource, KlineSource, SourceError},
    range_fetcher::RangeFetcher,
    rate_limiter::RequestWeightLimiter,
    storage::{
        FeatureGroup, FeatureGroupSpec, ReadError, ReadMode, SqliteFeatureGroup,
        SqliteFeatureStore,
    },
};
