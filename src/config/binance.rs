pub struct BinanceApiConfig {
    pub timeout_ms: u64,
    pub retries: u32,
    pub backoff_ms: u64,
}

impl Default for BinanceApiConfig {
    fn default() -> Self {
        Self {
            timeout_ms: BINANCE.client.timeout_ms,
            retries: BINANCE.client.retries,
            backoff_ms: BINANCE.client.backoff_ms,
        }
    }
}

/// REST constraints: 500 one-minute klines per page, weight budget and call cost.
pub struct RestLimits {
    pub klines_page_limit: i32,
    pub weight_limit_minute: u32,
    pub kline_call_weight: u32,
}

pub struct ClientDefaults {
    pub timeout_ms: u64,
    /// Zero: a failed call is fatal for the whole range fetch.
    pub retries: u32,
    pub backoff_ms: u64,
}

pub struct BinanceConfig {
    pub limits: RestLimits,
    pub client: ClientDefaults,
    pub kline_interval: &'static str,
}

pub const BINANCE: BinanceConfig = BinanceConfig {
    limits: RestLimits {
        klines_page_limit: 500,
        weight_limit_minute: 6000,
        kline_call_weight: 2,
    },
    client: ClientDefaults {
        timeout_ms: 5000,
        retries: 0,
        backoff_ms: 0,
    },
    kline_interval: "1m",
};
