use {
    anyhow::Result,
    async_trait::async_trait,
    binance_sdk::{
        config::ConfigurationRestApi,
        errors::{self, ConnectorError as connection_error},
        spot::{
            SpotRestApi,
            rest_api::{KlinesIntervalEnum, KlinesItemInner, KlinesParams, RestApi},
        },
    },
    serde_json::Value,
    std::{error::Error, fmt},
};

use crate::{
    config::{BINANCE, BinanceApiConfig},
    data::{RawKline, RequestWeightLimiter},
    domain::FetchWindow,
    logging::LogSink,
};

/// Abstract interface for the upstream one-minute candle endpoint.
#[async_trait]
pub trait KlineSource: Send + Sync {
    /// One bounded request: one-minute klines for `symbol` inside `window`, at most `limit`.
    async fn fetch_window(
        &self,
        symbol: &str,
        window: FetchWindow,
        limit: i32,
    ) -> Result<Vec<RawKline>>;
}

#[derive(Debug)]
pub enum SourceError {
    ConnectionFailed(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> std::fmt::Result {
        match self {
            SourceError::ConnectionFailed(msg) => {
                write!(f, "Binance API connection failed: {}.", msg)
            }
        }
    }
}

impl Error for SourceError {}

/// Spot REST klines client. Retries are disabled so a failed call surfaces immediately.
pub struct BinanceKlineSource {
    rest_client: RestApi,
    limiter: RequestWeightLimiter,
    log: LogSink,
}

impl BinanceKlineSource {
    pub fn new(limiter: RequestWeightLimiter, log: LogSink) -> Result<Self> {
        let config = BinanceApiConfig::default();
        let rest_conf = ConfigurationRestApi::builder()
            .timeout(config.timeout_ms)
            .retries(config.retries)
            .backoff(config.backoff_ms)
            .build()?;
        Ok(Self {
            rest_client: SpotRestApi::production(rest_conf),
            limiter,
            log,
        })
    }
}

fn kline_item_to_json(item: KlinesItemInner) -> Value {
    match item {
        KlinesItemInner::Integer(i) => Value::from(i),
        KlinesItemInner::String(s) => Value::String(s),
        // Anything else fails the typed parse downstream
        #[allow(unreachable_patterns)]
        _ => Value::Null,
    }
}

fn log_connector_error(
    log: &LogSink,
    conn_err: &errors::ConnectorError,
    symbol: &str,
    window: FetchWindow,
) {
    let target = log.target();
    match conn_err {
        connection_error::ConnectorClientError(msg) => {
            log::error!(
                target: target,
                "{} {} Client error: check request parameters. {}",
                symbol,
                window,
                msg
            );
        }
        connection_error::TooManyRequestsError(msg) => {
            log::warn!(
                target: target,
                "{} {} Rate limit exceeded. {}",
                symbol,
                window,
                msg
            );
        }
        connection_error::RateLimitBanError(msg) => {
            log::error!(
                target: target,
                "{} {} IP address banned due to excessive rate limits. {}",
                symbol,
                window,
                msg
            );
        }
        errors::ConnectorError::ServerError { msg, status_code } => {
            log::error!(
                target: target,
                "{} {} Server error: {} (status code: {:?})",
                symbol,
                window,
                msg,
                status_code
            );
        }
        errors::ConnectorError::NetworkError(msg) => {
            log::error!(
                target: target,
                "{} {} Network error: check internet connection. {}",
                symbol,
                window,
                msg
            );
        }
        connection_error::BadRequestError(msg) => {
            log::warn!(
                target: target,
                "{} {} Bad request: verify input parameters. {}",
                symbol,
                window,
                msg
            );
        }
        other => {
            log::error!(
                target: target,
                "{} {} Unexpected connector error: {:?}",
                symbol,
                window,
                other
            );
        }
    }
}

#[async_trait]
impl KlineSource for BinanceKlineSource {
    async fn fetch_window(
        &self,
        symbol: &str,
        window: FetchWindow,
        limit: i32,
    ) -> Result<Vec<RawKline>> {
        self.limiter
            .acquire(BINANCE.limits.kline_call_weight, symbol)
            .await;

        let params = KlinesParams::builder(symbol.to_string(), KlinesIntervalEnum::Interval1m)
            .limit(limit)
            .start_time(Some(window.start_ms))
            .end_time(Some(window.end_ms))
            .build()?;

        match self.rest_client.klines(params).await {
            Ok(response) => {
                let data = response.data().await?;
                Ok(data
                    .into_iter()
                    .map(|tuple| tuple.into_iter().map(kline_item_to_json).collect())
                    .collect())
            }
            Err(e) => {
                if let Some(conn_err) = e.downcast_ref::<errors::ConnectorError>() {
                    log_connector_error(&self.log, conn_err, symbol, window);
                    Err(
                        anyhow::Error::new(SourceError::ConnectionFailed(conn_err.to_string()))
                            .context(format!("Binance klines call failed for {} {}", symbol, window)),
                    )
                } else {
                    log::error!(
                        target: self.log.target(),
                        "Unexpected error for {} {}: {:#}",
                        symbol,
                        window,
                        e
                    );
                    Err(anyhow::Error::new(SourceError::ConnectionFailed(e.to_string()))
                        .context(format!("Unexpected error during klines call for {}", symbol)))
                }
            }
        }
    }
}
