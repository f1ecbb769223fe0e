use {
    chrono::NaiveDate,
    std::{error::Error, fmt},
};

use crate::{
    data::{FeatureGroup, KlineSource, RangeFetcher, ReadError, ReadMode},
    domain::OhlcRecord,
    logging::LogSink,
};

/// Outcome of a successful `ingest`.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub symbol: String,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub stored: u64,
}

#[derive(Debug)]
pub enum IngestError {
    Fetch(anyhow::Error),
    NoData {
        symbol: String,
        date_from: NaiveDate,
        date_to: NaiveDate,
    },
    Store(anyhow::Error),
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter) -> std::fmt::Result {
        match self {
            IngestError::Fetch(e) => write!(f, "Failed to fetch new data: {:#}", e),
            IngestError::NoData {
                symbol,
                date_from,
                date_to,
            } => write!(
                f,
                "Failed to fetch new data: no records for {} between {} and {}",
                symbol, date_from, date_to
            ),
            IngestError::Store(e) => write!(f, "Error storing data in feature group: {:#}", e),
        }
    }
}

impl Error for IngestError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            IngestError::Fetch(e) | IngestError::Store(e) => Some(&**e),
            IngestError::NoData { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryError {
    /// Both the primary read and its single fallback failed.
    ReadFailed {
        primary: ReadError,
        fallback: ReadError,
    },
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> std::fmt::Result {
        match self {
            QueryError::ReadFailed { primary, fallback } => write!(
                f,
                "Failed to read data even with {} fallback: {} (primary: {})",
                fallback.mode(),
                fallback,
                primary
            ),
        }
    }
}

impl Error for QueryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            QueryError::ReadFailed { fallback, .. } => Some(fallback),
        }
    }
}

/// Bridges the range fetcher to a feature group and serves symbol queries.
pub struct IngestionCoordinator<S: KlineSource, G: FeatureGroup> {
    fetcher: RangeFetcher<S>,
    group: G,
    log: LogSink,
}

impl<S: KlineSource, G: FeatureGroup> IngestionCoordinator<S, G> {
    pub fn new(fetcher: RangeFetcher<S>, group: G, log: LogSink) -> Self {
        Self {
            fetcher,
            group,
            log,
        }
    }

    pub fn group(&self) -> &G {
        &self.group
    }

    /// Fetches the range and appends it as one batch. An empty fetch is a failure and nothing is written.
    pub async fn ingest(
        &self,
        symbol: &str,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> Result<IngestReport, IngestError> {
        let records = self
            .fetcher
            .fetch(symbol, date_from, date_to)
            .await
            .map_err(|e| {
                log::error!(target: self.log.target(), "Fetch failed for {}: {:#}", symbol, e);
                IngestError::Fetch(e)
            })?;

        if records.is_empty() {
            log::error!(
                target: self.log.target(),
                "No data fetched for {} between {} and {}",
                symbol,
                date_from,
                date_to
            );
            return Err(IngestError::NoData {
                symbol: symbol.to_string(),
                date_from,
                date_to,
            });
        }

        let stored = self.group.append(&records).await.map_err(|e| {
            log::error!(
                target: self.log.target(),
                "Error storing data in feature group '{}': {:#}",
                self.group.name(),
                e
            );
            IngestError::Store(e)
        })?;

        log::info!(
            target: self.log.target(),
            "Data refreshed successfully: {} records for {} ({}..={})",
            stored,
            symbol,
            date_from,
            date_to
        );
        Ok(IngestReport {
            symbol: symbol.to_string(),
            date_from,
            date_to,
            stored,
        })
    }

    /// Seeds the group with yesterday and today for `symbol`.
    pub async fn initialize_with_recent_data(
        &self,
        symbol: &str,
        today: NaiveDate,
    ) -> Result<IngestReport, IngestError> {
        log::info!(target: self.log.target(), "Initializing feature group with data.");
        let yesterday = today.pred_opt().unwrap_or(today);
        let report = self.ingest(symbol, yesterday, today).await?;
        log::info!(target: self.log.target(), "Initial data populated successfully.");
        Ok(report)
    }

    /// All stored records for `symbol`, ordered by timestamp.
    ///
    /// The primary read is retried once in the fallback mode; if that fails too the
    /// error is returned, never an empty result.
    pub async fn query(&self, symbol: &str) -> Result<Vec<OhlcRecord>, QueryError> {
        let table = match self.group.read_all(ReadMode::PRIMARY).await {
            Ok(table) => table,
            Err(primary) => {
                match &primary {
                    ReadError::PathUnavailable { .. } => log::warn!(
                        target: self.log.target(),
                        "Primary read path unavailable, attempting {} fallback: {}",
                        ReadMode::FALLBACK,
                        primary
                    ),
                    ReadError::Query { .. } | ReadError::Decode { .. } => log::warn!(
                        target: self.log.target(),
                        "Primary read failed, attempting {} fallback: {}",
                        ReadMode::FALLBACK,
                        primary
                    ),
                }
                match self.group.read_all(ReadMode::FALLBACK).await {
                    Ok(table) => table,
                    Err(fallback) => {
                        log::error!(
                            target: self.log.target(),
                            "Failed to read data even with {} fallback: {}",
                            ReadMode::FALLBACK,
                            fallback
                        );
                        return Err(QueryError::ReadFailed { primary, fallback });
                    }
                }
            }
        };

        Ok(table
            .into_iter()
            .filter(|record| record.symbol() == symbol)
            .collect())
    }
}
