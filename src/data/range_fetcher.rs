use {
    anyhow::{Context, Result, bail},
    chrono::NaiveDate,
    itertools::Itertools,
};

use crate::{
    config::BINANCE,
    data::{Kline, KlineSource, convert_klines},
    domain::{FetchWindow, OhlcRecord},
    logging::LogSink,
    utils::{TimeUtils, day_bounds_ms},
};

#[cfg(debug_assertions)]
use crate::config::DF;

/// Walks a day range through bounded one-minute windows and stitches the pages
/// into one ordered series.
///
/// Requests are strictly serial: each window's continue/stop decision depends
/// on the size of the page before it.
pub struct RangeFetcher<S: KlineSource> {
    source: S,
    page_limit: usize,
    log: LogSink,
}

impl<S: KlineSource> RangeFetcher<S> {
    pub fn new(source: S, log: LogSink) -> Self {
        Self {
            source,
            page_limit: BINANCE.limits.klines_page_limit as usize,
            log,
        }
    }

    /// Overrides the per-call candle cap (and with it the window width).
    pub fn with_page_limit(mut self, page_limit: usize) -> Self {
        self.page_limit = page_limit.max(1);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn window_span_ms(&self) -> i64 {
        self.page_limit as i64 * TimeUtils::MS_IN_MIN
    }

    /// Records for every day in `date_from..=date_to`, days in ascending order.
    ///
    /// All-or-nothing: the first failed day aborts the range and nothing fetched
    /// so far is returned. `date_from > date_to` is an empty result, not an error.
    pub async fn fetch(
        &self,
        symbol: &str,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> Result<Vec<OhlcRecord>> {
        if symbol.trim().is_empty() {
            bail!("symbol must not be empty");
        }
        if date_from > date_to {
            log::warn!(
                target: self.log.target(),
                "Empty range for {}: {} is after {}",
                symbol,
                date_from,
                date_to
            );
            return Ok(Vec::new());
        }

        let mut all_records = Vec::new();
        for day in date_from.iter_days().take_while(|day| *day <= date_to) {
            let day_records = self
                .fetch_day(symbol, day)
                .await
                .with_context(|| format!("Range fetch {} {}..={} aborted", symbol, date_from, date_to))?;
            all_records.extend(day_records);
        }
        Ok(all_records)
    }

    /// One UTC day, paged in windows of `page_limit` minutes.
    ///
    /// A page shorter than `page_limit` ends the day, even if it arrived before
    /// the last window. A truncated mid-day page therefore under-fetches the day.
    pub async fn fetch_day(&self, symbol: &str, day: NaiveDate) -> Result<Vec<OhlcRecord>> {
        log::info!(target: self.log.target(), "Fetching data for {} on {}", symbol, day);

        let (start_of_day, end_of_day) = day_bounds_ms(day)?;
        let span = self.window_span_ms();
        let mut next_window = Some(FetchWindow::clipped(start_of_day, span, end_of_day));
        let mut klines: Vec<Kline> = Vec::new();
        let mut requests = 0usize;

        while let Some(window) = next_window {
            let raw = self
                .source
                .fetch_window(symbol, window, self.page_limit as i32)
                .await
                .with_context(|| format!("{} {} klines request {} failed", symbol, BINANCE.kline_interval, window))?;
            requests += 1;

            let raw_count = raw.len();
            let page = convert_klines(&raw).map_err(|e| {
                anyhow::Error::new(e).context(format!("{} {} convert_klines failed", symbol, window))
            })?;
            let _dropped = append_after_seam(&mut klines, page);

            #[cfg(debug_assertions)]
            if DF.log_fetch_windows {
                log::debug!(
                    target: self.log.target(),
                    "{} window {} returned {} klines",
                    symbol,
                    window,
                    raw_count
                );
            }
            #[cfg(debug_assertions)]
            if DF.log_seam_dedupe && _dropped > 0 {
                log::debug!(
                    target: self.log.target(),
                    "{} window {} dropped {} klines already seen at the seam",
                    symbol,
                    window,
                    _dropped
                );
            }

            if raw_count < self.page_limit {
                break;
            }
            next_window = window.advance(span, end_of_day);
        }

        let gaps = count_upstream_gaps(&klines);
        if gaps > 0 {
            log::info!(
                target: self.log.target(),
                "{} on {}: upstream has {} gap(s); returned as-is",
                symbol,
                day,
                gaps
            );
        }

        let records = klines
            .into_iter()
            .map(|k| k.into_record(symbol))
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("{} on {} record transform failed", symbol, day))?;

        log::info!(
            target: self.log.target(),
            "Finished fetching data for {}: {} records in {} requests",
            day,
            records.len(),
            requests
        );
        Ok(records)
    }
}

/// Appends `page`, skipping its leading klines that do not come after what is
/// already held. Returns how many were skipped.
fn append_after_seam(day: &mut Vec<Kline>, page: Vec<Kline>) -> usize {
    let skip = match day.last() {
        Some(last) => page
            .iter()
            .take_while(|k| k.open_time_ms <= last.open_time_ms)
            .count(),
        None => 0,
    };
    day.extend(page.into_iter().skip(skip));
    skip
}

fn count_upstream_gaps(klines: &[Kline]) -> usize {
    klines
        .iter()
        .tuple_windows()
        .filter(|(a, b)| b.open_time_ms - a.open_time_ms > TimeUtils::MS_IN_MIN)
        .count()
}
