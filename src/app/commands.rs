use {
    anyhow::Result,
    chrono::NaiveDate,
};

use crate::{
    Cli, Command,
    app::records_table,
    config::{BINANCE, SYMBOLS},
    data::{
        BinanceKlineSource, FeatureGroupSpec, RangeFetcher, RequestWeightLimiter,
        SqliteFeatureGroup, SqliteFeatureStore,
    },
    engine::IngestionCoordinator,
    logging::LogSink,
    utils::today_utc,
};

type LiveCoordinator = IngestionCoordinator<BinanceKlineSource, SqliteFeatureGroup>;

/// Startup wiring: open the store, get or create the group, build the fetch chain.
async fn build_coordinator(cli: &Cli) -> Result<LiveCoordinator> {
    let store = SqliteFeatureStore::new(&cli.db_path, LogSink::new("FeatureStore")).await?;

    // Keyed on symbol too, so two pairs sharing a minute do not overwrite each other
    let spec = FeatureGroupSpec::default().with_primary_key(&["symbol", "timestamp"]);
    let group = store.get_or_create_group(&spec).await?;

    let limiter = RequestWeightLimiter::new(BINANCE.limits.weight_limit_minute);
    let source = BinanceKlineSource::new(limiter, LogSink::new("BinanceKlineSource"))?;

    Ok(IngestionCoordinator::new(
        RangeFetcher::new(source, LogSink::new("RangeFetcher")),
        group,
        LogSink::new("IngestionCoordinator"),
    ))
}

fn warn_if_unsupported(symbol: &str) {
    if !SYMBOLS.is_supported(symbol) {
        log::warn!(
            "{} is not one of the dashboard pairs {:?}; fetching anyway.",
            symbol,
            SYMBOLS.supported
        );
    }
}

async fn ingest(
    coordinator: &LiveCoordinator,
    symbol: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<()> {
    warn_if_unsupported(symbol);
    match coordinator.ingest(symbol, from, to).await {
        Ok(report) => {
            println!(
                "Data refreshed successfully! {} records for {} ({} to {}).",
                report.stored, report.symbol, report.date_from, report.date_to
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", e);
            Err(e.into())
        }
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    let coordinator = build_coordinator(&cli).await?;

    match &cli.command {
        Command::Init { symbol } => {
            warn_if_unsupported(symbol);
            let report = coordinator
                .initialize_with_recent_data(symbol, today_utc())
                .await?;
            println!(
                "Initial data populated: {} records for {}.",
                report.stored, report.symbol
            );
        }
        Command::Ingest { symbol, from, to } => {
            ingest(&coordinator, symbol, *from, *to).await?;
        }
        Command::Query { symbol, limit } => {
            let records = coordinator.query(symbol).await?;
            if records.is_empty() {
                println!("No data available for {}.", symbol);
            } else {
                println!("OHLC data for {} ({} records)", symbol, records.len());
                println!("{}", records_table(&records, *limit));
            }
        }
    }
    Ok(())
}
