use {
    crate::domain::OhlcRecord,
    tabled::{Table, Tabled, settings::Style},
};

/// Detail table row, columns in presentation order.
#[derive(Tabled)]
struct RecordRow<'a> {
    timestamp: &'a str,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    symbol: &'a str,
}

impl<'a> From<&'a OhlcRecord> for RecordRow<'a> {
    fn from(r: &'a OhlcRecord) -> Self {
        RecordRow {
            timestamp: r.timestamp(),
            open: r.open(),
            high: r.high(),
            low: r.low(),
            close: r.close(),
            volume: r.volume(),
            symbol: r.symbol(),
        }
    }
}

/// The most recent `limit` records as a text table.
pub(crate) fn records_table(records: &[OhlcRecord], limit: usize) -> String {
    let tail = &records[records.len().saturating_sub(limit)..];
    Table::new(tail.iter().map(RecordRow::from))
        .with(Style::rounded())
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_shows_only_the_latest_rows() {
        let records: Vec<_> = (0..5)
            .map(|m| {
                OhlcRecord::new(
                    "BTCUSDT",
                    format!("2024-04-10 00:0{}:00", m),
                    1.0,
                    2.0,
                    0.5,
                    1.5,
                    3.0,
                )
            })
            .collect();

        let table = records_table(&records, 2);

        for column in OhlcRecord::COLUMNS {
            assert!(table.contains(column));
        }
        assert!(table.contains("2024-04-10 00:04:00"));
        assert!(table.contains("2024-04-10 00:03:00"));
        assert!(!table.contains("2024-04-10 00:02:00"));
    }
}
