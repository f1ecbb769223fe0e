//! File persistence and storage configuration

/// Where the SQLite feature store lives
pub struct StoreConfig {
    pub db_path: &'static str,
}

/// The feature group the dashboard reads from
pub struct FeatureGroupDefaults {
    pub name: &'static str,
    pub description: &'static str,
    pub version: u32,
}

/// Log output locations (created by `init_logging`, never on import)
pub struct LogPersistenceConfig {
    pub directory: &'static str,
    pub filename: &'static str,
}

/// The Master Persistence Configuration
pub struct PersistenceConfig {
    pub store: StoreConfig,
    pub group: FeatureGroupDefaults,
    pub logs: LogPersistenceConfig,
}

pub const PERSISTENCE: PersistenceConfig = PersistenceConfig {
    store: StoreConfig {
        db_path: "ohlc_feed.sqlite",
    },
    group: FeatureGroupDefaults {
        name: "crypto_prices",
        description: "Cryptocurrency Data",
        version: 1,
    },
    logs: LogPersistenceConfig {
        directory: "logs",
        filename: "logs.txt",
    },
};

/// Default log file path, e.g. "logs/logs.txt"
pub fn default_log_file_path() -> std::path::PathBuf {
    std::path::Path::new(PERSISTENCE.logs.directory).join(PERSISTENCE.logs.filename)
}
