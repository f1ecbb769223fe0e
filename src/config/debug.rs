//! Debugging feature flags.

#[allow(dead_code)]
pub struct LogFlags {
    /// Log every window request (start, end, raw count) during a day fetch.
    pub log_fetch_windows: bool,

    /// Log tuples dropped at window seams.
    pub log_seam_dedupe: bool,

    /// Log row counts per read mode from the feature store.
    pub log_store_reads: bool,
}

pub const DF: LogFlags = LogFlags {
    log_fetch_windows: true,
    log_seam_dedupe: true,
    log_store_reads: false,
};
