//! Explicit logging setup.
//!
//! Nothing here runs on import: the binary builds a [`LogConfig`], calls
//! [`init_logging`] once, and hands each component a [`LogSink`] naming the
//! target it logs under.

use {
    crate::config::default_log_file_path,
    anyhow::{Context, Result},
    log::LevelFilter,
    std::path::PathBuf,
};

/// Log target prefix shared by every component sink.
pub const CRATE_TARGET: &str = env!("CARGO_CRATE_NAME");

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LevelFilter,
    pub log_to_file: bool,
    pub log_file_path: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::Info,
            log_to_file: true,
            log_file_path: default_log_file_path(),
        }
    }
}

/// Console output always; file output when enabled. Third-party crates are capped at Warn.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} - {} - {} - {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(LevelFilter::Warn.min(config.level))
        .level_for(CRATE_TARGET, config.level)
        .chain(std::io::stdout());

    if config.log_to_file {
        if let Some(dir) = config.log_file_path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create log directory {:?}", dir))?;
            }
        }
        let file = fern::log_file(&config.log_file_path)
            .with_context(|| format!("Failed to open log file {:?}", config.log_file_path))?;
        dispatch = dispatch.chain(file);
    }

    dispatch
        .apply()
        .context("A global logger was already installed")?;
    Ok(())
}

/// Named log target handed to a component through its constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSink {
    target: String,
}

impl LogSink {
    pub fn new(component: &str) -> Self {
        Self {
            target: format!("{}::{}", CRATE_TARGET, component),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}
