//! Configuration module for the OHLC feed.

mod binance;
mod debug;
mod persistence;
mod symbols;

// Re-export commonly used items
pub use binance::{BINANCE, BinanceApiConfig};
pub use debug::DF;
pub use persistence::{PERSISTENCE, default_log_file_path};
pub use symbols::SYMBOLS;
