// Domain types and value objects
mod fetch_window;
mod ohlc_record;

pub use fetch_window::FetchWindow;
pub use ohlc_record::OhlcRecord;
