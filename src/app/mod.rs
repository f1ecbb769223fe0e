mod commands;
mod report;

pub use commands::run;
pub(crate) use report::records_table;
