//! Smart meter telegram aggregation
//!
//! This library frames the line stream of a DSMR P1 port into telegrams,
//! extracts power, tariff and gas readings, and turns them into averaged
//! usage and cost records for a sink.

pub mod aggregation;
pub mod config;
pub mod cost;
pub mod obis_utils;
pub mod reader;
pub mod sink;
pub mod telegram;

// Re-export common types for easier access
pub use aggregation::{AggregateRecord, AggregationEngine, InstantRecord};
pub use config::Config;
pub use cost::{PriceTable, Tariff};
pub use reader::{ReaderError, ReaderOptions, SourceReader};
pub use sink::{ConfiguredSink, FileSink, Sink};
pub use telegram::{Framer, Telegram};

pub fn get_unix_ts() -> i64 {
    return chrono::Utc::now().timestamp();
}
