//! Data models and structures for the packet-pair prober

pub mod config;
pub mod sample;
pub mod stat;

// Re-export main model types
pub use config::{Config, OutlierChoice};
pub use sample::{Sample, SampleGroup};
pub use stat::{AggregateStat, Stat, format_bandwidth, format_bytes};
