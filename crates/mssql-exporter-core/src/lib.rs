//! mssql-exporter-core — SQL Server telemetry collection library.
//!
//! Provides:
//! - `row` — tagged cell/row model and the `RowSource` query boundary
//! - `client` — tiberius-backed `RowSource` (one connection per scrape)
//! - `counters` — raw performance counter classification
//! - `query_stats` — interval deltas over cumulative per-query statistics
//! - `scrape` — scrape units, throttling, and the fan-out scheduler
//! - `sink` — typed metric sample model and sink trait
//! - `fmt` — label/value formatting helpers
//! - `mock` — scripted row source for tests

pub mod client;
pub mod counters;
pub mod error;
pub mod fmt;
pub mod mock;
pub mod query_stats;
pub mod row;
pub mod scrape;
pub mod sink;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use client::{MssqlClient, MssqlConfig};
pub use error::ScrapeError;
pub use row::{Cell, Row, RowSource};
pub use scrape::{Exporter, ScrapeContext, ScrapeSummary, ScrapeUnit};
pub use sink::{BufferSink, MetricKind, MetricSink, Sample};
