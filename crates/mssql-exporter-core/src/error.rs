//! Error type for SQL Server collection.

use crate::row::CellError;

/// Errors surfaced by the scrape pipeline.
///
/// Only `ConnectionFailed` fails a whole scrape; `QueryFailed` and `Cancelled`
/// stay local to the unit that hit them.
#[derive(Debug, Clone)]
pub enum ScrapeError {
    /// Cannot establish or handshake the database connection.
    ConnectionFailed(String),
    /// One query errored; carries the offending query text for diagnostics.
    QueryFailed { query: String, message: String },
    /// The scrape deadline elapsed mid-query.
    Cancelled { query: String },
}

impl ScrapeError {
    /// Wraps a cell-variant mismatch as a query-level failure.
    pub fn bad_row(query: &str, err: CellError) -> Self {
        ScrapeError::QueryFailed {
            query: query.to_string(),
            message: err.to_string(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ScrapeError::Cancelled { .. })
    }
}

impl std::fmt::Display for ScrapeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScrapeError::ConnectionFailed(msg) => write!(f, "connection failed: {}", msg),
            ScrapeError::QueryFailed { query, message } => {
                write!(f, "query failed: {} (query: {})", message, first_line(query))
            }
            ScrapeError::Cancelled { query } => {
                write!(f, "cancelled by deadline (query: {})", first_line(query))
            }
        }
    }
}

impl std::error::Error for ScrapeError {}

/// First non-empty line of a query, for compact log output.
fn first_line(query: &str) -> &str {
    query
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("")
}
