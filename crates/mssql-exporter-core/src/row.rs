//! Loosely-typed row model and the query execution boundary.
//!
//! Result sets come back as positional rows of [`Cell`] variants. Consumers
//! pattern-match explicitly through the typed accessors; a variant mismatch is
//! a query-level error, never a panic. Any cell may be null.

use chrono::NaiveDateTime;
use futures::future::BoxFuture;
use tokio::time::Instant;

use crate::error::ScrapeError;

/// One dynamically-typed result cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    DateTime(NaiveDateTime),
    Bytes(Vec<u8>),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    fn type_name(&self) -> &'static str {
        match self {
            Cell::Null => "null",
            Cell::Bool(_) => "bool",
            Cell::Int(_) => "int",
            Cell::Float(_) => "float",
            Cell::Text(_) => "text",
            Cell::DateTime(_) => "datetime",
            Cell::Bytes(_) => "bytes",
        }
    }
}

/// Expected/actual variant mismatch at a given column position.
#[derive(Debug, Clone)]
pub struct CellError {
    pub index: usize,
    pub expected: &'static str,
    pub actual: &'static str,
}

impl std::fmt::Display for CellError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "column {}: expected {}, got {}",
            self.index, self.expected, self.actual
        )
    }
}

impl std::error::Error for CellError {}

const NULL_CELL: Cell = Cell::Null;

/// One positional result row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row(Vec<Cell>);

impl Row {
    pub fn new(cells: Vec<Cell>) -> Self {
        Row(cells)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Cell at `idx`; out-of-range positions read as null.
    pub fn cell(&self, idx: usize) -> &Cell {
        self.0.get(idx).unwrap_or(&NULL_CELL)
    }

    pub fn i64(&self, idx: usize) -> Result<i64, CellError> {
        match self.cell(idx) {
            Cell::Int(v) => Ok(*v),
            other => Err(mismatch(idx, "int", other)),
        }
    }

    /// Integer column that tolerates null (absent value reads as `None`).
    pub fn opt_i64(&self, idx: usize) -> Result<Option<i64>, CellError> {
        match self.cell(idx) {
            Cell::Null => Ok(None),
            Cell::Int(v) => Ok(Some(*v)),
            other => Err(mismatch(idx, "int", other)),
        }
    }

    /// Numeric column as f64; integers promote.
    pub fn f64(&self, idx: usize) -> Result<f64, CellError> {
        match self.cell(idx) {
            Cell::Int(v) => Ok(*v as f64),
            Cell::Float(v) => Ok(*v),
            other => Err(mismatch(idx, "float", other)),
        }
    }

    pub fn str(&self, idx: usize) -> Result<&str, CellError> {
        match self.cell(idx) {
            Cell::Text(s) => Ok(s),
            other => Err(mismatch(idx, "text", other)),
        }
    }

    pub fn bool(&self, idx: usize) -> Result<bool, CellError> {
        match self.cell(idx) {
            Cell::Bool(v) => Ok(*v),
            other => Err(mismatch(idx, "bool", other)),
        }
    }

    pub fn datetime(&self, idx: usize) -> Result<&NaiveDateTime, CellError> {
        match self.cell(idx) {
            Cell::DateTime(t) => Ok(t),
            other => Err(mismatch(idx, "datetime", other)),
        }
    }
}

fn mismatch(index: usize, expected: &'static str, actual: &Cell) -> CellError {
    CellError {
        index,
        expected,
        actual: actual.type_name(),
    }
}

/// Executes a query against the monitored instance under a deadline.
///
/// Implementations must observe the deadline: if it elapses before the result
/// set is consumed, the call fails with [`ScrapeError::Cancelled`] instead of
/// blocking. Rows come back in the engine's natural order.
pub trait RowSource: Send + Sync {
    fn execute<'a>(
        &'a self,
        deadline: Instant,
        query: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Row>, ScrapeError>>;
}
