//! SQL Server connection and query execution.
//!
//! One read-only connection per scrape session. Concurrent scrape units queue
//! on the connection mutex, so in-flight queries never interleave on the
//! unmultiplexed TDS stream. Every wire operation runs under the scrape
//! deadline.

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Deserialize;
use tiberius::{AuthMethod, ColumnData, Config, FromSql, SqlBrowser};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::{Instant, timeout_at};
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use crate::error::ScrapeError;
use crate::row::{Cell, Row, RowSource};

/// Connection settings for the monitored instance.
#[derive(Debug, Clone, Deserialize)]
pub struct MssqlConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Named instance; resolved via the SQL Browser service when set.
    #[serde(default)]
    pub instance: Option<String>,
    #[serde(default = "default_database")]
    pub database: String,
}

fn default_port() -> u16 {
    1433
}

fn default_database() -> String {
    "master".to_string()
}

type TdsClient = tiberius::Client<Compat<TcpStream>>;

/// A live connection to the monitored instance.
pub struct MssqlClient {
    conn: Mutex<TdsClient>,
}

impl MssqlClient {
    /// Connects and handshakes under the scrape deadline.
    pub async fn connect(cfg: &MssqlConfig, deadline: Instant) -> Result<Self, ScrapeError> {
        match timeout_at(deadline, Self::open(cfg)).await {
            Ok(res) => res,
            Err(_) => Err(ScrapeError::ConnectionFailed(
                "connection handshake timed out".to_string(),
            )),
        }
    }

    async fn open(cfg: &MssqlConfig) -> Result<Self, ScrapeError> {
        let mut config = Config::new();
        config.host(&cfg.host);
        config.port(cfg.port);
        config.database(&cfg.database);
        config.authentication(AuthMethod::sql_server(&cfg.username, &cfg.password));
        config.trust_cert();

        let tcp = if let Some(ref instance) = cfg.instance {
            config.instance_name(instance);
            TcpStream::connect_named(&config)
                .await
                .map_err(|e| ScrapeError::ConnectionFailed(e.to_string()))?
        } else {
            TcpStream::connect((cfg.host.as_str(), cfg.port))
                .await
                .map_err(|e| ScrapeError::ConnectionFailed(e.to_string()))?
        };
        tcp.set_nodelay(true)
            .map_err(|e| ScrapeError::ConnectionFailed(e.to_string()))?;

        let conn = tiberius::Client::connect(config, tcp.compat_write())
            .await
            .map_err(|e| ScrapeError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    async fn fetch_rows(&self, query: &str) -> Result<Vec<Row>, ScrapeError> {
        let mut conn = self.conn.lock().await;
        let stream = conn
            .simple_query(query)
            .await
            .map_err(|e| query_error(query, &e))?;
        let result_sets = stream
            .into_results()
            .await
            .map_err(|e| query_error(query, &e))?;

        let mut rows = Vec::new();
        for set in result_sets {
            for row in set {
                rows.push(convert_row(row));
            }
        }
        Ok(rows)
    }
}

impl RowSource for MssqlClient {
    fn execute<'a>(
        &'a self,
        deadline: Instant,
        query: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Row>, ScrapeError>> {
        async move {
            match timeout_at(deadline, self.fetch_rows(query)).await {
                Ok(res) => res,
                Err(_) => Err(ScrapeError::Cancelled {
                    query: query.to_string(),
                }),
            }
        }
        .boxed()
    }
}

fn query_error(query: &str, err: &tiberius::error::Error) -> ScrapeError {
    ScrapeError::QueryFailed {
        query: query.to_string(),
        message: err.to_string(),
    }
}

fn convert_row(row: tiberius::Row) -> Row {
    Row::new(row.into_iter().map(convert_cell).collect())
}

/// Maps a TDS column value onto the tagged cell model. Integer widths widen
/// to i64, decimals to f64; unrepresentable values read as null.
fn convert_cell(data: ColumnData<'static>) -> Cell {
    match data {
        ColumnData::Bit(v) => v.map(Cell::Bool).unwrap_or(Cell::Null),
        ColumnData::U8(v) => v.map(|x| Cell::Int(i64::from(x))).unwrap_or(Cell::Null),
        ColumnData::I16(v) => v.map(|x| Cell::Int(i64::from(x))).unwrap_or(Cell::Null),
        ColumnData::I32(v) => v.map(|x| Cell::Int(i64::from(x))).unwrap_or(Cell::Null),
        ColumnData::I64(v) => v.map(Cell::Int).unwrap_or(Cell::Null),
        ColumnData::F32(v) => v.map(|x| Cell::Float(f64::from(x))).unwrap_or(Cell::Null),
        ColumnData::F64(v) => v.map(Cell::Float).unwrap_or(Cell::Null),
        ColumnData::Numeric(v) => v.map(|n| Cell::Float(f64::from(n))).unwrap_or(Cell::Null),
        ColumnData::String(v) => v.map(|s| Cell::Text(s.into_owned())).unwrap_or(Cell::Null),
        ColumnData::Guid(v) => v.map(|g| Cell::Text(g.to_string())).unwrap_or(Cell::Null),
        ColumnData::Binary(v) => v.map(|b| Cell::Bytes(b.into_owned())).unwrap_or(Cell::Null),
        ColumnData::Xml(v) => v
            .map(|x| Cell::Text(x.into_owned().into_string()))
            .unwrap_or(Cell::Null),
        data @ (ColumnData::DateTime(_)
        | ColumnData::SmallDateTime(_)
        | ColumnData::DateTime2(_)) => datetime_cell(&data),
        data @ ColumnData::Date(_) => date_cell(&data),
        data @ ColumnData::DateTimeOffset(_) => datetimeoffset_cell(&data),
        ColumnData::Time(_) => Cell::Null,
    }
}

fn datetime_cell(data: &ColumnData<'static>) -> Cell {
    match chrono::NaiveDateTime::from_sql(data) {
        Ok(Some(dt)) => Cell::DateTime(dt),
        _ => Cell::Null,
    }
}

fn date_cell(data: &ColumnData<'static>) -> Cell {
    match chrono::NaiveDate::from_sql(data) {
        Ok(Some(d)) => match d.and_hms_opt(0, 0, 0) {
            Some(dt) => Cell::DateTime(dt),
            None => Cell::Null,
        },
        _ => Cell::Null,
    }
}

fn datetimeoffset_cell(data: &ColumnData<'static>) -> Cell {
    match chrono::DateTime::<chrono::Utc>::from_sql(data) {
        Ok(Some(dt)) => Cell::DateTime(dt.naive_utc()),
        _ => Cell::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_widths_widen_to_i64() {
        assert_eq!(convert_cell(ColumnData::U8(Some(3))), Cell::Int(3));
        assert_eq!(convert_cell(ColumnData::I16(Some(-7))), Cell::Int(-7));
        assert_eq!(convert_cell(ColumnData::I32(Some(100))), Cell::Int(100));
        assert_eq!(convert_cell(ColumnData::I64(Some(1 << 40))), Cell::Int(1 << 40));
    }

    #[test]
    fn absent_values_are_null() {
        assert_eq!(convert_cell(ColumnData::I64(None)), Cell::Null);
        assert_eq!(convert_cell(ColumnData::String(None)), Cell::Null);
        assert_eq!(convert_cell(ColumnData::Binary(None)), Cell::Null);
    }

    #[test]
    fn strings_and_binary_take_ownership() {
        assert_eq!(
            convert_cell(ColumnData::String(Some("abc".into()))),
            Cell::Text("abc".to_string())
        );
        assert_eq!(
            convert_cell(ColumnData::Binary(Some(vec![1u8, 2].into()))),
            Cell::Bytes(vec![1, 2])
        );
    }
}
