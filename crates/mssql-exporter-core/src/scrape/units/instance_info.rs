//! Instance identity snapshot, captured once per scrape before fan-out.

use futures::future::BoxFuture;
use tokio::time::Instant;

use crate::error::ScrapeError;
use crate::fmt;
use crate::row::{Row, RowSource};
use crate::scrape::queries;
use crate::scrape::{ScrapeContext, ScrapeUnit};
use crate::sink::{MetricKind, Sample};

/// `SERVERPROPERTY` identity of the monitored instance.
#[derive(Debug, Default, Clone)]
pub struct InstanceInfo {
    pub version: String,
    pub machine_name: String,
    pub server_name: String,
    pub instance_name: String,
    pub computer_name: String,
    pub edition: String,
    pub product_level: String,
    pub product_version: String,
    pub collation: String,
    pub is_clustered: i64,
    pub is_fulltext_installed: i64,
    pub is_integrated_security_only: i64,
    pub is_hadr_enabled: i64,
    pub hadr_manager_status: i64,
}

// SERVERPROPERTY returns NULL for properties the instance does not carry:
// InstanceName on a default instance, HadrManagerStatus on some editions.
// Null text reads as "", null flags as 0.
fn parse(row: &Row) -> Result<InstanceInfo, ScrapeError> {
    let err = |e| ScrapeError::bad_row(queries::INSTANCE_INFO, e);
    Ok(InstanceInfo {
        version: fmt::text_label(row.cell(0)),
        machine_name: fmt::text_label(row.cell(1)),
        server_name: fmt::text_label(row.cell(2)),
        instance_name: fmt::text_label(row.cell(3)),
        computer_name: fmt::text_label(row.cell(4)),
        edition: fmt::text_label(row.cell(5)),
        product_level: fmt::text_label(row.cell(6)),
        product_version: fmt::text_label(row.cell(7)),
        collation: fmt::text_label(row.cell(8)),
        is_clustered: row.opt_i64(9).map_err(err)?.unwrap_or(0),
        is_fulltext_installed: row.opt_i64(10).map_err(err)?.unwrap_or(0),
        is_integrated_security_only: row.opt_i64(11).map_err(err)?.unwrap_or(0),
        is_hadr_enabled: row.opt_i64(12).map_err(err)?.unwrap_or(0),
        hadr_manager_status: row.opt_i64(13).map_err(err)?.unwrap_or(0),
    })
}

/// Reads the single-row identity snapshot shared by all units of a scrape.
pub async fn fetch(source: &dyn RowSource, deadline: Instant) -> Result<InstanceInfo, ScrapeError> {
    let rows = source.execute(deadline, queries::INSTANCE_INFO).await?;
    match rows.first() {
        Some(row) => parse(row),
        None => Err(ScrapeError::QueryFailed {
            query: queries::INSTANCE_INFO.to_string(),
            message: "no rows returned".to_string(),
        }),
    }
}

const INSTANCE_INFO_LABELS: &[&str] = &[
    "version",
    "machine_name",
    "server_name",
    "instance_name",
    "computer_name",
    "edition",
    "production_level",
    "product_version",
    "collation",
    "is_clustered",
    "is_fulltext_installed",
    "is_integrated_security_only",
    "is_hadr_enabled",
    "hadr_manager_status",
];

pub struct InstanceInfoUnit;

impl ScrapeUnit for InstanceInfoUnit {
    fn name(&self) -> &'static str {
        "mssql_instance_info"
    }

    fn help(&self) -> &'static str {
        "collect SQL Server basic instance info"
    }

    fn collect<'a>(&'a self, ctx: &'a ScrapeContext) -> BoxFuture<'a, Result<(), ScrapeError>> {
        Box::pin(async move {
            let info = &ctx.instance;
            ctx.sink.emit(Sample {
                name: "mssql_instance_info".to_string(),
                help: "MSSQL Instance Info",
                label_names: INSTANCE_INFO_LABELS,
                label_values: vec![
                    info.version.clone(),
                    info.machine_name.clone(),
                    info.server_name.clone(),
                    info.instance_name.clone(),
                    info.computer_name.clone(),
                    info.edition.clone(),
                    info.product_level.clone(),
                    info.product_version.clone(),
                    info.collation.clone(),
                    info.is_clustered.to_string(),
                    info.is_fulltext_installed.to_string(),
                    info.is_integrated_security_only.to_string(),
                    info.is_hadr_enabled.to_string(),
                    info.hadr_manager_status.to_string(),
                ],
                kind: MetricKind::Gauge,
                value: 1.0,
            });
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSource;
    use crate::row::Cell;
    use std::time::Duration;

    fn info_cells() -> Vec<Cell> {
        vec![
            Cell::Text("Microsoft SQL Server 2019".to_string()),
            Cell::Text("DBHOST".to_string()),
            Cell::Text("DBHOST\\PROD".to_string()),
            Cell::Text("PROD".to_string()),
            Cell::Text("DBHOST".to_string()),
            Cell::Text("Enterprise Edition".to_string()),
            Cell::Text("RTM".to_string()),
            Cell::Text("15.0.2000.5".to_string()),
            Cell::Text("SQL_Latin1_General_CP1_CI_AS".to_string()),
            Cell::Int(0),
            Cell::Int(1),
            Cell::Int(0),
            Cell::Int(0),
            Cell::Int(0),
        ]
    }

    #[tokio::test]
    async fn fetch_parses_the_identity_row() {
        let source = MockSource::new().on("@@VERSION", vec![Row::new(info_cells())]);
        let deadline = Instant::now() + Duration::from_secs(5);
        let info = fetch(&source, deadline).await.unwrap();
        assert_eq!(info.instance_name, "PROD");
        assert_eq!(info.is_fulltext_installed, 1);
    }

    #[tokio::test]
    async fn fetch_tolerates_null_properties_of_a_default_instance() {
        let mut cells = info_cells();
        cells[3] = Cell::Null; // InstanceName
        cells[4] = Cell::Null; // ComputerNamePhysicalNetBIOS
        cells[13] = Cell::Null; // HadrManagerStatus
        let source = MockSource::new().on("@@VERSION", vec![Row::new(cells)]);
        let deadline = Instant::now() + Duration::from_secs(5);
        let info = fetch(&source, deadline).await.unwrap();
        assert_eq!(info.instance_name, "");
        assert_eq!(info.computer_name, "");
        assert_eq!(info.hadr_manager_status, 0);
        assert_eq!(info.edition, "Enterprise Edition");
    }

    #[tokio::test]
    async fn fetch_fails_on_empty_result() {
        let source = MockSource::new().on("@@VERSION", Vec::new());
        let deadline = Instant::now() + Duration::from_secs(5);
        assert!(fetch(&source, deadline).await.is_err());
    }
}
