//! Backup history from `msdb.dbo.backupset`.

use std::time::Duration;

use futures::future::BoxFuture;

use crate::error::ScrapeError;
use crate::fmt::{bool_label, int_label, text_label, time_label};
use crate::row::Cell;
use crate::scrape::queries;
use crate::scrape::{ScrapeContext, ScrapeUnit, Throttle};
use crate::sink::{MetricKind, Sample};

const BACKUP_LABELS: &[&str] = &[
    "backup_set_id",
    "backup_set_uuid",
    "expiration_date",
    "name",
    "user_name",
    "first_lsn",
    "last_lsn",
    "checkpoint_lsn",
    "database_backup_lsn",
    "database_creation_date",
    "backup_start_date",
    "backup_finish_date",
    "type",
    "database_name",
    "server_name",
    "machine_name",
    "recovery_model",
    "is_damaged",
    "differential_base_lsn",
    "differential_base_guid",
];

/// LSN columns come back as wide decimals; render them without an exponent.
fn num_label(cell: &Cell) -> String {
    match cell {
        Cell::Int(v) => v.to_string(),
        Cell::Float(v) => format!("{v:.0}"),
        Cell::Text(s) => s.clone(),
        _ => String::new(),
    }
}

pub struct BackupUnit {
    throttle: Throttle,
}

impl BackupUnit {
    pub fn new() -> Self {
        Self {
            throttle: Throttle::new(Duration::from_secs(30)),
        }
    }
}

impl ScrapeUnit for BackupUnit {
    fn name(&self) -> &'static str {
        "mssql_db_backup"
    }

    fn help(&self) -> &'static str {
        "collect stats from msdb.dbo.backupset"
    }

    fn throttle(&self) -> Option<&Throttle> {
        Some(&self.throttle)
    }

    fn collect<'a>(&'a self, ctx: &'a ScrapeContext) -> BoxFuture<'a, Result<(), ScrapeError>> {
        Box::pin(async move {
            let rows = ctx.source.execute(ctx.deadline, queries::BACKUPS).await?;
            let err = |e| ScrapeError::bad_row(queries::BACKUPS, e);
            for row in &rows {
                ctx.sink.emit(Sample {
                    name: "mssql_database_backup".to_string(),
                    help: "MSSQL Database Backup Info",
                    label_names: BACKUP_LABELS,
                    label_values: vec![
                        int_label(row.cell(0)),
                        text_label(row.cell(1)),
                        time_label(row.cell(2)),
                        text_label(row.cell(3)),
                        text_label(row.cell(4)),
                        num_label(row.cell(5)),
                        num_label(row.cell(6)),
                        num_label(row.cell(7)),
                        num_label(row.cell(8)),
                        time_label(row.cell(9)),
                        time_label(row.cell(10)),
                        time_label(row.cell(11)),
                        text_label(row.cell(12)),
                        text_label(row.cell(13)),
                        text_label(row.cell(14)),
                        text_label(row.cell(15)),
                        text_label(row.cell(16)),
                        bool_label(row.cell(17)),
                        num_label(row.cell(18)),
                        text_label(row.cell(19)),
                    ],
                    kind: MetricKind::Gauge,
                    value: row.f64(20).map_err(err)?,
                });
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSource;
    use crate::row::Row;
    use crate::scrape::units::instance_info::InstanceInfo;
    use crate::sink::BufferSink;
    use chrono::NaiveDate;
    use std::sync::Arc;
    use tokio::time::Instant;

    #[tokio::test]
    async fn backup_size_is_the_sample_value() {
        let finish = NaiveDate::from_ymd_opt(2024, 5, 2)
            .unwrap()
            .and_hms_opt(3, 30, 0)
            .unwrap();
        let row = Row::new(vec![
            Cell::Int(17),
            Cell::Text("A1B2".to_string()),
            Cell::Null,
            Cell::Text("nightly".to_string()),
            Cell::Text("sa".to_string()),
            Cell::Float(125000000000000.0),
            Cell::Float(125000000000100.0),
            Cell::Float(125000000000050.0),
            Cell::Float(124000000000000.0),
            Cell::DateTime(finish),
            Cell::DateTime(finish),
            Cell::DateTime(finish),
            Cell::Text("D".to_string()),
            Cell::Text("appdb".to_string()),
            Cell::Text("DBHOST".to_string()),
            Cell::Text("DBHOST".to_string()),
            Cell::Text("FULL".to_string()),
            Cell::Bool(false),
            Cell::Null,
            Cell::Null,
            Cell::Float(1048576.0),
            Cell::Float(524288.0),
        ]);
        let source = MockSource::new().on("backupset", vec![row]);
        let sink = Arc::new(BufferSink::new());
        let ctx = ScrapeContext {
            deadline: Instant::now() + Duration::from_secs(5),
            source: Arc::new(source),
            instance: Arc::new(InstanceInfo::default()),
            sink: sink.clone(),
        };

        BackupUnit::new().collect(&ctx).await.unwrap();

        let samples = sink.take();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].value, 1048576.0);
        let labels = &samples[0].label_values;
        assert_eq!(labels[0], "17");
        assert_eq!(labels[2], ""); // null expiration
        assert_eq!(labels[5], "125000000000000");
        assert_eq!(labels[11], "2024-05-02 03:30:00");
        assert_eq!(labels[17], "no");
    }
}
