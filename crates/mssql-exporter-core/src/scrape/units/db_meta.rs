//! Database catalog state from `sys.databases`.

use futures::future::BoxFuture;

use crate::error::ScrapeError;
use crate::fmt::{bool_label, int_label, text_label, time_label};
use crate::scrape::queries;
use crate::scrape::{ScrapeContext, ScrapeUnit};
use crate::sink::{MetricKind, Sample};

const DB_META_LABELS: &[&str] = &[
    "name",
    "database_id",
    "create_date",
    "compatibility_level",
    "collation_name",
    "recovery_model",
    "snapshot_isolation",
    "read_committed_snapshot",
];

pub struct DbMetaUnit;

impl ScrapeUnit for DbMetaUnit {
    fn name(&self) -> &'static str {
        "mssql_db_meta"
    }

    fn help(&self) -> &'static str {
        "collect stats from sys.databases"
    }

    fn collect<'a>(&'a self, ctx: &'a ScrapeContext) -> BoxFuture<'a, Result<(), ScrapeError>> {
        Box::pin(async move {
            let rows = ctx.source.execute(ctx.deadline, queries::DB_META).await?;
            let err = |e| ScrapeError::bad_row(queries::DB_META, e);
            for row in &rows {
                // sample value is the database state (0 = ONLINE)
                ctx.sink.emit(Sample {
                    name: "mssql_database_meta".to_string(),
                    help: "MSSQL Database Meta Info",
                    label_names: DB_META_LABELS,
                    label_values: vec![
                        text_label(row.cell(0)),
                        int_label(row.cell(1)),
                        time_label(row.cell(2)),
                        int_label(row.cell(3)),
                        text_label(row.cell(4)),
                        text_label(row.cell(5)),
                        int_label(row.cell(6)),
                        bool_label(row.cell(7)),
                    ],
                    kind: MetricKind::Gauge,
                    value: row.i64(8).map_err(err)? as f64,
                });
            }
            Ok(())
        })
    }
}
