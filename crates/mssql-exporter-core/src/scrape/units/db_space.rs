//! Per-database file sizes from `sys.master_files`.

use std::time::Duration;

use futures::future::BoxFuture;

use crate::error::ScrapeError;
use crate::scrape::queries;
use crate::scrape::{ScrapeContext, ScrapeUnit, Throttle};
use crate::sink::{MetricKind, Sample};

const DB_SPACE_LABELS: &[&str] = &["db_name", "mode"];

pub struct DbSpaceUnit {
    throttle: Throttle,
}

impl DbSpaceUnit {
    pub fn new() -> Self {
        Self {
            throttle: Throttle::new(Duration::from_secs(30)),
        }
    }
}

impl ScrapeUnit for DbSpaceUnit {
    fn name(&self) -> &'static str {
        "mssql_db_space"
    }

    fn help(&self) -> &'static str {
        "collect stats from sys.master_files"
    }

    fn throttle(&self) -> Option<&Throttle> {
        Some(&self.throttle)
    }

    fn collect<'a>(&'a self, ctx: &'a ScrapeContext) -> BoxFuture<'a, Result<(), ScrapeError>> {
        Box::pin(async move {
            let rows = ctx.source.execute(ctx.deadline, queries::DB_SPACE).await?;
            let err = |e| ScrapeError::bad_row(queries::DB_SPACE, e);
            for row in &rows {
                let db_name = row.str(0).map_err(err)?.to_string();
                for (idx, mode) in [(1, "data"), (2, "log"), (3, "other")] {
                    ctx.sink.emit(Sample {
                        name: "mssql_database_space".to_string(),
                        help: "MSSQL Database Space Info",
                        label_names: DB_SPACE_LABELS,
                        label_values: vec![db_name.clone(), mode.to_string()],
                        kind: MetricKind::Gauge,
                        value: row.i64(idx).map_err(err)? as f64,
                    });
                }
            }
            Ok(())
        })
    }
}
