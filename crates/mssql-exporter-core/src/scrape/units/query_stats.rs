//! Per-query execution statistics as interval deltas.
//!
//! Cumulative counters from `sys.dm_exec_query_stats` are reconciled against
//! the previous capture; what gets exported is the activity between the two
//! captures, stamped with the window bounds.

use std::time::Duration;

use chrono::Utc;
use futures::future::BoxFuture;

use crate::error::ScrapeError;
use crate::fmt::{format_time, hex_label, time_label};
use crate::query_stats::{DeltaTracker, QueryCounters, QueryIdentity, QueryStat};
use crate::row::Row;
use crate::scrape::queries;
use crate::scrape::{ScrapeContext, ScrapeUnit, Throttle};
use crate::sink::{MetricKind, Sample};

const SQL_STAT_LABELS: &[&str] = &[
    "query_hash",
    "creation_time",
    "begin_time",
    "end_time",
    "query_text",
    "db_name",
    "logical_reads",
    "physical_reads",
    "elapsed_time",
    "worker_time",
    "clr_time",
    "rows",
    "executions",
];

fn parse_stat(row: &Row) -> Result<QueryStat, ScrapeError> {
    let err = |e| ScrapeError::bad_row(queries::TOP_QUERY_STATS, e);
    Ok(QueryStat {
        identity: QueryIdentity {
            query_hash: hex_label(row.cell(0)),
            creation_time: time_label(row.cell(1)),
            query_text: row.str(9).map_err(err)?.to_string(),
        },
        database_name: row.str(10).map_err(err)?.to_string(),
        counters: QueryCounters {
            execution_count: row.i64(2).map_err(err)?,
            logical_reads: row.i64(3).map_err(err)?,
            physical_reads: row.i64(4).map_err(err)?,
            elapsed_time: row.i64(5).map_err(err)?,
            worker_time: row.i64(6).map_err(err)?,
            clr_time: row.i64(7).map_err(err)?,
            row_count: row.i64(8).map_err(err)?,
        },
    })
}

pub struct QueryStatUnit {
    throttle: Throttle,
    tracker: DeltaTracker,
}

impl QueryStatUnit {
    pub fn new() -> Self {
        Self {
            throttle: Throttle::new(Duration::from_secs(30)),
            tracker: DeltaTracker::new(),
        }
    }
}

impl ScrapeUnit for QueryStatUnit {
    fn name(&self) -> &'static str {
        "mssql_sql_stat"
    }

    fn help(&self) -> &'static str {
        "collect sql execution statistics from sys.dm_exec_query_stats"
    }

    fn throttle(&self) -> Option<&Throttle> {
        Some(&self.throttle)
    }

    fn collect<'a>(&'a self, ctx: &'a ScrapeContext) -> BoxFuture<'a, Result<(), ScrapeError>> {
        Box::pin(async move {
            let rows = ctx
                .source
                .execute(ctx.deadline, queries::TOP_QUERY_STATS)
                .await?;
            let stats = rows.iter().map(parse_stat).collect::<Result<Vec<_>, _>>()?;

            let outcome = self.tracker.reconcile(Utc::now().naive_utc(), stats);
            // first capture only seeds the baseline
            let Some((begin, end)) = outcome.window else {
                return Ok(());
            };
            let begin = format_time(&begin);
            let end = format_time(&end);

            for d in &outcome.deltas {
                ctx.sink.emit(Sample {
                    name: "mssql_sql_stat".to_string(),
                    help: "MSSQL SQL Statistics",
                    label_names: SQL_STAT_LABELS,
                    label_values: vec![
                        d.identity.query_hash.clone(),
                        d.identity.creation_time.clone(),
                        begin.clone(),
                        end.clone(),
                        d.identity.query_text.clone(),
                        d.database_name.clone(),
                        d.delta.logical_reads.to_string(),
                        d.delta.physical_reads.to_string(),
                        d.delta.elapsed_time.to_string(),
                        d.delta.worker_time.to_string(),
                        d.delta.clr_time.to_string(),
                        d.delta.row_count.to_string(),
                        d.delta.execution_count.to_string(),
                    ],
                    kind: MetricKind::Gauge,
                    value: 1.0,
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
    use crate::row::Cell;
    use crate::scrape::units::instance_info::InstanceInfo;
    use crate::sink::BufferSink;
    use chrono::NaiveDate;
    use std::sync::Arc;
    use tokio::time::Instant;

    fn stat_row(executions: i64, reads: i64) -> Row {
        Row::new(vec![
            Cell::Bytes(vec![0xab, 0xcd]),
            Cell::DateTime(
                NaiveDate::from_ymd_opt(2024, 5, 1)
                    .unwrap()
                    .and_hms_opt(8, 0, 0)
                    .unwrap(),
            ),
            Cell::Int(executions),
            Cell::Int(reads),
            Cell::Int(1),
            Cell::Int(100),
            Cell::Int(90),
            Cell::Int(0),
            Cell::Int(10),
            Cell::Text("select 1".to_string()),
            Cell::Text("master".to_string()),
        ])
    }

    fn ctx(source: MockSource, sink: Arc<BufferSink>) -> ScrapeContext {
        ScrapeContext {
            deadline: Instant::now() + Duration::from_secs(5),
            source: Arc::new(source),
            instance: Arc::new(InstanceInfo::default()),
            sink,
        }
    }

    #[tokio::test]
    async fn first_pass_seeds_baseline_second_pass_emits_delta() {
        let source = MockSource::new()
            .on("dm_exec_query_stats", vec![stat_row(5, 1000)])
            .on("dm_exec_query_stats", vec![stat_row(8, 1600)]);
        let sink = Arc::new(BufferSink::new());
        let ctx = ctx(source, sink.clone());
        let unit = QueryStatUnit::new();

        unit.collect(&ctx).await.unwrap();
        assert!(sink.is_empty());

        unit.collect(&ctx).await.unwrap();
        let samples = sink.take();
        assert_eq!(samples.len(), 1);
        let labels = &samples[0].label_values;
        assert_eq!(labels[0], "abcd");
        assert_eq!(labels[1], "2024-05-01 08:00:00");
        assert_eq!(labels[6], "600"); // logical_reads delta
        assert_eq!(labels[12], "3"); // executions delta
    }

    #[tokio::test]
    async fn idle_query_is_not_emitted() {
        let source = MockSource::new()
            .on("dm_exec_query_stats", vec![stat_row(5, 1000)])
            .on("dm_exec_query_stats", vec![stat_row(5, 1000)]);
        let sink = Arc::new(BufferSink::new());
        let ctx = ctx(source, sink.clone());
        let unit = QueryStatUnit::new();

        unit.collect(&ctx).await.unwrap();
        unit.collect(&ctx).await.unwrap();
        assert!(sink.is_empty());
    }
}
