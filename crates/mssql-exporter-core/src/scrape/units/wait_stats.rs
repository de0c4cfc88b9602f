//! Wait statistics from `sys.dm_os_wait_stats` merged with in-progress waits.

use std::time::Duration;

use futures::future::BoxFuture;

use crate::error::ScrapeError;
use crate::scrape::queries;
use crate::scrape::{ScrapeContext, ScrapeUnit, Throttle};
use crate::sink::{MetricKind, Sample};

const WAIT_STAT_LABELS: &[&str] = &["wait_type"];

pub struct WaitStatUnit {
    throttle: Throttle,
}

impl WaitStatUnit {
    pub fn new() -> Self {
        Self {
            throttle: Throttle::new(Duration::from_secs(5)),
        }
    }
}

impl ScrapeUnit for WaitStatUnit {
    fn name(&self) -> &'static str {
        "mssql_wait_stat"
    }

    fn help(&self) -> &'static str {
        "collect stats from sys.dm_os_wait_stats"
    }

    fn throttle(&self) -> Option<&Throttle> {
        Some(&self.throttle)
    }

    fn collect<'a>(&'a self, ctx: &'a ScrapeContext) -> BoxFuture<'a, Result<(), ScrapeError>> {
        Box::pin(async move {
            let rows = ctx.source.execute(ctx.deadline, queries::WAIT_STATS).await?;
            let err = |e| ScrapeError::bad_row(queries::WAIT_STATS, e);
            for row in &rows {
                let wait_type = row.str(0).map_err(err)?.to_string();
                let waiting_tasks = row.i64(1).map_err(err)?;
                let signal_wait_time_ms = row.i64(2).map_err(err)?;
                let wait_time_ms = row.i64(3).map_err(err)?;

                let emit = |name: &str, value: i64| Sample {
                    name: name.to_string(),
                    help: "MSSQL Wait Statistics",
                    label_names: WAIT_STAT_LABELS,
                    label_values: vec![wait_type.clone()],
                    kind: MetricKind::Counter,
                    value: value as f64,
                };
                ctx.sink.emit(emit("mssql_waitstat_waiting_tasks", waiting_tasks));
                ctx.sink.emit(emit("mssql_waitstat_wait_time_ms", wait_time_ms));
                ctx.sink
                    .emit(emit("mssql_waitstat_signal_wait_time_ms", signal_wait_time_ms));
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSource;
    use crate::row::{Cell, Row};
    use crate::scrape::units::instance_info::InstanceInfo;
    use crate::sink::BufferSink;
    use std::sync::Arc;
    use tokio::time::Instant;

    #[tokio::test]
    async fn maps_signal_and_total_wait_columns_by_name() {
        // column order is wait_type, tasks, signal, total
        let source = MockSource::new().on(
            "merged_wait_stats",
            vec![Row::new(vec![
                Cell::Text("PAGEIOLATCH_SH".to_string()),
                Cell::Int(7),
                Cell::Int(11),
                Cell::Int(250),
            ])],
        );
        let sink = Arc::new(BufferSink::new());
        let ctx = ScrapeContext {
            deadline: Instant::now() + Duration::from_secs(5),
            source: Arc::new(source),
            instance: Arc::new(InstanceInfo::default()),
            sink: sink.clone(),
        };

        WaitStatUnit::new().collect(&ctx).await.unwrap();

        let samples = sink.take();
        assert_eq!(samples.len(), 3);
        for s in &samples {
            assert_eq!(s.kind, MetricKind::Counter);
            assert_eq!(s.label_values, vec!["PAGEIOLATCH_SH".to_string()]);
        }
        assert_eq!(samples[0].name, "mssql_waitstat_waiting_tasks");
        assert_eq!(samples[0].value, 7.0);
        assert_eq!(samples[1].name, "mssql_waitstat_wait_time_ms");
        assert_eq!(samples[1].value, 250.0);
        assert_eq!(samples[2].name, "mssql_waitstat_signal_wait_time_ms");
        assert_eq!(samples[2].value, 11.0);
    }
}
