//! Performance counter collection from `sys.dm_os_performance_counters`.

use futures::future::BoxFuture;

use crate::counters::{classify, PerfCounter};
use crate::error::ScrapeError;
use crate::row::Row;
use crate::scrape::queries;
use crate::scrape::{ScrapeContext, ScrapeUnit};

fn parse_counter(row: &Row) -> Result<PerfCounter, ScrapeError> {
    let err = |e| ScrapeError::bad_row(queries::PERF_COUNTERS, e);
    // counter columns are CHAR-padded
    Ok(PerfCounter {
        object_name: row.str(0).map_err(err)?.trim().to_string(),
        counter_name: row.str(1).map_err(err)?.trim().to_string(),
        instance_name: row.str(2).map_err(err)?.trim().to_string(),
        value: row.i64(3).map_err(err)?,
        type_tag: row.i64(4).map_err(err)?,
    })
}

pub struct PerfCounterUnit;

impl ScrapeUnit for PerfCounterUnit {
    fn name(&self) -> &'static str {
        "mssql_perfcounter"
    }

    fn help(&self) -> &'static str {
        "collect stats from sys.dm_os_performance_counters"
    }

    fn collect<'a>(&'a self, ctx: &'a ScrapeContext) -> BoxFuture<'a, Result<(), ScrapeError>> {
        Box::pin(async move {
            let rows = ctx.source.execute(ctx.deadline, queries::PERF_COUNTERS).await?;
            let counters = rows
                .iter()
                .map(parse_counter)
                .collect::<Result<Vec<_>, _>>()?;
            for sample in classify(&counters) {
                ctx.sink.emit(sample);
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
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    fn counter_row(object: &str, counter: &str, value: i64, tag: i64) -> Row {
        Row::new(vec![
            Cell::Text(format!("{object}  ")),
            Cell::Text(format!("{counter} ")),
            Cell::Text(" ".to_string()),
            Cell::Int(value),
            Cell::Int(tag),
        ])
    }

    #[tokio::test]
    async fn collects_trimmed_and_classified_counters() {
        let source = MockSource::new().on(
            "dm_os_performance_counters",
            vec![
                counter_row("SQLServer:General Statistics", "User Connections", 42, 65_792),
                counter_row("SQLServer:Wait Statistics", "Unselected Counter", 9, 65_792),
            ],
        );
        let sink = Arc::new(BufferSink::new());
        let ctx = ScrapeContext {
            deadline: Instant::now() + Duration::from_secs(5),
            source: Arc::new(source),
            instance: Arc::new(InstanceInfo::default()),
            sink: sink.clone(),
        };

        PerfCounterUnit.collect(&ctx).await.unwrap();

        let samples = sink.take();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].name, "mssql_perfcounter_user_connections");
        assert_eq!(samples[0].label_values[0], "General Statistics");
        assert_eq!(samples[0].label_values[1], "User Connections");
        assert_eq!(samples[0].value, 42.0);
    }
}
