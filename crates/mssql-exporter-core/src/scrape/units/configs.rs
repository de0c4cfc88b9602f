//! Selected server configuration values from `sys.configurations`.

use std::time::Duration;

use futures::future::BoxFuture;

use crate::error::ScrapeError;
use crate::scrape::queries;
use crate::scrape::{ScrapeContext, ScrapeUnit, Throttle};
use crate::sink::{MetricKind, Sample};

const CONFIG_LABELS: &[&str] = &["name"];

pub struct ConfigUnit {
    throttle: Throttle,
}

impl ConfigUnit {
    pub fn new() -> Self {
        Self {
            throttle: Throttle::new(Duration::from_secs(30)),
        }
    }
}

impl ScrapeUnit for ConfigUnit {
    fn name(&self) -> &'static str {
        "mssql_configuration"
    }

    fn help(&self) -> &'static str {
        "collect stats from sys.configurations"
    }

    fn throttle(&self) -> Option<&Throttle> {
        Some(&self.throttle)
    }

    fn collect<'a>(&'a self, ctx: &'a ScrapeContext) -> BoxFuture<'a, Result<(), ScrapeError>> {
        Box::pin(async move {
            let rows = ctx
                .source
                .execute(ctx.deadline, queries::CONFIGURATIONS)
                .await?;
            let err = |e| ScrapeError::bad_row(queries::CONFIGURATIONS, e);
            for row in &rows {
                ctx.sink.emit(Sample {
                    name: "mssql_configuration_value".to_string(),
                    help: "MSSQL Configuration Info",
                    label_names: CONFIG_LABELS,
                    label_values: vec![row.str(0).map_err(err)?.to_string()],
                    kind: MetricKind::Gauge,
                    value: row.f64(1).map_err(err)?,
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
    use crate::row::{Cell, Row};
    use crate::scrape::units::instance_info::InstanceInfo;
    use crate::sink::BufferSink;
    use std::sync::Arc;
    use tokio::time::Instant;

    #[tokio::test]
    async fn emits_one_gauge_per_configuration() {
        let source = MockSource::new().on(
            "sys.configurations",
            vec![
                Row::new(vec![
                    Cell::Text("max degree of parallelism".to_string()),
                    Cell::Int(8),
                ]),
                Row::new(vec![
                    Cell::Text("max server memory (MB)".to_string()),
                    Cell::Int(65536),
                ]),
            ],
        );
        let sink = Arc::new(BufferSink::new());
        let ctx = ScrapeContext {
            deadline: Instant::now() + Duration::from_secs(5),
            source: Arc::new(source),
            instance: Arc::new(InstanceInfo::default()),
            sink: sink.clone(),
        };

        ConfigUnit::new().collect(&ctx).await.unwrap();

        let samples = sink.take();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].label_values[0], "max degree of parallelism");
        assert_eq!(samples[0].value, 8.0);
        assert_eq!(samples[1].value, 65536.0);
    }
}
