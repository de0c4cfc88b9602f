//! Database mirroring partner and witness state.

use std::time::Duration;

use futures::future::BoxFuture;

use crate::error::ScrapeError;
use crate::fmt::text_label;
use crate::scrape::queries;
use crate::scrape::{ScrapeContext, ScrapeUnit, Throttle};
use crate::sink::{MetricKind, Sample};

const MIRROR_LABELS: &[&str] = &[
    "db_name",
    "role",
    "safety_level",
    "partner_name",
    "witness_name",
];

pub struct MirroringUnit {
    throttle: Throttle,
}

impl MirroringUnit {
    pub fn new() -> Self {
        Self {
            throttle: Throttle::new(Duration::from_secs(5)),
        }
    }
}

impl ScrapeUnit for MirroringUnit {
    fn name(&self) -> &'static str {
        "mssql_mirror_status"
    }

    fn help(&self) -> &'static str {
        "collect stats from sys.database_mirroring"
    }

    fn throttle(&self) -> Option<&Throttle> {
        Some(&self.throttle)
    }

    fn collect<'a>(&'a self, ctx: &'a ScrapeContext) -> BoxFuture<'a, Result<(), ScrapeError>> {
        Box::pin(async move {
            let rows = ctx.source.execute(ctx.deadline, queries::MIRRORING).await?;
            let err = |e| ScrapeError::bad_row(queries::MIRRORING, e);
            for row in &rows {
                let labels = vec![
                    text_label(row.cell(0)),
                    text_label(row.cell(1)),
                    text_label(row.cell(2)),
                    text_label(row.cell(3)),
                    text_label(row.cell(4)),
                ];
                ctx.sink.emit(Sample {
                    name: "mssql_mirror_partner_state".to_string(),
                    help: "MSSQL Database Mirror State",
                    label_names: MIRROR_LABELS,
                    label_values: labels.clone(),
                    kind: MetricKind::Gauge,
                    value: row.i64(5).map_err(err)? as f64,
                });
                // witness state only exists for sessions with a witness
                if !row.cell(4).is_null() {
                    ctx.sink.emit(Sample {
                        name: "mssql_mirror_witness_state".to_string(),
                        help: "MSSQL Database Witness State",
                        label_names: MIRROR_LABELS,
                        label_values: labels,
                        kind: MetricKind::Gauge,
                        value: row.i64(6).map_err(err)? as f64,
                    });
                }
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

    fn mirror_row(witness: Cell) -> Row {
        Row::new(vec![
            Cell::Text("appdb".to_string()),
            Cell::Text("PRINCIPAL".to_string()),
            Cell::Text("FULL".to_string()),
            Cell::Text("TCP://partner:5022".to_string()),
            witness,
            Cell::Int(4),
            Cell::Int(1),
        ])
    }

    #[tokio::test]
    async fn witness_sample_requires_a_witness() {
        let source = MockSource::new().on("database_mirroring", vec![mirror_row(Cell::Null)]);
        let sink = Arc::new(BufferSink::new());
        let ctx = ScrapeContext {
            deadline: Instant::now() + Duration::from_secs(5),
            source: Arc::new(source),
            instance: Arc::new(InstanceInfo::default()),
            sink: sink.clone(),
        };

        MirroringUnit::new().collect(&ctx).await.unwrap();

        let samples = sink.take();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].name, "mssql_mirror_partner_state");
        assert_eq!(samples[0].value, 4.0);
        assert_eq!(samples[0].label_values[4], "");
    }

    #[tokio::test]
    async fn witness_sample_emitted_when_present() {
        let source = MockSource::new().on(
            "database_mirroring",
            vec![mirror_row(Cell::Text("TCP://witness:5022".to_string()))],
        );
        let sink = Arc::new(BufferSink::new());
        let ctx = ScrapeContext {
            deadline: Instant::now() + Duration::from_secs(5),
            source: Arc::new(source),
            instance: Arc::new(InstanceInfo::default()),
            sink: sink.clone(),
        };

        MirroringUnit::new().collect(&ctx).await.unwrap();

        let samples = sink.take();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].name, "mssql_mirror_witness_state");
        assert_eq!(samples[1].value, 1.0);
    }
}
