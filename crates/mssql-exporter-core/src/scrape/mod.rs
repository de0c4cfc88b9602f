//! Scrape orchestration: unit trait, throttling, and the fan-out scheduler.
//!
//! One inbound scrape fans out to one task per enabled unit under a single
//! deadline. Units share one connection (they queue on its mutex) and one
//! instance-metadata snapshot captured before fan-out. A failing unit logs and
//! contributes nothing; only a connection failure aborts the scrape, and it
//! does so before any fan-out.

pub(crate) mod queries;
pub mod units;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::client::{MssqlClient, MssqlConfig};
use crate::error::ScrapeError;
use crate::row::RowSource;
use crate::sink::{MetricKind, MetricSink, Sample};
use units::instance_info::InstanceInfo;

/// Everything a unit needs for one collection pass.
#[derive(Clone)]
pub struct ScrapeContext {
    pub deadline: Instant,
    pub source: Arc<dyn RowSource>,
    pub instance: Arc<InstanceInfo>,
    pub sink: Arc<dyn MetricSink>,
}

/// One independent telemetry category's collection logic.
pub trait ScrapeUnit: Send + Sync {
    /// Unique unit name; doubles as the enable/disable key.
    fn name(&self) -> &'static str;

    /// Describes what the unit collects.
    fn help(&self) -> &'static str;

    /// Minimum re-run interval, if the unit is throttled.
    fn throttle(&self) -> Option<&Throttle> {
        None
    }

    fn collect<'a>(&'a self, ctx: &'a ScrapeContext) -> BoxFuture<'a, Result<(), ScrapeError>>;
}

/// Minimum re-run interval guard, owned by the unit it protects.
///
/// `due` never mutates: a sub-floor call leaves the marker at the last real
/// execution, so repeated sub-floor calls cannot starve the unit forever.
/// `record` runs only after a successful pass; failures do not advance it.
pub struct Throttle {
    floor: Duration,
    last_run: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(floor: Duration) -> Self {
        Self {
            floor,
            last_run: Mutex::new(None),
        }
    }

    pub fn due(&self) -> bool {
        match *self.last_run.lock().unwrap() {
            Some(last) => last.elapsed() >= self.floor,
            None => true,
        }
    }

    pub fn record(&self) {
        *self.last_run.lock().unwrap() = Some(Instant::now());
    }

    pub fn last_run(&self) -> Option<Instant> {
        *self.last_run.lock().unwrap()
    }
}

/// Runs the given units concurrently against one context and waits for all of
/// them. Returns the per-unit failures; siblings are never affected.
pub async fn run_units(
    units: &[Arc<dyn ScrapeUnit>],
    ctx: &ScrapeContext,
) -> Vec<(&'static str, ScrapeError)> {
    let mut tasks = JoinSet::new();

    for unit in units {
        if let Some(throttle) = unit.throttle()
            && !throttle.due()
        {
            debug!(unit = unit.name(), "inside throttle floor, skipping");
            continue;
        }

        let unit = Arc::clone(unit);
        let ctx = ctx.clone();
        tasks.spawn(async move {
            let result = unit.collect(&ctx).await;
            if result.is_ok()
                && let Some(throttle) = unit.throttle()
            {
                throttle.record();
            }
            (unit.name(), result)
        });
    }

    let mut failures = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(()))) => {}
            Ok((name, Err(e))) => {
                if e.is_cancelled() {
                    warn!(unit = name, "collection cancelled by deadline");
                } else {
                    warn!(unit = name, error = %e, "collection failed");
                }
                failures.push((name, e));
            }
            Err(e) => {
                error!(error = %e, "scrape task panicked");
            }
        }
    }
    failures
}

/// Outcome of one complete scrape.
#[derive(Debug)]
pub struct ScrapeSummary {
    /// Whether the instance was reachable at all.
    pub up: bool,
    pub failures: Vec<(&'static str, ScrapeError)>,
}

const CONNECT_STATUS_LABELS: &[&str] = &["message"];

fn connect_status_sample(value: f64, message: &str) -> Sample {
    Sample {
        name: "mssql_exporter_db_connect_status".to_string(),
        help: "Database connect status",
        label_names: CONNECT_STATUS_LABELS,
        label_values: vec![message.to_string()],
        kind: MetricKind::Gauge,
        value,
    }
}

/// Long-lived scrape orchestrator.
///
/// Owns the unit set (units own their throttle state and the query-stats delta
/// tracker) and opens one fresh connection per scrape.
pub struct Exporter {
    config: MssqlConfig,
    units: Vec<Arc<dyn ScrapeUnit>>,
}

impl Exporter {
    pub fn new(config: MssqlConfig) -> Self {
        Self {
            config,
            units: units::default_units(),
        }
    }

    pub fn units(&self) -> &[Arc<dyn ScrapeUnit>] {
        &self.units
    }

    /// Runs one complete scrape: connect, capture instance metadata, fan out
    /// to every enabled unit, join all, and report.
    ///
    /// Per-unit failures are absorbed here; only an unreachable instance turns
    /// into `up = false`, and it is reported through the connect-status sample
    /// before any fan-out.
    pub async fn scrape(
        &self,
        deadline: Instant,
        enabled: &HashSet<String>,
        sink: Arc<dyn MetricSink>,
    ) -> ScrapeSummary {
        let client = match MssqlClient::connect(&self.config, deadline).await {
            Ok(client) => Arc::new(client),
            Err(e) => {
                error!(error = %e, host = %self.config.host, "cannot establish database connection");
                sink.emit(connect_status_sample(1.0, &e.to_string()));
                return ScrapeSummary {
                    up: false,
                    failures: Vec::new(),
                };
            }
        };
        sink.emit(connect_status_sample(0.0, "OK"));

        let source: Arc<dyn RowSource> = client;
        let instance = match units::instance_info::fetch(source.as_ref(), deadline).await {
            Ok(info) => Arc::new(info),
            Err(e) => {
                error!(error = %e, "failed to read instance metadata");
                return ScrapeSummary {
                    up: true,
                    failures: vec![("instance_info", e)],
                };
            }
        };

        let selected: Vec<Arc<dyn ScrapeUnit>> = self
            .units
            .iter()
            .filter(|u| enabled.contains(u.name()))
            .cloned()
            .collect();
        info!(units = selected.len(), "scrape fan-out");

        let ctx = ScrapeContext {
            deadline,
            source,
            instance,
            sink,
        };
        let failures = run_units(&selected, &ctx).await;

        ScrapeSummary { up: true, failures }
    }
}
