//! Exporter self-metrics, carried across scrapes in their own registry.

use prometheus::{Gauge, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use tracing::error;

pub struct SelfMetrics {
    pub registry: Registry,
    pub scrapes_total: IntCounter,
    pub scrape_errors: IntCounterVec,
    pub last_scrape_error: Gauge,
    pub up: IntGauge,
}

impl SelfMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let scrapes_total = IntCounter::new(
            "mssql_exporter_scrapes_total",
            "Total number of times the instance was scraped for metrics.",
        )
        .unwrap();
        let scrape_errors = IntCounterVec::new(
            Opts::new(
                "mssql_exporter_scrape_errors_total",
                "Total number of errors encountered while scraping, per collector.",
            ),
            &["collector"],
        )
        .unwrap();
        let last_scrape_error = Gauge::new(
            "mssql_exporter_last_scrape_error",
            "Whether the last scrape resulted in an error (1 for error, 0 for success).",
        )
        .unwrap();
        let up = IntGauge::new("mssql_up", "Whether the SQL Server instance is up.").unwrap();

        for c in [
            Box::new(scrapes_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(scrape_errors.clone()),
            Box::new(last_scrape_error.clone()),
            Box::new(up.clone()),
        ] {
            if let Err(e) = registry.register(c) {
                error!(error = %e, "failed to register self-metric");
            }
        }

        Self {
            registry,
            scrapes_total,
            scrape_errors,
            last_scrape_error,
            up,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_metrics_register_and_gather() {
        let m = SelfMetrics::new();
        m.scrapes_total.inc();
        m.up.set(1);
        m.scrape_errors.with_label_values(&["mssql_db_space"]).inc();

        let families = m.registry.gather();
        let names: Vec<_> = families.iter().map(|f| f.get_name()).collect();
        assert!(names.contains(&"mssql_exporter_scrapes_total"));
        assert!(names.contains(&"mssql_up"));
        assert!(names.contains(&"mssql_exporter_scrape_errors_total"));
    }
}
