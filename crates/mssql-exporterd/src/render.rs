//! Turns buffered samples into Prometheus text exposition.
//!
//! Every scrape builds a fresh registry from the sample buffer; exporter
//! self-metrics live in their own persistent registry and are appended to the
//! same response body.

use std::collections::HashMap;

use prometheus::{CounterVec, Encoder, GaugeVec, Opts, Registry, TextEncoder};
use tracing::warn;

use mssql_exporter_core::{MetricKind, Sample};

enum MetricVec {
    Gauge(GaugeVec),
    Counter(CounterVec),
}

fn make_vec(registry: &Registry, sample: &Sample) -> Option<MetricVec> {
    let opts = Opts::new(sample.name.clone(), sample.help);
    let result = match sample.kind {
        MetricKind::Gauge => GaugeVec::new(opts, sample.label_names).and_then(|v| {
            registry.register(Box::new(v.clone()))?;
            Ok(MetricVec::Gauge(v))
        }),
        MetricKind::Counter => CounterVec::new(opts, sample.label_names).and_then(|v| {
            registry.register(Box::new(v.clone()))?;
            Ok(MetricVec::Counter(v))
        }),
    };
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(metric = %sample.name, error = %e, "cannot register metric, dropping");
            None
        }
    }
}

/// Builds a registry from the samples and encodes it together with `extra`.
pub fn render(samples: Vec<Sample>, extra: &Registry) -> Vec<u8> {
    let registry = Registry::new();
    let mut vecs: HashMap<String, MetricVec> = HashMap::new();

    for sample in &samples {
        if !vecs.contains_key(&sample.name) {
            let Some(v) = make_vec(&registry, sample) else {
                continue;
            };
            vecs.insert(sample.name.clone(), v);
        }
        let labels: Vec<&str> = sample.label_values.iter().map(String::as_str).collect();
        match &vecs[&sample.name] {
            MetricVec::Gauge(v) => match v.get_metric_with_label_values(&labels) {
                Ok(m) => m.set(sample.value),
                Err(e) => warn!(metric = %sample.name, error = %e, "label mismatch, dropping sample"),
            },
            MetricVec::Counter(v) => {
                if sample.value < 0.0 {
                    warn!(metric = %sample.name, value = sample.value,
                        "negative counter sample, dropping");
                    continue;
                }
                match v.get_metric_with_label_values(&labels) {
                    Ok(m) => m.inc_by(sample.value),
                    Err(e) => {
                        warn!(metric = %sample.name, error = %e, "label mismatch, dropping sample")
                    }
                }
            }
        }
    }

    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    for families in [registry.gather(), extra.gather()] {
        if let Err(e) = encoder.encode(&families, &mut buf) {
            warn!(error = %e, "metric encoding failed");
        }
    }
    buf
}

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str, kind: MetricKind, value: f64) -> Sample {
        Sample {
            name: name.to_string(),
            help: "test metric",
            label_names: &["wait_type"],
            label_values: vec!["PAGEIOLATCH_SH".to_string()],
            kind,
            value,
        }
    }

    #[test]
    fn renders_gauges_and_counters() {
        let extra = Registry::new();
        let body = render(
            vec![
                sample("test_gauge", MetricKind::Gauge, 3.5),
                sample("test_counter", MetricKind::Counter, 12.0),
            ],
            &extra,
        );
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("test_gauge{wait_type=\"PAGEIOLATCH_SH\"} 3.5"));
        assert!(text.contains("test_counter{wait_type=\"PAGEIOLATCH_SH\"} 12"));
        assert!(text.contains("# TYPE test_counter counter"));
    }

    #[test]
    fn negative_counter_sample_is_dropped() {
        let extra = Registry::new();
        let body = render(vec![sample("test_counter", MetricKind::Counter, -4.0)], &extra);
        let text = String::from_utf8(body).unwrap();
        assert!(!text.contains("-4"));
    }

    #[test]
    fn extra_registry_is_appended() {
        let extra = Registry::new();
        let g = prometheus::IntGauge::new("mssql_up", "up").unwrap();
        g.set(1);
        extra.register(Box::new(g)).unwrap();

        let body = render(Vec::new(), &extra);
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("mssql_up 1"));
    }
}
