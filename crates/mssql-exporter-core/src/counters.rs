//! Raw performance counter classification.
//!
//! `sys.dm_os_performance_counters` exposes low-level counter primitives that
//! need type-specific interpretation before they are worth exposing:
//! instantaneous gauges, monotonic counters, and ratio counters paired with a
//! separate base (denominator) counter. Classification is a pure function of
//! the vendor type tag; ratio resolution joins against the base counters of
//! the same scrape.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use crate::fmt::{label_name, tail_of};
use crate::sink::{MetricKind, Sample};

// Vendor type tags, as stored in the cntr_type column.
pub const PERF_COUNTER_LARGE_RAWCOUNT: i64 = 65_792;
pub const PERF_COUNTER_BULK_COUNT: i64 = 272_696_576;
pub const PERF_LARGE_RAW_FRACTION: i64 = 537_003_264;
pub const PERF_AVERAGE_BULK: i64 = 1_073_874_176;
pub const PERF_LARGE_RAW_BASE: i64 = 1_073_939_712;

/// Interpreted counter shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterKind {
    /// Instantaneous value, exposed as-is.
    RawGauge,
    /// Monotonic count; the consumer computes the rate.
    BulkCount,
    /// Numerator of a ratio; resolved against its base counter.
    RawFraction,
    /// Denominator counter; exposed too so downstream ratio math is possible.
    RawBase,
    /// Per-operation average numerator; exposed as a counter like its base.
    AverageBulk,
}

impl CounterKind {
    pub fn from_type_tag(tag: i64) -> Option<Self> {
        match tag {
            PERF_COUNTER_LARGE_RAWCOUNT => Some(CounterKind::RawGauge),
            PERF_COUNTER_BULK_COUNT => Some(CounterKind::BulkCount),
            PERF_LARGE_RAW_FRACTION => Some(CounterKind::RawFraction),
            PERF_LARGE_RAW_BASE => Some(CounterKind::RawBase),
            PERF_AVERAGE_BULK => Some(CounterKind::AverageBulk),
            _ => None,
        }
    }
}

/// One raw counter record, fresh each scrape.
#[derive(Debug, Clone)]
pub struct PerfCounter {
    pub object_name: String,
    pub counter_name: String,
    pub instance_name: String,
    pub value: i64,
    pub type_tag: i64,
}

pub const PERF_COUNTER_LABELS: &[&str] = &["object_name", "counter_name", "instance_name"];
const PERF_COUNTER_HELP: &str = "MSSQL performance counter";

/// Counters worth exposing. Everything else is dropped before classification
/// to bound cardinality.
static SELECTED_COUNTERS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "Average Wait Time Base",
        "Average Latch Wait Time Base",
        "Active Temp Tables",
        "Temp Tables Creation Rate",
        "Logins/sec",
        "Connection Reset/sec",
        "Logouts/sec",
        "User Connections",
        "Logical Connections",
        "Transactions",
        "Processes blocked",
        "Full Scans/sec",
        "Range Scans/sec",
        "Probe Scans/sec",
        "Workfiles Created/sec",
        "Worktables Created/sec",
        "Forwarded Records/sec",
        "Index Searches/sec",
        "Page Splits/sec",
        "Buffer cache hit ratio",
        "Page lookups/sec",
        "Database pages",
        "Target pages",
        "Lazy writes/sec",
        "Readahead pages/sec",
        "Page reads/sec",
        "Page writes/sec",
        "Checkpoint pages/sec",
        "Background writer pages/sec",
        "Page life expectancy",
        "Cache Hit Ratio",
        "Batch Requests/sec",
        "Forced Parameterizations/sec",
        "Auto-Param Attempts/sec",
        "Failed Auto-Params/sec",
        "SQL Compilations/sec",
        "SQL Re-Compilations/sec",
        "Total Server Memory (KB)",
        "Database Cache Memory (KB)",
        "Free Memory (KB)",
        "Stolen Server Memory (KB)",
        "Lock Memory (KB)",
        "Log Pool Memory (KB)",
        "SQL Cache Memory (KB)",
        "Connection Memory (KB)",
        "Optimizer Memory (KB)",
        "Reserved Server Memory (KB)",
        "Memory Grants Outstanding",
        "Memory Grants Pending",
        "Average Wait Time (ms)",
        "Lock Requests/sec",
        "Lock Timeouts/sec",
        "Lock Wait Time (ms)",
        "Lock Waits/sec",
        "Number of Deadlocks/sec",
        "Average Latch Wait Time (ms)",
        "Latch Waits/sec",
        "Number of SuperLatches",
        "Total Latch Wait Time (ms)",
        "Active Transactions",
        "Data File(s) Size (KB)",
        "Log Bytes Flushed/sec",
        "Log File(s) Size (KB)",
        "Log File(s) Used Size (KB)",
        "Log Flush Wait Time",
        "Log Flush Waits/sec",
        "Log Flush Write Time (ms)",
        "Log Flushes/sec",
        "Percent Log Used",
        "Transactions/sec",
        "Write Transactions/sec",
        "Free Space in tempdb (KB)",
        "Longest Transaction Running Time",
        "Snapshot Transactions",
        "Version Cleanup rate (KB/s)",
        "Version Generation rate (KB/s)",
        "Version Store Size (KB)",
        "Active parallel threads",
        "Active requests",
        "Blocked tasks",
        "CPU usage %",
        "Queued requests",
        "Reduced memory grants/sec",
        "Requests completed/sec",
    ]
    .into_iter()
    .collect()
});

/// Classifies a scrape's worth of raw counters into typed samples.
///
/// Fractions without a resolvable base are dropped (§: a ratio without its
/// denominator must not be exposed as zero or as the raw numerator). A
/// zero-valued base yields an exact `0.0` instead of a division by zero.
pub fn classify(counters: &[PerfCounter]) -> Vec<Sample> {
    let bases = base_counter_index(counters);
    let mut samples = Vec::new();

    for c in counters {
        if !SELECTED_COUNTERS.contains(c.counter_name.as_str()) {
            continue;
        }

        let Some(kind) = CounterKind::from_type_tag(c.type_tag) else {
            continue;
        };

        let (metric_kind, value) = match kind {
            CounterKind::RawGauge => (MetricKind::Gauge, c.value as f64),
            CounterKind::BulkCount | CounterKind::RawBase | CounterKind::AverageBulk => {
                (MetricKind::Counter, c.value as f64)
            }
            CounterKind::RawFraction => match fraction_value(c, &bases) {
                Some(v) => (MetricKind::Gauge, v),
                None => continue,
            },
        };

        samples.push(Sample {
            name: format!("mssql_perfcounter_{}", label_name(&c.counter_name)),
            help: PERF_COUNTER_HELP,
            label_names: PERF_COUNTER_LABELS,
            label_values: vec![
                tail_of(&c.object_name, ':').to_string(),
                c.counter_name.clone(),
                c.instance_name.clone(),
            ],
            kind: metric_kind,
            value,
        });
    }

    samples
}

/// Index of RAW_BASE counters, keyed by lowercase `name-instance`, built once
/// per scrape and consulted only within it.
fn base_counter_index(counters: &[PerfCounter]) -> HashMap<String, i64> {
    counters
        .iter()
        .filter(|c| c.type_tag == PERF_LARGE_RAW_BASE)
        .map(|c| (base_key(&c.counter_name, &c.instance_name), c.value))
        .collect()
}

fn base_key(counter_name: &str, instance_name: &str) -> String {
    format!("{}-{}", counter_name, instance_name).to_lowercase()
}

/// Resolves a RAW_FRACTION counter against its paired base.
///
/// The base is named `<counter> Base`, except for the documented irregular
/// pairing of "Average Wait Time (ms)" with "Average Wait Time Base".
fn fraction_value(c: &PerfCounter, bases: &HashMap<String, i64>) -> Option<f64> {
    let base_name = if c.counter_name == "Average Wait Time (ms)" {
        "Average Wait Time Base".to_string()
    } else {
        format!("{} Base", c.counter_name)
    };

    let base_value = *bases.get(&base_key(&base_name, &c.instance_name))?;
    if base_value == 0 {
        return Some(0.0);
    }
    Some(c.value as f64 / base_value as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter(name: &str, instance: &str, value: i64, type_tag: i64) -> PerfCounter {
        PerfCounter {
            object_name: "MSSQL$PROD:Buffer Manager".to_string(),
            counter_name: name.to_string(),
            instance_name: instance.to_string(),
            value,
            type_tag,
        }
    }

    #[test]
    fn kind_is_a_pure_function_of_the_type_tag() {
        let counters = vec![
            counter("User Connections", "", 12, PERF_COUNTER_LARGE_RAWCOUNT),
            counter("Batch Requests/sec", "", 900, PERF_COUNTER_BULK_COUNT),
            counter("Average Wait Time Base", "_Total", 4, PERF_LARGE_RAW_BASE),
            counter("Lock Wait Time (ms)", "", 77, PERF_AVERAGE_BULK),
        ];
        let samples = classify(&counters);
        assert_eq!(samples.len(), 4);
        assert_eq!(samples[0].kind, MetricKind::Gauge);
        assert_eq!(samples[1].kind, MetricKind::Counter);
        assert_eq!(samples[2].kind, MetricKind::Counter);
        assert_eq!(samples[3].kind, MetricKind::Counter);
        assert_eq!(samples[0].value, 12.0);
    }

    #[test]
    fn fraction_divides_by_its_base() {
        let counters = vec![
            counter("Buffer cache hit ratio", "", 981, PERF_LARGE_RAW_FRACTION),
            counter("Buffer cache hit ratio Base", "", 1000, PERF_LARGE_RAW_BASE),
        ];
        // "Buffer cache hit ratio Base" is not in the allow-list, so only the
        // resolved ratio comes out.
        let samples = classify(&counters);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].kind, MetricKind::Gauge);
        assert!((samples[0].value - 0.981).abs() < 1e-12);
    }

    #[test]
    fn zero_base_yields_exact_zero() {
        let counters = vec![
            counter("Average Wait Time (ms)", "_Total", 50, PERF_LARGE_RAW_FRACTION),
            counter("Average Wait Time Base", "_Total", 0, PERF_LARGE_RAW_BASE),
        ];
        let samples = classify(&counters);
        // base itself is allow-listed, plus the resolved fraction
        let frac = samples
            .iter()
            .find(|s| s.label_values[1] == "Average Wait Time (ms)")
            .unwrap();
        assert_eq!(frac.value, 0.0);
    }

    #[test]
    fn fraction_without_base_is_dropped() {
        let counters = vec![counter(
            "Buffer cache hit ratio",
            "",
            981,
            PERF_LARGE_RAW_FRACTION,
        )];
        assert!(classify(&counters).is_empty());
    }

    #[test]
    fn base_pairing_respects_instance_qualifier() {
        let counters = vec![
            counter("Average Wait Time (ms)", "Database", 30, PERF_LARGE_RAW_FRACTION),
            counter("Average Wait Time Base", "Page", 10, PERF_LARGE_RAW_BASE),
        ];
        // base exists only under a different instance qualifier
        let samples = classify(&counters);
        assert!(
            samples
                .iter()
                .all(|s| s.label_values[1] != "Average Wait Time (ms)")
        );
    }

    #[test]
    fn counters_outside_the_allow_list_are_dropped() {
        let counters = vec![counter(
            "Some Obscure Counter",
            "",
            1,
            PERF_COUNTER_LARGE_RAWCOUNT,
        )];
        assert!(classify(&counters).is_empty());
    }

    #[test]
    fn unknown_type_tags_are_skipped() {
        let counters = vec![counter("User Connections", "", 1, 42)];
        assert!(classify(&counters).is_empty());
    }

    #[test]
    fn labels_carry_object_tail_counter_and_instance() {
        let counters = vec![counter(
            "User Connections",
            "prod",
            3,
            PERF_COUNTER_LARGE_RAWCOUNT,
        )];
        let samples = classify(&counters);
        assert_eq!(
            samples[0].label_values,
            vec!["Buffer Manager", "User Connections", "prod"]
        );
        assert_eq!(samples[0].name, "mssql_perfcounter_user_connections");
    }
}
