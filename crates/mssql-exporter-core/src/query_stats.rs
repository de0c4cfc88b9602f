//! Interval deltas over cumulative per-query execution statistics.
//!
//! `sys.dm_exec_query_stats` counters are cumulative since plan creation; a
//! point-in-time read is meaningless on its own. The tracker keeps exactly one
//! previous snapshot and turns each new one into per-query deltas for the
//! interval between the two captures.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::NaiveDateTime;

/// Composite key correlating a query's statistics across scrapes.
///
/// Field order is `query_text / query_hash / creation_time`. The text is part
/// of the identity on purpose: a cache eviction and re-compilation of the same
/// hash under new text is a new entity and must never be diffed against the
/// old cumulative counters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryIdentity {
    pub query_text: String,
    pub query_hash: String,
    pub creation_time: String,
}

impl std::fmt::Display for QueryIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.query_text, self.query_hash, self.creation_time
        )
    }
}

/// The cumulative counter fields of one query-stats row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryCounters {
    pub execution_count: i64,
    pub logical_reads: i64,
    pub physical_reads: i64,
    pub elapsed_time: i64,
    pub worker_time: i64,
    pub clr_time: i64,
    pub row_count: i64,
}

impl QueryCounters {
    /// Difference against a prior capture. May be zero or negative when the
    /// engine's counter wrapped or was reset; surfaced as-is, never clamped.
    pub fn delta(&self, prior: &QueryCounters) -> QueryCounters {
        QueryCounters {
            execution_count: self.execution_count - prior.execution_count,
            logical_reads: self.logical_reads - prior.logical_reads,
            physical_reads: self.physical_reads - prior.physical_reads,
            elapsed_time: self.elapsed_time - prior.elapsed_time,
            worker_time: self.worker_time - prior.worker_time,
            clr_time: self.clr_time - prior.clr_time,
            row_count: self.row_count - prior.row_count,
        }
    }
}

/// One query-stats row as captured from the instance.
#[derive(Debug, Clone)]
pub struct QueryStat {
    pub identity: QueryIdentity,
    pub database_name: String,
    pub counters: QueryCounters,
}

/// Interval delta emitted for one query identity.
#[derive(Debug, Clone)]
pub struct QueryStatDelta {
    pub identity: QueryIdentity,
    pub database_name: String,
    pub delta: QueryCounters,
}

/// Result of one reconcile pass.
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    pub deltas: Vec<QueryStatDelta>,
    /// Capture window `(previous, current)`; absent on the baseline-setting
    /// first pass.
    pub window: Option<(NaiveDateTime, NaiveDateTime)>,
}

#[derive(Default)]
struct TrackerState {
    snapshot: Option<HashMap<QueryIdentity, QueryCounters>>,
    last_capture: Option<NaiveDateTime>,
}

/// Holds the single previous snapshot and computes interval deltas.
///
/// The whole reconcile runs under one lock, so a concurrent scrape sees either
/// the old snapshot or the new one, never a partial replacement.
#[derive(Default)]
pub struct DeltaTracker {
    inner: Mutex<TrackerState>,
}

impl DeltaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diffs `current` against the stored snapshot, then atomically replaces it.
    ///
    /// The first call establishes the baseline and emits nothing. Identities
    /// absent from the prior snapshot pass their raw cumulative values through
    /// as the delta. Entries whose delta execution count is not positive are
    /// suppressed to bound output volume.
    pub fn reconcile(&self, now: NaiveDateTime, current: Vec<QueryStat>) -> ReconcileOutcome {
        let mut state = self.inner.lock().unwrap();

        let mut deltas = Vec::new();
        if let Some(prior) = state.snapshot.as_ref() {
            for stat in &current {
                let delta = match prior.get(&stat.identity) {
                    Some(p) => stat.counters.delta(p),
                    None => stat.counters,
                };
                if delta.execution_count > 0 {
                    deltas.push(QueryStatDelta {
                        identity: stat.identity.clone(),
                        database_name: stat.database_name.clone(),
                        delta,
                    });
                }
            }
        }

        let window = state.last_capture.map(|begin| (begin, now));
        state.snapshot = Some(
            current
                .into_iter()
                .map(|s| (s.identity, s.counters))
                .collect(),
        );
        state.last_capture = Some(now);

        ReconcileOutcome { deltas, window }
    }
}
