//! The built-in scrape units.

use std::sync::Arc;

use super::ScrapeUnit;

pub mod backups;
pub mod configs;
pub mod db_meta;
pub mod db_space;
pub mod instance_info;
pub mod mirroring;
pub mod perf_counters;
pub mod query_stats;
pub mod sessions;
pub mod wait_stats;

pub use instance_info::InstanceInfo;

/// The full unit set, each owning its throttle and capture state.
pub fn default_units() -> Vec<Arc<dyn ScrapeUnit>> {
    vec![
        Arc::new(instance_info::InstanceInfoUnit),
        Arc::new(perf_counters::PerfCounterUnit),
        Arc::new(wait_stats::WaitStatUnit::new()),
        Arc::new(query_stats::QueryStatUnit::new()),
        Arc::new(db_space::DbSpaceUnit::new()),
        Arc::new(backups::BackupUnit::new()),
        Arc::new(db_meta::DbMetaUnit),
        Arc::new(sessions::SessionUnit),
        Arc::new(mirroring::MirroringUnit::new()),
        Arc::new(configs::ConfigUnit::new()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn unit_names_are_unique() {
        let units = default_units();
        let names: HashSet<_> = units.iter().map(|u| u.name()).collect();
        assert_eq!(names.len(), units.len());
    }
}
