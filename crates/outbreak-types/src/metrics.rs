//! Epidemiological counters published once per simulated day.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Snapshot of the epidemic counters.
///
/// `new_infections` and `new_recoveries` count transitions since the last
/// flush; the population counters are cumulative over the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Metrics {
    /// Agents that became infected since the last flush.
    pub new_infections: i64,
    /// Agents that became immune since the last flush.
    pub new_recoveries: i64,
    /// Agents currently infected or infectious.
    pub infected_population: i64,
    /// Agents currently infectious.
    pub infectious_population: i64,
    /// Agents currently immune.
    pub immune_population: i64,
}
