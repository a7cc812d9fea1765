//! Event subscriber that writes every event to the trace log as JSON.

use std::collections::BTreeMap;

use outbreak_types::Event;
use tracing::{Level, debug, info, trace, warn};

/// Counts events by type and traces each one as its wire JSON.
#[derive(Debug, Default)]
pub struct EventLog {
    seq: u64,
    by_type: BTreeMap<&'static str, u64>,
}

impl EventLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one event.
    pub fn record(&mut self, event: &Event) {
        self.seq = self.seq.saturating_add(1);
        let count = self.by_type.entry(event.type_name()).or_default();
        *count = count.saturating_add(1);

        if let Event::EpochEnd(end) = event {
            debug!(epoch = end.epoch, events = self.seq, "Epoch delivered");
        }
        if !tracing::enabled!(Level::TRACE) {
            return;
        }
        match serde_json::to_string(event) {
            Ok(json) => trace!(seq = self.seq, event = %json, "event"),
            Err(e) => warn!(error = %e, event = event.type_name(), "failed to serialize event"),
        }
    }

    /// Events seen so far.
    pub const fn total(&self) -> u64 {
        self.seq
    }

    /// Events seen so far, keyed by wire type.
    pub const fn counts(&self) -> &BTreeMap<&'static str, u64> {
        &self.by_type
    }

    /// Log the per-type totals.
    pub fn log_summary(&self) {
        for (event_type, count) in self.counts() {
            info!(event_type, count, "Event total");
        }
        info!(total = self.seq, "Events delivered");
    }
}
