//! Daily epidemic metrics built from the event stream.
//!
//! The [`MetricsAggregator`] is an ordinary bus subscriber: it counts
//! health-state transitions and, whenever an `EpochEnd` lands exactly on a
//! day boundary of simulated time, publishes a [`DailyMetrics`] snapshot
//! to a [`MetricsSink`] and resets the per-day counters. The kernel never
//! reads these counters.

use chrono::{DateTime, Utc};
use outbreak_types::{EpochEndPayload, Event, HealthState, Metrics};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::DAY_MS;

/// A metrics snapshot taken at the end of a simulated day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyMetrics {
    /// Epoch whose end closed the day.
    pub epoch: u64,
    /// Simulated time of the day boundary.
    pub date: DateTime<Utc>,
    /// Counter values at the boundary, before the per-day reset.
    pub metrics: Metrics,
}

/// Destination for daily snapshots.
pub trait MetricsSink: Send {
    /// Called once per simulated day.
    fn publish(&mut self, report: &DailyMetrics);
}

impl MetricsSink for mpsc::UnboundedSender<DailyMetrics> {
    fn publish(&mut self, report: &DailyMetrics) {
        if self.send(*report).is_err() {
            debug!(epoch = report.epoch, "metrics receiver dropped");
        }
    }
}

/// Writes a human-readable report through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMetricsSink;

impl MetricsSink for LogMetricsSink {
    fn publish(&mut self, report: &DailyMetrics) {
        let m = &report.metrics;
        info!(
            epoch = report.epoch,
            new_infections = m.new_infections,
            new_recoveries = m.new_recoveries,
            infected = m.infected_population,
            infectious = m.infectious_population,
            immune = m.immune_population,
            "Epidemic state on {}",
            report.date.format("%d-%m-%Y")
        );
    }
}

/// Running epidemic counters.
#[derive(Debug, Clone, Default)]
pub struct MetricsAggregator {
    metrics: Metrics,
}

impl MetricsAggregator {
    /// All counters start at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current counter values.
    pub const fn metrics(&self) -> Metrics {
        self.metrics
    }

    /// Fold one event into the counters.
    ///
    /// Returns a snapshot when the event closes a simulated day.
    pub fn observe(&mut self, event: &Event) -> Option<DailyMetrics> {
        match event {
            Event::AgentStateUpdate(update) => {
                self.record(update.state);
                None
            }
            Event::EpochEnd(end) => self.flush(end),
            _ => None,
        }
    }

    /// Turn the aggregator into a bus subscriber publishing to `sink`.
    pub fn into_subscriber<S>(mut self, mut sink: S) -> impl FnMut(&Event) + Send + 'static
    where
        S: MetricsSink + 'static,
    {
        move |event| {
            if let Some(report) = self.observe(event) {
                sink.publish(&report);
            }
        }
    }

    const fn record(&mut self, state: HealthState) {
        let m = &mut self.metrics;
        match state {
            HealthState::Infected => {
                m.new_infections = m.new_infections.saturating_add(1);
                m.infected_population = m.infected_population.saturating_add(1);
            }
            HealthState::Infectious => {
                m.infectious_population = m.infectious_population.saturating_add(1);
            }
            HealthState::Immune => {
                m.immune_population = m.immune_population.saturating_add(1);
                m.new_recoveries = m.new_recoveries.saturating_add(1);
                m.infected_population = m.infected_population.saturating_sub(1);
                m.infectious_population = m.infectious_population.saturating_sub(1);
            }
            HealthState::Susceptible => {
                m.immune_population = m.immune_population.saturating_sub(1);
            }
        }
    }

    fn flush(&mut self, end: &EpochEndPayload) -> Option<DailyMetrics> {
        let elapsed = end.epoch.checked_mul(end.time_step)?;
        if elapsed.checked_rem(DAY_MS) != Some(0) {
            return None;
        }
        let report = DailyMetrics {
            epoch: end.epoch,
            date: end.time,
            metrics: self.metrics,
        };
        self.metrics.new_infections = 0;
        self.metrics.new_recoveries = 0;
        Some(report)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use outbreak_types::{AgentId, AgentStateUpdatePayload};

    use super::*;

    const HOUR: u64 = 3_600_000;

    fn transition(previous: HealthState, state: HealthState) -> Event {
        Event::AgentStateUpdate(AgentStateUpdatePayload {
            epoch: 1,
            id: AgentId::new(),
            state,
            previous_state: previous,
            has_infection_profile: state != HealthState::Susceptible,
            jurisdiction: "J1".into(),
        })
    }

    fn epoch_end(epoch: u64, time_step: u64) -> Event {
        Event::EpochEnd(EpochEndPayload {
            epoch,
            time_step,
            time: Utc::now(),
        })
    }

    /// One agent through `S -> I -> Infectious -> Immune -> S`.
    fn full_cycle() -> Vec<Event> {
        HealthState::ALL
            .iter()
            .map(|state| transition(*state, state.next()))
            .collect()
    }

    #[test]
    fn flushes_once_per_day_with_hourly_epochs() {
        let mut aggregator = MetricsAggregator::new();
        let flushed: Vec<u64> = (1..=96)
            .filter_map(|epoch| aggregator.observe(&epoch_end(epoch, HOUR)))
            .map(|report| report.epoch)
            .collect();
        assert_eq!(flushed, vec![24, 48, 72, 96]);
    }

    #[test]
    fn flushes_every_epoch_with_daily_epochs() {
        let mut aggregator = MetricsAggregator::new();
        for epoch in 1..=5 {
            assert!(aggregator.observe(&epoch_end(epoch, DAY_MS)).is_some());
        }
    }

    #[test]
    fn a_time_step_that_does_not_divide_a_day_rarely_aligns() {
        let mut aggregator = MetricsAggregator::new();
        let seven_hours = 7 * HOUR;
        let flushed: Vec<u64> = (1..=48)
            .filter_map(|epoch| aggregator.observe(&epoch_end(epoch, seven_hours)))
            .map(|report| report.epoch)
            .collect();
        assert_eq!(flushed, vec![24, 48]);
    }

    #[test]
    fn counts_each_transition() {
        let mut aggregator = MetricsAggregator::new();
        for event in full_cycle() {
            aggregator.observe(&event);
        }
        let m = aggregator.metrics();
        assert_eq!(m.new_infections, 1);
        assert_eq!(m.new_recoveries, 1);
        assert_eq!(m.infected_population, 0);
        assert_eq!(m.infectious_population, 0);
        assert_eq!(m.immune_population, 0);
    }

    #[test]
    fn flush_resets_only_daily_counters() {
        let mut aggregator = MetricsAggregator::new();
        aggregator.observe(&transition(HealthState::Susceptible, HealthState::Infected));
        aggregator.observe(&transition(HealthState::Infected, HealthState::Infectious));

        let report = aggregator.observe(&epoch_end(24, HOUR)).unwrap();
        assert_eq!(report.metrics.new_infections, 1);
        assert_eq!(report.metrics.infected_population, 1);
        assert_eq!(report.metrics.infectious_population, 1);

        let after = aggregator.metrics();
        assert_eq!(after.new_infections, 0);
        assert_eq!(after.new_recoveries, 0);
        assert_eq!(after.infected_population, 1);
        assert_eq!(after.infectious_population, 1);
    }

    #[test]
    fn population_counters_stay_non_negative_over_interleaved_cycles() {
        let mut aggregator = MetricsAggregator::new();
        let mut states = [HealthState::Susceptible; 5];
        for step in 0..200_usize {
            let Some(slot) = states.get_mut(step % 5) else {
                continue;
            };
            let next = slot.next();
            aggregator.observe(&transition(*slot, next));
            *slot = next;

            let m = aggregator.metrics();
            assert!(m.infected_population >= 0);
            assert!(m.infectious_population >= 0);
            assert!(m.immune_population >= 0);
        }
    }

    #[test]
    fn subscriber_publishes_to_channel_sink() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut subscriber = MetricsAggregator::new().into_subscriber(tx);

        subscriber(&transition(HealthState::Susceptible, HealthState::Infected));
        for epoch in 1..=48 {
            subscriber(&epoch_end(epoch, HOUR));
        }

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert!(rx.try_recv().is_err());
        assert_eq!(first.epoch, 24);
        assert_eq!(first.metrics.new_infections, 1);
        assert_eq!(second.epoch, 48);
        assert_eq!(second.metrics.new_infections, 0);
        assert_eq!(second.metrics.infected_population, 1);
    }
}
