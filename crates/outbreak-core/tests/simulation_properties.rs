//! End-to-end properties of a simulation run.
//!
//! Each test builds a 1000-agent simulation, drives it through the public
//! kernel API with a command task, and inspects the events delivered to a
//! recording subscriber. `start()` drains the bus before returning, so the
//! recording is complete once it does.

#![allow(clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use outbreak_core::config::Period;
use outbreak_core::{
    EndReason, MetricsAggregator, Simulation, SimulationConfig, SimulationResult,
};
use outbreak_types::{Command, CommandType, Event, HealthState, JurisdictionId, Policy, TestStrategy};
use tokio::sync::mpsc;

type Recording = Arc<Mutex<Vec<Event>>>;

fn config(transmission_rate: f64, max_epochs: u64) -> SimulationConfig {
    let mut config = SimulationConfig::default();
    config.pathogen.transmission_rate = transmission_rate;
    config.simulation.max_epochs = max_epochs;
    config
}

fn record(sim: &Simulation) -> Recording {
    let recording: Recording = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&recording);
    sim.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
    recording
}

/// Start the run while a separate task feeds `commands` in order.
async fn run_with(sim: &mut Simulation, commands: Vec<Command>) -> SimulationResult {
    let sender = sim.command_sender();
    let feeder = tokio::spawn(async move {
        for command in commands {
            sender.send(command).await.unwrap();
        }
    });
    let result = sim.start().await.unwrap();
    feeder.await.unwrap();
    result
}

fn processed(events: &[Event]) -> Vec<(usize, CommandType)> {
    events
        .iter()
        .enumerate()
        .filter_map(|(i, e)| match e {
            Event::CommandProcessed(p) => Some((i, p.command.command_type)),
            _ => None,
        })
        .collect()
}

fn epoch_ends_after(events: &[Event], index: usize) -> usize {
    events
        .iter()
        .skip(index)
        .filter(|e| matches!(e, Event::EpochEnd(_)))
        .count()
}

#[tokio::test]
async fn exactly_one_agent_is_infected_at_start() {
    let mut sim = Simulation::new(&config(0.0, 0)).unwrap();
    let recording = record(&sim);

    let result = run_with(&mut sim, vec![Command::quit()]).await;

    assert_eq!(result.end_reason, EndReason::Quit);
    let census = sim.census();
    assert_eq!(census.infected, 1);
    assert_eq!(census.susceptible, 999);

    let events = recording.lock().unwrap();
    assert!(matches!(events.first(), Some(Event::SimulationInitialized(p)) if p.num_agents == 1000));
    let seeded: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            Event::AgentStateUpdate(u) => Some(u),
            _ => None,
        })
        .collect();
    assert_eq!(seeded.len(), 1);
    let seed = seeded.first().unwrap();
    assert_eq!(seed.state, HealthState::Infected);
    assert_eq!(seed.previous_state, HealthState::Susceptible);
    assert!(seed.has_infection_profile);
}

#[tokio::test]
async fn every_agent_is_somewhere_every_epoch() {
    let mut sim = Simulation::new(&config(0.2, 72)).unwrap();
    let recording = record(&sim);

    let result = run_with(&mut sim, Vec::new()).await;
    assert_eq!(result.end_reason, EndReason::MaxEpochsReached);
    assert_eq!(sim.census().total(), 1000);

    let events = recording.lock().unwrap();
    let mut per_epoch: BTreeMap<u64, BTreeMap<HealthState, u64>> = BTreeMap::new();
    for event in events.iter() {
        if let Event::SpaceOccupancyUpdate(update) = event {
            let counts = per_epoch.entry(update.epoch).or_default();
            for occupant in &update.occupants {
                *counts.entry(occupant.state).or_default() += 1;
            }
        }
    }

    assert_eq!(per_epoch.len(), 72);
    for (epoch, counts) in &per_epoch {
        assert_eq!(counts.values().sum::<u64>(), 1000, "epoch {epoch}");
    }
    let last = per_epoch.get(&72).unwrap();
    let census = sim.census();
    for state in HealthState::ALL {
        assert_eq!(
            last.get(&state).copied().unwrap_or(0),
            census.count(state),
            "{state:?}"
        );
    }
}

#[tokio::test]
async fn epoch_end_events_arrive_in_order() {
    let mut sim = Simulation::new(&config(0.05, 30)).unwrap();
    let recording = record(&sim);

    run_with(&mut sim, Vec::new()).await;

    let events = recording.lock().unwrap();
    let epochs: Vec<u64> = events
        .iter()
        .filter_map(|e| match e {
            Event::EpochEnd(p) => Some(p.epoch),
            _ => None,
        })
        .collect();
    assert_eq!(epochs, (1..=30).collect::<Vec<_>>());
}

#[tokio::test]
async fn policy_for_unknown_jurisdiction_changes_nothing() {
    let mut sim = Simulation::new(&config(0.0, 0)).unwrap();
    let recording = record(&sim);
    let policy = Policy {
        is_mask_mandate: true,
        is_lockdown: true,
        test_strategy: TestStrategy::Everyone,
        test_capacity_multiplier: 4.0,
    };

    run_with(
        &mut sim,
        vec![
            Command::apply_jurisdiction_policy(JurisdictionId::new("atlantis"), policy),
            Command::quit(),
        ],
    )
    .await;

    assert!(
        sim.world()
            .jurisdictions()
            .iter()
            .all(|j| j.policy() == &Policy::default())
    );
    let events = recording.lock().unwrap();
    let policy_commands = processed(&events)
        .into_iter()
        .filter(|(_, t)| *t == CommandType::ApplyJurisdictionPolicy)
        .count();
    assert_eq!(policy_commands, 1);
    assert!(!events.iter().any(|e| matches!(e, Event::PolicyUpdate(_))));
}

#[tokio::test]
async fn policy_for_known_jurisdiction_is_applied_and_announced() {
    let mut sim = Simulation::new(&config(0.0, 0)).unwrap();
    let recording = record(&sim);
    let policy = Policy {
        is_mask_mandate: true,
        is_lockdown: false,
        test_strategy: TestStrategy::None,
        test_capacity_multiplier: 0.5,
    };

    run_with(
        &mut sim,
        vec![
            Command::apply_jurisdiction_policy(JurisdictionId::new("default"), policy.clone()),
            Command::quit(),
        ],
    )
    .await;

    let jurisdiction = sim.world().jurisdictions().first().unwrap();
    assert_eq!(jurisdiction.policy(), &policy);

    let events = recording.lock().unwrap();
    let update_at = events
        .iter()
        .position(|e| matches!(e, Event::PolicyUpdate(u) if u.is_mask_mandate && !u.is_lockdown))
        .unwrap();
    let (processed_at, _) = processed(&events)
        .into_iter()
        .find(|(_, t)| *t == CommandType::ApplyJurisdictionPolicy)
        .unwrap();
    assert!(update_at < processed_at);
}

#[tokio::test]
async fn malformed_policy_payload_is_processed_without_effect() {
    let mut sim = Simulation::new(&config(0.0, 0)).unwrap();
    let recording = record(&sim);
    let malformed: Command =
        serde_json::from_str(r#"{"type":"apply_jurisdiction_policy","payload":"lockdown"}"#)
            .unwrap();

    let result = run_with(&mut sim, vec![malformed, Command::quit()]).await;

    assert_eq!(result.commands_processed, 2);
    assert!(
        sim.world()
            .jurisdictions()
            .iter()
            .all(|j| j.policy() == &Policy::default())
    );
    let events = recording.lock().unwrap();
    assert_eq!(processed(&events).len(), 2);
}

#[tokio::test]
async fn repeated_pause_stays_paused_and_quit_stops_epochs() {
    let mut sim = Simulation::new(&config(0.0, 10_000)).unwrap();
    let recording = record(&sim);

    let result = run_with(
        &mut sim,
        vec![
            Command::pause(),
            Command::pause(),
            Command::pause(),
            Command::quit(),
        ],
    )
    .await;

    assert_eq!(result.end_reason, EndReason::Quit);
    assert!(sim.is_paused());

    let events = recording.lock().unwrap();
    let commands = processed(&events);
    let types: Vec<CommandType> = commands.iter().map(|(_, t)| *t).collect();
    assert_eq!(
        types,
        vec![
            CommandType::Pause,
            CommandType::Pause,
            CommandType::Pause,
            CommandType::Quit
        ]
    );
    let (first_pause, _) = commands.first().copied().unwrap();
    assert_eq!(epoch_ends_after(&events, first_pause), 0);
}

#[tokio::test]
async fn quit_while_running_stops_epochs() {
    let mut sim = Simulation::new(&config(0.0, 10_000)).unwrap();
    let recording = record(&sim);
    let sender = sim.command_sender();

    let feeder = tokio::spawn(async move {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        sender.send(Command::quit()).await.unwrap();
    });
    let result = sim.start().await.unwrap();
    feeder.await.unwrap();

    assert_eq!(result.end_reason, EndReason::Quit);
    assert!(result.total_epochs < 10_000);

    let events = recording.lock().unwrap();
    let (quit_at, _) = processed(&events).last().copied().unwrap();
    assert_eq!(epoch_ends_after(&events, quit_at), 0);
    assert!(matches!(events.last(), Some(Event::CommandProcessed(_))));
}

#[tokio::test]
async fn first_metrics_flush_lands_on_day_one() {
    let mut sim = Simulation::new(&config(0.0, 72)).unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    sim.subscribe(MetricsAggregator::new().into_subscriber(tx));

    run_with(&mut sim, Vec::new()).await;

    let mut reports = Vec::new();
    while let Ok(report) = rx.try_recv() {
        reports.push(report);
    }
    let epochs: Vec<u64> = reports.iter().map(|r| r.epoch).collect();
    assert_eq!(epochs, vec![24, 48, 72]);

    let first = reports.first().unwrap();
    assert!(first.metrics.new_infections >= 1);
    assert!(first.metrics.infected_population >= 1);

    let second = reports.get(1).unwrap();
    assert_eq!(second.metrics.new_infections, 0);
    assert_eq!(
        second.metrics.infected_population,
        first.metrics.infected_population
    );
    for report in &reports {
        assert!(report.metrics.infected_population >= 0);
        assert!(report.metrics.infectious_population >= 0);
    }
}

const HOUR_MS: u64 = 3_600_000;

const fn hours(n: u64) -> Period {
    Period {
        mean_ms: n * HOUR_MS,
        std_dev_ms: 0,
    }
}

#[tokio::test]
async fn full_cycle_transitions_follow_the_disease_order() {
    let mut config = config(0.3, 240);
    config.pathogen.incubation_period = hours(1);
    config.pathogen.infectious_period = hours(2);
    config.pathogen.immunity_period = hours(3);
    let mut sim = Simulation::new(&config).unwrap();
    let recording = record(&sim);

    // Subscriber panics are swallowed by the bus, so bad counters are
    // collected and checked after the run.
    let aggregator = Arc::new(Mutex::new(MetricsAggregator::new()));
    let inconsistent = Arc::new(Mutex::new(Vec::new()));
    let (folded, bad) = (Arc::clone(&aggregator), Arc::clone(&inconsistent));
    sim.subscribe(move |event| {
        let mut aggregator = folded.lock().unwrap();
        aggregator.observe(event);
        let m = aggregator.metrics();
        if m.infectious_population < 0
            || m.immune_population < 0
            || m.infected_population < m.infectious_population
        {
            bad.lock().unwrap().push(m);
        }
    });

    let result = run_with(&mut sim, Vec::new()).await;
    assert_eq!(result.end_reason, EndReason::MaxEpochsReached);
    assert!(result.drained);

    let events = recording.lock().unwrap();
    let mut transitions: BTreeMap<(HealthState, HealthState), usize> = BTreeMap::new();
    for event in events.iter() {
        if let Event::AgentStateUpdate(update) = event {
            assert_eq!(update.previous_state.next(), update.state);
            *transitions
                .entry((update.previous_state, update.state))
                .or_default() += 1;
        }
    }
    for state in [
        HealthState::Susceptible,
        HealthState::Infected,
        HealthState::Infectious,
        HealthState::Immune,
    ] {
        assert!(
            transitions.get(&(state, state.next())).is_some_and(|n| *n > 0),
            "no {state:?} -> {:?} transition",
            state.next()
        );
    }

    let census = sim.census();
    let metrics = aggregator.lock().unwrap().metrics();
    assert!(inconsistent.lock().unwrap().is_empty());
    let as_count = |n: u64| i64::try_from(n).unwrap();
    assert_eq!(
        metrics.infected_population,
        as_count(census.infected + census.infectious)
    );
    assert_eq!(metrics.infectious_population, as_count(census.infectious));
    assert_eq!(metrics.immune_population, as_count(census.immune));
}
