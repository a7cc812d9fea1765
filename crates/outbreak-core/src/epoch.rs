//! The per-epoch update: agents first, then spaces in kind order.
//!
//! Within one epoch every agent is updated in arena order (exposure or
//! scheduled progression, then movement), followed by every space
//! (occupancy snapshot, plus testing for healthcare spaces). Updates emit
//! events through the supplied callback; nothing here touches the bus
//! directly.

use outbreak_types::{
    AgentLocationUpdatePayload, AgentStateUpdatePayload, Event, HealthState, Occupant, SpaceKind,
    SpaceOccupancyUpdatePayload, SpaceTestingUpdatePayload,
};
use rand::Rng;
use rand::rngs::StdRng;

use crate::agent::{AgentIdx, InfectionProfile, Transition};
use crate::config::{MobilityConfig, Pathogen, PolicyEffects};
use crate::sampling::{bernoulli, sample_index};
use crate::space::{SpaceIdx, testing_capacity};
use crate::world::World;

/// Read-only parameters of one epoch.
#[derive(Debug, Clone, Copy)]
pub struct EpochContext<'a> {
    /// The epoch being simulated.
    pub epoch: u64,
    /// Simulated milliseconds per epoch.
    pub time_step: u64,
    /// Disease parameters.
    pub pathogen: &'a Pathogen,
    /// Movement parameters.
    pub mobility: &'a MobilityConfig,
    /// Policy strengths.
    pub effects: &'a PolicyEffects,
}

/// Advance every agent and then every space by one epoch.
pub fn run_epoch(
    world: &mut World,
    ctx: &EpochContext<'_>,
    rng: &mut StdRng,
    emit: &mut dyn FnMut(Event),
) {
    for idx in 0..world.agents.len() {
        update_agent(world, AgentIdx(idx), ctx, rng, emit);
    }
    for idx in 0..world.spaces.len() {
        update_space(world, SpaceIdx(idx), ctx.epoch, emit);
    }
}

/// Infect a susceptible agent, scheduling its infection profile.
///
/// Returns the resulting `AgentStateUpdate`, or `None` if the agent does
/// not exist or is not susceptible.
pub fn infect(
    world: &mut World,
    idx: AgentIdx,
    ctx: &EpochContext<'_>,
    rng: &mut StdRng,
) -> Option<Event> {
    let profile = InfectionProfile::sample(rng, ctx.pathogen, ctx.epoch, ctx.time_step);
    let transition = world.agents.get_mut(idx.0)?.infect(profile)?;
    state_update(world, idx, transition, ctx.epoch)
}

fn update_agent(
    world: &mut World,
    idx: AgentIdx,
    ctx: &EpochContext<'_>,
    rng: &mut StdRng,
    emit: &mut dyn FnMut(Event),
) {
    let Some(agent) = world.agents.get_mut(idx.0) else {
        return;
    };
    agent.settle();

    let update = if agent.state() == HealthState::Susceptible {
        if is_exposed(world, idx, ctx, rng) {
            infect(world, idx, ctx, rng)
        } else {
            None
        }
    } else {
        world
            .agents
            .get_mut(idx.0)
            .and_then(|agent| agent.progress(ctx.epoch))
            .and_then(|transition| state_update(world, idx, transition, ctx.epoch))
    };
    if let Some(event) = update {
        emit(event);
    }

    let Some(destination) = choose_destination(world, idx, ctx, rng) else {
        return;
    };
    let Some(previous) = world.relocate(idx, destination) else {
        return;
    };
    let (Some(agent), Some(to), Some(from)) = (
        world.agent(idx),
        world.space(destination),
        world.space(previous),
    ) else {
        return;
    };
    emit(Event::AgentLocationUpdate(AgentLocationUpdatePayload {
        epoch: ctx.epoch,
        id: agent.id(),
        location_id: to.id(),
        previous_location_id: from.id(),
    }));
}

/// Run one Bernoulli trial per infectious co-occupant.
fn is_exposed(world: &World, idx: AgentIdx, ctx: &EpochContext<'_>, rng: &mut StdRng) -> bool {
    let Some(location) = world.agent(idx).map(crate::agent::Agent::location) else {
        return false;
    };
    let Some(space) = world.space(location) else {
        return false;
    };

    let infectious = space
        .occupants()
        .iter()
        .filter(|other| **other != idx)
        .filter_map(|other| world.agent(*other))
        .filter(|other| other.state() == HealthState::Infectious)
        .count();
    if infectious == 0 {
        return false;
    }

    let masked = world
        .jurisdiction(space.jurisdiction())
        .is_some_and(|j| j.policy().is_mask_mandate);
    let p = if masked {
        ctx.pathogen.transmission_rate * ctx.effects.mask_transmission_factor
    } else {
        ctx.pathogen.transmission_rate
    };

    (0..infectious).any(|_| bernoulli(rng, p))
}

/// Decide where, if anywhere, the agent goes this epoch.
///
/// Agents away from home return home; agents at home go to the office or
/// one of their social or healthcare affiliations by configured weight.
fn choose_destination(
    world: &World,
    idx: AgentIdx,
    ctx: &EpochContext<'_>,
    rng: &mut StdRng,
) -> Option<SpaceIdx> {
    let agent = world.agent(idx)?;

    let lockdown = world
        .space_jurisdiction(agent.household())
        .is_some_and(|j| j.policy().is_lockdown);
    let p = if lockdown {
        ctx.mobility.move_probability * ctx.effects.lockdown_mobility_factor
    } else {
        ctx.mobility.move_probability
    };
    if !bernoulli(rng, p) {
        return None;
    }

    if agent.location() != agent.household() {
        return Some(agent.household());
    }

    let mobility = ctx.mobility;
    let office = [agent.office()];
    let options: [(f64, &[SpaceIdx]); 3] = [
        (mobility.office_weight, &office),
        (mobility.social_weight, agent.social_spaces()),
        (mobility.healthcare_weight, agent.healthcare_spaces()),
    ];
    let total: f64 = options
        .iter()
        .filter(|(_, spaces)| !spaces.is_empty())
        .map(|(weight, _)| weight)
        .sum();
    if total <= 0.0 {
        return None;
    }

    let mut roll = rng.random::<f64>() * total;
    for (weight, spaces) in options {
        if spaces.is_empty() || weight <= 0.0 {
            continue;
        }
        if roll < weight {
            return sample_index(rng, spaces.len()).and_then(|i| spaces.get(i).copied());
        }
        roll -= weight;
    }
    None
}

fn update_space(world: &mut World, idx: SpaceIdx, epoch: u64, emit: &mut dyn FnMut(Event)) {
    let Some(space) = world.spaces.get(idx.0) else {
        return;
    };

    let occupants: Vec<(AgentIdx, Occupant)> = space
        .occupants()
        .iter()
        .filter_map(|a| {
            world.agents.get(a.0).map(|agent| {
                (
                    *a,
                    Occupant {
                        id: agent.id(),
                        state: agent.state(),
                    },
                )
            })
        })
        .collect();

    emit(Event::SpaceOccupancyUpdate(SpaceOccupancyUpdatePayload {
        epoch,
        id: space.id(),
        occupants: occupants.iter().map(|(_, occupant)| *occupant).collect(),
    }));

    if space.kind() != SpaceKind::Healthcare {
        return;
    }
    if let Some(event) = run_tests(world, idx, &occupants, epoch) {
        emit(event);
    }
}

/// Queue visitors per the jurisdiction's strategy and test up to the
/// epoch's capacity from the front of the backlog.
fn run_tests(
    world: &mut World,
    idx: SpaceIdx,
    occupants: &[(AgentIdx, Occupant)],
    epoch: u64,
) -> Option<Event> {
    let jurisdiction = world.space_jurisdiction(idx)?;
    let policy = jurisdiction.policy();
    let strategy = policy.test_strategy;
    let multiplier = policy.test_capacity_multiplier;
    let jurisdiction_id = jurisdiction.id().clone();

    let space = world.spaces.get_mut(idx.0)?;
    let capacity = testing_capacity(space.capacity(), multiplier);
    let queue = space.testing_mut()?;

    for (agent, occupant) in occupants {
        if strategy.queues(occupant.state) {
            queue.enqueue(*agent);
        }
    }
    let tested = queue.take(capacity);
    let backlog = u64::try_from(queue.len()).unwrap_or(u64::MAX);

    let mut positives: u64 = 0;
    let mut negatives: u64 = 0;
    for agent in tested {
        let Some(state) = world.agents.get(agent.0).map(crate::agent::Agent::state) else {
            continue;
        };
        if state.tests_positive() {
            positives = positives.saturating_add(1);
        } else {
            negatives = negatives.saturating_add(1);
        }
    }

    Some(Event::SpaceTestingUpdate(SpaceTestingUpdatePayload {
        epoch,
        positives,
        negatives,
        backlog,
        capacity,
        jurisdiction: jurisdiction_id,
    }))
}

fn state_update(
    world: &World,
    idx: AgentIdx,
    transition: Transition,
    epoch: u64,
) -> Option<Event> {
    let agent = world.agent(idx)?;
    let jurisdiction = world
        .space_jurisdiction(agent.household())
        .map(|j| j.id().clone())
        .unwrap_or_default();
    Some(Event::AgentStateUpdate(AgentStateUpdatePayload {
        epoch,
        id: agent.id(),
        state: transition.state,
        previous_state: transition.previous,
        has_infection_profile: agent.has_infection_profile(),
        jurisdiction,
    }))
}
