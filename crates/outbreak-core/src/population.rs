//! Synthetic population generation.
//!
//! Spaces of each kind are created by greedy bin-packing: capacities are
//! drawn from a per-kind normal distribution, floored, clamped to at least 1
//! and to the remaining demand, until the demand is exhausted. Every new
//! space gets a jurisdiction from the [`GeoSampler`].
//!
//! Agents are then laid into households and offices round-robin, filling
//! each space to capacity before moving on, and given a random set of
//! recurring social and healthcare affiliations.

use outbreak_types::SpaceKind;
use rand::rngs::StdRng;
use tracing::{debug, info};

use crate::agent::{Agent, AgentIdx};
use crate::geo::GeoSampler;
use crate::jurisdiction::Jurisdiction;
use crate::sampling::{sample_count, sample_index};
use crate::space::{Space, SpaceIdx};
use crate::world::World;

/// Mean and standard deviation of the number of recurring social or
/// healthcare affiliations per agent.
const AFFILIATIONS: (f64, f64) = (5.0, 4.0);

/// Errors that make a population impossible to build.
#[derive(Debug, thiserror::Error)]
pub enum PopulationError {
    /// The population must contain at least one agent.
    #[error("population must contain at least one agent")]
    NoAgents,

    /// No jurisdictions were supplied.
    #[error("at least one jurisdiction is required")]
    NoJurisdictions,

    /// The jurisdiction weights cannot be sampled.
    #[error("invalid jurisdiction weights: {reason}")]
    InvalidWeights {
        /// Why the weights were rejected.
        reason: String,
    },

    /// The geo sampler returned no usable jurisdiction.
    #[error("geo sampler returned no jurisdiction")]
    NoJurisdictionSampled,

    /// A kind of space ended up with no spaces for a positive population.
    #[error("no {kind} spaces for {agents} agents")]
    NoSpaces {
        /// The empty kind.
        kind: SpaceKind,
        /// Population size.
        agents: u64,
    },

    /// Round-robin allocation ran past the last space of a kind.
    #[error("{kind} capacity exhausted while allocating agent {agent}")]
    CapacityExhausted {
        /// The kind being allocated.
        kind: SpaceKind,
        /// Index of the agent that found no room.
        agent: usize,
    },
}

/// Total capacity to create for one kind of space.
pub const fn space_demand(kind: SpaceKind, total_agents: u64) -> u64 {
    match kind {
        SpaceKind::Household | SpaceKind::Office => total_agents,
        SpaceKind::Social => total_agents / 100,
        SpaceKind::Healthcare => (total_agents / 1000).saturating_mul(5),
    }
}

/// Mean and standard deviation of a space's capacity.
pub const fn capacity_distribution(kind: SpaceKind) -> (f64, f64) {
    match kind {
        SpaceKind::Household => (4.0, 1.0),
        SpaceKind::Office | SpaceKind::Social => (10.0, 2.0),
        SpaceKind::Healthcare => (173.0, 25.0),
    }
}

/// Build the full entity graph for `total_agents` agents.
///
/// # Errors
///
/// Returns a [`PopulationError`] when the inputs cannot produce a complete
/// population: no agents, no jurisdictions, a geo sampler that yields
/// nothing, or a space kind with no spaces (fewer than 100 agents leaves no
/// social spaces, fewer than 1000 no healthcare spaces).
pub fn generate(
    total_agents: u64,
    jurisdictions: Vec<Jurisdiction>,
    geo: &mut dyn GeoSampler,
    rng: &mut StdRng,
) -> Result<World, PopulationError> {
    if total_agents == 0 {
        return Err(PopulationError::NoAgents);
    }
    if jurisdictions.is_empty() {
        return Err(PopulationError::NoJurisdictions);
    }

    let mut world = World {
        agents: Vec::new(),
        spaces: Vec::new(),
        jurisdictions,
    };

    let mut by_kind: Vec<(SpaceKind, Vec<SpaceIdx>)> = Vec::new();
    for kind in SpaceKind::UPDATE_ORDER {
        let demand = space_demand(kind, total_agents);
        let created = create_spaces(&mut world, kind, demand, geo, rng)?;
        if created.is_empty() {
            return Err(PopulationError::NoSpaces {
                kind,
                agents: total_agents,
            });
        }
        debug!(%kind, spaces = created.len(), capacity = demand, "Spaces created");
        by_kind.push((kind, created));
    }

    let count = usize::try_from(total_agents).unwrap_or(usize::MAX);
    let households = allocate_round_robin(
        &world.spaces,
        members_of(&by_kind, SpaceKind::Household),
        count,
    )?;
    let offices =
        allocate_round_robin(&world.spaces, members_of(&by_kind, SpaceKind::Office), count)?;

    let social = members_of(&by_kind, SpaceKind::Social);
    let healthcare = members_of(&by_kind, SpaceKind::Healthcare);

    let mut agents = Vec::with_capacity(count);
    for (household, office) in households.into_iter().zip(offices) {
        let social_spaces = sample_affiliations(rng, social);
        let healthcare_spaces = sample_affiliations(rng, healthcare);
        agents.push(Agent::new(household, office, social_spaces, healthcare_spaces));
    }

    for (idx, agent) in agents.iter().enumerate() {
        if let Some(home) = world.spaces.get_mut(agent.household().0) {
            home.enter(AgentIdx(idx));
        }
    }
    world.agents = agents;

    info!(
        agents = world.agents.len(),
        spaces = world.spaces.len(),
        jurisdictions = world.jurisdictions.len(),
        "Population generated"
    );
    Ok(world)
}

/// Create spaces of one kind until their capacities sum to `demand`.
///
/// Returns the handles of the new spaces, appended to the world's arena.
///
/// # Errors
///
/// Returns [`PopulationError::NoJurisdictionSampled`] if the geo sampler
/// yields nothing.
pub fn create_spaces(
    world: &mut World,
    kind: SpaceKind,
    demand: u64,
    geo: &mut dyn GeoSampler,
    rng: &mut StdRng,
) -> Result<Vec<SpaceIdx>, PopulationError> {
    let (mean, std_dev) = capacity_distribution(kind);
    let mut created = Vec::new();
    let mut remaining = demand;

    while remaining > 0 {
        let capacity = sample_count(rng, mean, std_dev).min(remaining);
        let jurisdiction = geo
            .sample(&world.jurisdictions, rng)
            .ok_or(PopulationError::NoJurisdictionSampled)?;

        created.push(SpaceIdx(world.spaces.len()));
        world.spaces.push(Space::new(kind, capacity, jurisdiction));

        remaining = remaining.saturating_sub(capacity);
    }

    Ok(created)
}

/// Assign `count` agents to `members` in order, filling each space to its
/// capacity before moving to the next.
///
/// Returns the space of each agent by agent index.
///
/// # Errors
///
/// Returns [`PopulationError::CapacityExhausted`] if the spaces hold fewer
/// than `count` agents.
pub fn allocate_round_robin(
    spaces: &[Space],
    members: &[SpaceIdx],
    count: usize,
) -> Result<Vec<SpaceIdx>, PopulationError> {
    let mut assignments = Vec::with_capacity(count);
    let mut cursor = members.iter().filter_map(|idx| {
        spaces
            .get(idx.0)
            .map(|space| (*idx, space.kind(), space.capacity()))
    });

    let mut current = cursor.next();
    let mut allocated: u64 = 0;
    let kind = current.map_or(SpaceKind::Household, |(_, kind, _)| kind);

    for agent in 0..count {
        let Some((idx, _, capacity)) = current else {
            return Err(PopulationError::CapacityExhausted { kind, agent });
        };
        assignments.push(idx);
        allocated = allocated.saturating_add(1);
        if allocated >= capacity {
            current = cursor.next();
            allocated = 0;
        }
    }

    Ok(assignments)
}

fn members_of(by_kind: &[(SpaceKind, Vec<SpaceIdx>)], kind: SpaceKind) -> &[SpaceIdx] {
    by_kind
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, spaces)| spaces.as_slice())
        .unwrap_or_default()
}

fn sample_affiliations(rng: &mut StdRng, spaces: &[SpaceIdx]) -> Vec<SpaceIdx> {
    let (mean, std_dev) = AFFILIATIONS;
    let count = sample_count(rng, mean, std_dev);
    (0..count)
        .filter_map(|_| sample_index(rng, spaces.len()).and_then(|i| spaces.get(i).copied()))
        .collect()
}
