//! The entity graph: dense arenas of agents, spaces and jurisdictions.
//!
//! Relationships are handle fields ([`AgentIdx`], [`SpaceIdx`],
//! [`JurisdictionIdx`]) into these arenas rather than references, so the
//! graph has a single owner: the simulation kernel.

use outbreak_types::{HealthState, JurisdictionId, SpaceKind};

use crate::agent::{Agent, AgentIdx};
use crate::jurisdiction::{Jurisdiction, JurisdictionIdx};
use crate::space::{Space, SpaceIdx};

/// Agents, spaces and jurisdictions of one simulation.
///
/// Spaces are stored in update order: all households, then offices, social
/// spaces and healthcare spaces.
#[derive(Debug, Clone, Default)]
pub struct World {
    pub(crate) agents: Vec<Agent>,
    pub(crate) spaces: Vec<Space>,
    pub(crate) jurisdictions: Vec<Jurisdiction>,
}

/// Number of agents in each health state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealthCensus {
    /// Susceptible agents.
    pub susceptible: u64,
    /// Infected (incubating) agents.
    pub infected: u64,
    /// Infectious agents.
    pub infectious: u64,
    /// Immune agents.
    pub immune: u64,
}

impl HealthCensus {
    /// Sum over all states.
    pub const fn total(&self) -> u64 {
        self.susceptible
            .saturating_add(self.infected)
            .saturating_add(self.infectious)
            .saturating_add(self.immune)
    }

    /// Count for one state.
    pub const fn count(&self, state: HealthState) -> u64 {
        match state {
            HealthState::Susceptible => self.susceptible,
            HealthState::Infected => self.infected,
            HealthState::Infectious => self.infectious,
            HealthState::Immune => self.immune,
        }
    }
}

impl World {
    /// All agents.
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// All spaces, in update order.
    pub fn spaces(&self) -> &[Space] {
        &self.spaces
    }

    /// All jurisdictions.
    pub fn jurisdictions(&self) -> &[Jurisdiction] {
        &self.jurisdictions
    }

    /// Look up an agent.
    pub fn agent(&self, idx: AgentIdx) -> Option<&Agent> {
        self.agents.get(idx.0)
    }

    /// Look up a space.
    pub fn space(&self, idx: SpaceIdx) -> Option<&Space> {
        self.spaces.get(idx.0)
    }

    /// Look up a jurisdiction.
    pub fn jurisdiction(&self, idx: JurisdictionIdx) -> Option<&Jurisdiction> {
        self.jurisdictions.get(idx.0)
    }

    /// Find a jurisdiction by area code.
    pub fn find_jurisdiction(&self, id: &JurisdictionId) -> Option<JurisdictionIdx> {
        self.jurisdictions
            .iter()
            .position(|j| j.id() == id)
            .map(JurisdictionIdx)
    }

    /// Jurisdiction of a space, following its handle.
    pub fn space_jurisdiction(&self, idx: SpaceIdx) -> Option<&Jurisdiction> {
        self.space(idx)
            .and_then(|space| self.jurisdiction(space.jurisdiction()))
    }

    /// Handles of every space of one kind.
    pub fn spaces_of_kind(&self, kind: SpaceKind) -> impl Iterator<Item = SpaceIdx> + '_ {
        self.spaces
            .iter()
            .enumerate()
            .filter(move |(_, space)| space.kind() == kind)
            .map(|(idx, _)| SpaceIdx(idx))
    }

    /// Count agents per health state.
    pub fn census(&self) -> HealthCensus {
        let mut census = HealthCensus::default();
        for agent in &self.agents {
            let slot = match agent.state() {
                HealthState::Susceptible => &mut census.susceptible,
                HealthState::Infected => &mut census.infected,
                HealthState::Infectious => &mut census.infectious,
                HealthState::Immune => &mut census.immune,
            };
            *slot = slot.saturating_add(1);
        }
        census
    }

    /// Move an agent between spaces, keeping occupant sets consistent.
    ///
    /// Returns the previous location, or `None` if the agent does not exist
    /// or is already there.
    pub(crate) fn relocate(&mut self, agent: AgentIdx, to: SpaceIdx) -> Option<SpaceIdx> {
        let from = self.agents.get(agent.0)?.location();
        if from == to || self.spaces.get(to.0).is_none() {
            return None;
        }
        if let Some(space) = self.spaces.get_mut(from.0) {
            space.leave(agent);
        }
        if let Some(space) = self.spaces.get_mut(to.0) {
            space.enter(agent);
        }
        if let Some(a) = self.agents.get_mut(agent.0) {
            a.set_location(to);
        }
        Some(from)
    }
}
