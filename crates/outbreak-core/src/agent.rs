//! Agents and their health state machine.
//!
//! An agent's health follows the cycle
//! `Susceptible -> Infected -> Infectious -> Immune -> Susceptible`. The
//! moment of each scheduled transition is fixed when the agent is infected
//! and stored in its private [`InfectionProfile`].

use outbreak_types::{AgentId, HealthState};
use rand::Rng;

use crate::config::{Pathogen, Period};
use crate::sampling::sample_normal;
use crate::space::SpaceIdx;

/// Dense handle of an agent inside a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AgentIdx(pub usize);

/// When an infected agent moves through the rest of the cycle.
///
/// All values are absolute epochs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfectionProfile {
    infected_at: u64,
    infectious_at: u64,
    immune_at: u64,
    susceptible_at: u64,
}

impl InfectionProfile {
    /// Schedule the transitions of an infection starting at `epoch`.
    ///
    /// Each period is drawn from the pathogen's distribution and rounded up
    /// to whole epochs, never shorter than one.
    pub fn sample<R: Rng + ?Sized>(
        rng: &mut R,
        pathogen: &Pathogen,
        epoch: u64,
        time_step: u64,
    ) -> Self {
        let incubation = period_epochs(rng, pathogen.incubation_period, time_step);
        let infectious = period_epochs(rng, pathogen.infectious_period, time_step);
        let immunity = period_epochs(rng, pathogen.immunity_period, time_step);

        let infectious_at = epoch.saturating_add(incubation);
        let immune_at = infectious_at.saturating_add(infectious);
        Self {
            infected_at: epoch,
            infectious_at,
            immune_at,
            susceptible_at: immune_at.saturating_add(immunity),
        }
    }

    /// Epoch of infection.
    pub const fn infected_at(&self) -> u64 {
        self.infected_at
    }

    /// Epoch at which an agent in `state` leaves it, if scheduled.
    pub const fn transition_epoch(&self, state: HealthState) -> Option<u64> {
        match state {
            HealthState::Susceptible => None,
            HealthState::Infected => Some(self.infectious_at),
            HealthState::Infectious => Some(self.immune_at),
            HealthState::Immune => Some(self.susceptible_at),
        }
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn period_epochs<R: Rng + ?Sized>(rng: &mut R, period: Period, time_step: u64) -> u64 {
    let ms = sample_normal(rng, period.mean_ms as f64, period.std_dev_ms as f64);
    let epochs = (ms / time_step.max(1) as f64).ceil();
    if epochs.is_finite() && epochs >= 1.0 {
        epochs as u64
    } else {
        1
    }
}

/// A health transition that just happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// State before.
    pub previous: HealthState,
    /// State after.
    pub state: HealthState,
}

/// A member of the synthetic population.
#[derive(Debug, Clone)]
pub struct Agent {
    id: AgentId,
    state: HealthState,
    previous_state: HealthState,
    profile: Option<InfectionProfile>,
    household: SpaceIdx,
    office: SpaceIdx,
    social_spaces: Vec<SpaceIdx>,
    healthcare_spaces: Vec<SpaceIdx>,
    location: SpaceIdx,
}

impl Agent {
    /// Create a susceptible agent at home.
    pub fn new(
        household: SpaceIdx,
        office: SpaceIdx,
        social_spaces: Vec<SpaceIdx>,
        healthcare_spaces: Vec<SpaceIdx>,
    ) -> Self {
        Self {
            id: AgentId::new(),
            state: HealthState::Susceptible,
            previous_state: HealthState::Susceptible,
            profile: None,
            household,
            office,
            social_spaces,
            healthcare_spaces,
            location: household,
        }
    }

    /// External identifier.
    pub const fn id(&self) -> AgentId {
        self.id
    }

    /// Current health state.
    pub const fn state(&self) -> HealthState {
        self.state
    }

    /// Health state at the start of the current epoch. Equal to
    /// [`state`](Self::state) unless the agent transitioned this epoch.
    pub const fn previous_state(&self) -> HealthState {
        self.previous_state
    }

    /// Whether an infection profile is attached.
    pub const fn has_infection_profile(&self) -> bool {
        self.profile.is_some()
    }

    /// The agent's infection profile, present while not susceptible.
    pub const fn infection_profile(&self) -> Option<&InfectionProfile> {
        self.profile.as_ref()
    }

    /// Home.
    pub const fn household(&self) -> SpaceIdx {
        self.household
    }

    /// Workplace.
    pub const fn office(&self) -> SpaceIdx {
        self.office
    }

    /// Recurring social venues.
    pub fn social_spaces(&self) -> &[SpaceIdx] {
        &self.social_spaces
    }

    /// Recurring healthcare facilities.
    pub fn healthcare_spaces(&self) -> &[SpaceIdx] {
        &self.healthcare_spaces
    }

    /// Where the agent is now.
    pub const fn location(&self) -> SpaceIdx {
        self.location
    }

    pub(crate) fn set_location(&mut self, location: SpaceIdx) {
        self.location = location;
    }

    /// Infect a susceptible agent with the given profile.
    ///
    /// Returns `None` and leaves the agent untouched unless it is
    /// susceptible.
    pub fn infect(&mut self, profile: InfectionProfile) -> Option<Transition> {
        if self.state != HealthState::Susceptible {
            return None;
        }
        self.profile = Some(profile);
        Some(self.transition_to(HealthState::Infected))
    }

    /// Move to the next state if the profile says its time has come.
    pub fn progress(&mut self, epoch: u64) -> Option<Transition> {
        let due = self.profile?.transition_epoch(self.state)?;
        if epoch < due {
            return None;
        }
        let next = self.state.next();
        if next == HealthState::Susceptible {
            self.profile = None;
        }
        Some(self.transition_to(next))
    }

    /// Start a new epoch: the previous state catches up with the current one.
    pub(crate) const fn settle(&mut self) {
        self.previous_state = self.state;
    }

    fn transition_to(&mut self, state: HealthState) -> Transition {
        self.previous_state = self.state;
        self.state = state;
        Transition {
            previous: self.previous_state,
            state,
        }
    }
}
