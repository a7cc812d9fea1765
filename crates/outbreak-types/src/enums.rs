//! Enumeration types for the Outbreak simulation.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

/// Health state of an agent.
///
/// States form a single cycle:
/// `Susceptible -> Infected -> Infectious -> Immune -> Susceptible`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum HealthState {
    /// Can be infected by an infectious co-occupant.
    #[default]
    Susceptible,
    /// Infected but still incubating; not yet transmitting.
    Infected,
    /// Transmitting to susceptible co-occupants.
    Infectious,
    /// Recovered and temporarily protected.
    Immune,
}

impl HealthState {
    /// All health states in cycle order.
    pub const ALL: [Self; 4] = [
        Self::Susceptible,
        Self::Infected,
        Self::Infectious,
        Self::Immune,
    ];

    /// The state that follows this one in the cycle.
    pub const fn next(self) -> Self {
        match self {
            Self::Susceptible => Self::Infected,
            Self::Infected => Self::Infectious,
            Self::Infectious => Self::Immune,
            Self::Immune => Self::Susceptible,
        }
    }

    /// Whether a test taken in this state comes back positive.
    pub const fn tests_positive(self) -> bool {
        matches!(self, Self::Infected | Self::Infectious)
    }
}

// ---------------------------------------------------------------------------
// Spaces
// ---------------------------------------------------------------------------

/// The kind of a space.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum SpaceKind {
    /// A home. Every agent belongs to exactly one.
    Household,
    /// A workplace. Every agent belongs to exactly one.
    Office,
    /// A social venue visited recurrently.
    Social,
    /// A healthcare facility that also runs tests.
    Healthcare,
}

impl SpaceKind {
    /// Update order of space kinds within one epoch.
    pub const UPDATE_ORDER: [Self; 4] = [
        Self::Household,
        Self::Office,
        Self::Social,
        Self::Healthcare,
    ];
}

impl core::fmt::Display for SpaceKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Household => "household",
            Self::Office => "office",
            Self::Social => "social",
            Self::Healthcare => "healthcare",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Who a jurisdiction's healthcare spaces test.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum TestStrategy {
    /// No testing.
    None,
    /// Only visitors showing symptoms (infectious agents) are queued.
    #[default]
    Symptomatic,
    /// Every visitor is queued.
    Everyone,
}

impl TestStrategy {
    /// Whether a visitor in the given health state joins the testing queue.
    pub const fn queues(self, state: HealthState) -> bool {
        match self {
            Self::None => false,
            Self::Symptomatic => matches!(state, HealthState::Infectious),
            Self::Everyone => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_cycle_returns_to_start() {
        let mut state = HealthState::Susceptible;
        for expected in [
            HealthState::Infected,
            HealthState::Infectious,
            HealthState::Immune,
            HealthState::Susceptible,
        ] {
            state = state.next();
            assert_eq!(state, expected);
        }
    }

    #[test]
    fn only_infected_states_test_positive() {
        assert!(!HealthState::Susceptible.tests_positive());
        assert!(HealthState::Infected.tests_positive());
        assert!(HealthState::Infectious.tests_positive());
        assert!(!HealthState::Immune.tests_positive());
    }

    #[test]
    fn strategy_queueing() {
        assert!(!TestStrategy::None.queues(HealthState::Infectious));
        assert!(TestStrategy::Symptomatic.queues(HealthState::Infectious));
        assert!(!TestStrategy::Symptomatic.queues(HealthState::Infected));
        assert!(TestStrategy::Everyone.queues(HealthState::Susceptible));
    }

    #[test]
    fn health_state_wire_names() {
        let json = serde_json::to_string(&HealthState::Infectious).ok();
        assert_eq!(json.as_deref(), Some("\"infectious\""));
    }
}
