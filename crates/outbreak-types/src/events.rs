//! Domain events emitted by the simulation kernel.
//!
//! Every event serializes as `{"type": ..., "payload": ...}`. Payloads are
//! owned snapshots taken at emission time; they never reference live
//! simulation state. Fields marked `#[serde(skip)]` exist only for
//! in-process routing (per-jurisdiction aggregation) and are not part of
//! the external payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::command::{Command, Policy};
use crate::enums::{HealthState, TestStrategy};
use crate::ids::{AgentId, JurisdictionId, SimulationId, SpaceId};

/// A typed simulation event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Event {
    /// The simulation has been built and is starting.
    SimulationInitialized(SimulationInitializedPayload),
    /// An epoch finished; all agent and space updates for it are emitted.
    EpochEnd(EpochEndPayload),
    /// A control command was consumed by the loop.
    CommandProcessed(CommandProcessedPayload),
    /// An agent moved to the next health state.
    AgentStateUpdate(AgentStateUpdatePayload),
    /// An agent changed location.
    AgentLocationUpdate(AgentLocationUpdatePayload),
    /// Occupancy snapshot of one space.
    SpaceOccupancyUpdate(SpaceOccupancyUpdatePayload),
    /// Testing activity of one healthcare space.
    SpaceTestingUpdate(SpaceTestingUpdatePayload),
    /// A jurisdiction's policy was replaced.
    PolicyUpdate(PolicyUpdatePayload),
}

impl Event {
    /// Wire name of the event type.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::SimulationInitialized(_) => "simulation_initialized",
            Self::EpochEnd(_) => "epoch_end",
            Self::CommandProcessed(_) => "command_processed",
            Self::AgentStateUpdate(_) => "agent_state_update",
            Self::AgentLocationUpdate(_) => "agent_location_update",
            Self::SpaceOccupancyUpdate(_) => "space_occupancy_update",
            Self::SpaceTestingUpdate(_) => "space_testing_update",
            Self::PolicyUpdate(_) => "policy_update",
        }
    }
}

/// Summary of a freshly built simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SimulationInitializedPayload {
    /// Simulation run identifier.
    pub id: SimulationId,
    /// Number of agents.
    pub num_agents: u64,
    /// Number of spaces of all kinds.
    pub num_spaces: u64,
    /// Number of jurisdictions.
    pub num_jurisdictions: u64,
    /// Simulated milliseconds per epoch.
    pub time_step: u64,
    /// Simulated time at epoch 0.
    pub start_time: DateTime<Utc>,
}

/// Payload of [`Event::EpochEnd`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EpochEndPayload {
    /// The epoch that just finished.
    pub epoch: u64,
    /// Simulated milliseconds per epoch.
    pub time_step: u64,
    /// Simulated time at the end of the epoch.
    pub time: DateTime<Utc>,
}

/// Payload of [`Event::CommandProcessed`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CommandProcessedPayload {
    /// Epoch counter at the time the command was processed.
    pub epoch: u64,
    /// The command exactly as received.
    pub command: Command,
}

/// Payload of [`Event::AgentStateUpdate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AgentStateUpdatePayload {
    /// Epoch of the transition.
    pub epoch: u64,
    /// The agent.
    pub id: AgentId,
    /// New health state.
    pub state: HealthState,
    /// Health state before the transition.
    pub previous_state: HealthState,
    /// Whether the agent carries an infection profile after the transition.
    pub has_infection_profile: bool,
    /// Jurisdiction of the agent's household, for aggregation routing only.
    #[serde(skip)]
    #[ts(skip)]
    pub jurisdiction: JurisdictionId,
}

/// Payload of [`Event::AgentLocationUpdate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AgentLocationUpdatePayload {
    /// Epoch of the move.
    pub epoch: u64,
    /// The agent.
    pub id: AgentId,
    /// Space the agent moved into.
    pub location_id: SpaceId,
    /// Space the agent left.
    pub previous_location_id: SpaceId,
}

/// One occupant in a [`SpaceOccupancyUpdatePayload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Occupant {
    /// The agent.
    pub id: AgentId,
    /// The agent's health state at snapshot time.
    pub state: HealthState,
}

/// Payload of [`Event::SpaceOccupancyUpdate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SpaceOccupancyUpdatePayload {
    /// Epoch of the snapshot.
    pub epoch: u64,
    /// The space.
    pub id: SpaceId,
    /// Agents present in the space.
    pub occupants: Vec<Occupant>,
}

/// Payload of [`Event::SpaceTestingUpdate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SpaceTestingUpdatePayload {
    /// Epoch of the testing round.
    pub epoch: u64,
    /// Tests that came back positive.
    pub positives: u64,
    /// Tests that came back negative.
    pub negatives: u64,
    /// Agents still waiting for a test after this round.
    pub backlog: u64,
    /// Tests the space could process this epoch.
    pub capacity: u64,
    /// Jurisdiction of the healthcare space, for aggregation routing only.
    #[serde(skip)]
    #[ts(skip)]
    pub jurisdiction: JurisdictionId,
}

/// Payload of [`Event::PolicyUpdate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PolicyUpdatePayload {
    /// The jurisdiction whose policy changed.
    pub jurisdiction_id: JurisdictionId,
    /// Mask mandate in force.
    pub is_mask_mandate: bool,
    /// Lockdown in force.
    pub is_lockdown: bool,
    /// Testing strategy in force.
    pub test_strategy: TestStrategy,
    /// Testing capacity multiplier in force.
    pub test_capacity_multiplier: f64,
}

impl PolicyUpdatePayload {
    /// Build the payload for `policy` now in force in `jurisdiction_id`.
    pub fn new(jurisdiction_id: JurisdictionId, policy: &Policy) -> Self {
        Self {
            jurisdiction_id,
            is_mask_mandate: policy.is_mask_mandate,
            is_lockdown: policy.is_lockdown,
            test_strategy: policy.test_strategy,
            test_capacity_multiplier: policy.test_capacity_multiplier,
        }
    }
}
