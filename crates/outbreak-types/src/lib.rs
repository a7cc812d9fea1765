//! Shared type definitions for the Outbreak epidemic simulation.
//!
//! This crate holds the data that crosses the boundary of the simulation
//! kernel: identifiers, control commands, domain events and the metrics
//! snapshot. It contains no simulation logic. Types are exported to
//! `TypeScript` via `ts-rs` for dashboard consumers.
//!
//! # Modules
//!
//! - [`ids`] -- Identifier wrappers for simulations, agents, spaces and
//!   jurisdictions
//! - [`enums`] -- Health state, space kind and testing strategy
//! - [`command`] -- Control commands and jurisdiction policy
//! - [`events`] -- The event vocabulary emitted by the kernel
//! - [`metrics`] -- Daily epidemic counters

pub mod command;
pub mod enums;
pub mod events;
pub mod ids;
pub mod metrics;

pub use command::{ApplyJurisdictionPolicyPayload, Command, CommandType, Policy};
pub use enums::{HealthState, SpaceKind, TestStrategy};
pub use events::{
    AgentLocationUpdatePayload, AgentStateUpdatePayload, CommandProcessedPayload,
    EpochEndPayload, Event, Occupant, PolicyUpdatePayload, SimulationInitializedPayload,
    SpaceOccupancyUpdatePayload, SpaceTestingUpdatePayload,
};
pub use ids::{AgentId, JurisdictionId, SimulationId, SpaceId};
pub use metrics::Metrics;
