//! Population, epoch state machine and command loop for the Outbreak
//! epidemic simulation.
//!
//! A [`Simulation`] owns a generated [`World`] of agents, spaces and
//! jurisdictions stored in dense arenas and linked by index handles. Its
//! loop advances the SEIRS state machine one epoch at a time, publishes
//! every change on an [`EventBus`], and accepts control commands between
//! epochs.
//!
//! # Modules
//!
//! - [`config`] -- YAML configuration with defaults and validation.
//! - [`sampling`] -- Normal, uniform and Bernoulli draws over a seeded RNG.
//! - [`agent`] -- Agents, infection profiles and health transitions.
//! - [`space`] -- Spaces, occupancy and healthcare testing queues.
//! - [`jurisdiction`] -- Policy-bearing geographic groupings.
//! - [`world`] -- The entity arenas and the health census.
//! - [`geo`] -- [`GeoSampler`] trait and its weighted default.
//! - [`population`] -- Synthetic population generation.
//! - [`epoch`] -- The per-epoch agent and space update.
//! - [`bus`] -- Asynchronous in-process publish/subscribe.
//! - [`kernel`] -- [`Simulation`] and its command loop.
//! - [`metrics`] -- Daily metrics aggregation from the event stream.

pub mod agent;
pub mod bus;
pub mod config;
pub mod epoch;
pub mod geo;
pub mod jurisdiction;
pub mod kernel;
pub mod metrics;
pub mod population;
pub mod sampling;
pub mod space;
pub mod world;

pub use agent::{Agent, AgentIdx, InfectionProfile, Transition};
pub use bus::{BusError, EventBus, Subscriber};
pub use config::{ConfigError, DAY_MS, SimulationConfig};
pub use geo::{GeoSampler, WeightedGeoSampler};
pub use jurisdiction::{Jurisdiction, JurisdictionIdx};
pub use kernel::{CommandSender, EndReason, KernelError, Simulation, SimulationResult};
pub use metrics::{DailyMetrics, LogMetricsSink, MetricsAggregator, MetricsSink};
pub use population::PopulationError;
pub use space::{Space, SpaceIdx, TestingQueue};
pub use world::{HealthCensus, World};
