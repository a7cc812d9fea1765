//! The simulation kernel: command intake and the epoch loop.
//!
//! [`Simulation::start`] drives the loop. Each iteration either consumes
//! exactly one pending command or, when none is waiting and the run is not
//! paused, advances exactly one epoch. Commands arrive through a
//! single-slot channel, so a [`CommandSender`] waits until the kernel has
//! taken the previous command. While paused the loop parks on the command
//! channel instead of spinning.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use outbreak_types::{
    Command, CommandProcessedPayload, CommandType, EpochEndPayload, Event, SimulationId,
    SimulationInitializedPayload,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, info, warn};

use crate::agent::AgentIdx;
use crate::bus::{BusError, EventBus};
use crate::config::{ConfigError, SimulationConfig};
use crate::epoch::{self, EpochContext};
use crate::geo::{GeoSampler, WeightedGeoSampler};
use crate::jurisdiction::Jurisdiction;
use crate::population::{self, PopulationError};
use crate::sampling::sample_index;
use crate::world::{HealthCensus, World};

/// Errors that can occur while building or running a simulation.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    /// The configuration describes an impossible run.
    #[error("configuration error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// The population could not be generated.
    #[error("population error: {source}")]
    Population {
        /// The underlying population error.
        #[from]
        source: PopulationError,
    },

    /// The event bus failed to start, or its delivery thread died.
    #[error("event bus error: {source}")]
    Bus {
        /// The underlying bus error.
        #[from]
        source: BusError,
    },

    /// [`Simulation::start`] was called on a run that already ran.
    #[error("simulation {id} has already been started")]
    AlreadyStarted {
        /// The simulation that was started twice.
        id: SimulationId,
    },

    /// The simulation was dropped before the command was delivered.
    #[error("simulation is gone; command {command_type} was not delivered")]
    CommandChannelClosed {
        /// Type of the undelivered command.
        command_type: CommandType,
    },
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// A `Quit` command was processed.
    Quit,
    /// The configured `max_epochs` bound was reached.
    MaxEpochsReached,
}

/// Outcome of [`Simulation::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SimulationResult {
    /// The reason the loop ended.
    pub end_reason: EndReason,
    /// Epochs simulated.
    pub total_epochs: u64,
    /// Commands consumed, including no-ops.
    pub commands_processed: u64,
    /// Whether subscribers finished every event within the drain timeout.
    /// When `false` the remaining events are still being delivered in the
    /// background.
    pub drained: bool,
}

/// Handle for feeding commands into a running simulation.
#[derive(Debug, Clone)]
pub struct CommandSender {
    inner: mpsc::Sender<Command>,
}

impl CommandSender {
    /// Hand a command to the kernel.
    ///
    /// At most one command is in flight: this waits until the kernel has
    /// consumed the previous one.
    pub async fn send(&self, command: Command) -> Result<(), KernelError> {
        self.inner
            .send(command)
            .await
            .map_err(|rejected| KernelError::CommandChannelClosed {
                command_type: rejected.0.command_type,
            })
    }

    /// Blocking form of [`send`](Self::send) for threads outside the
    /// runtime.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context.
    pub fn blocking_send(&self, command: Command) -> Result<(), KernelError> {
        self.inner
            .blocking_send(command)
            .map_err(|rejected| KernelError::CommandChannelClosed {
                command_type: rejected.0.command_type,
            })
    }
}

/// A single simulation run: the world, its RNG, the event bus and the
/// command loop.
#[derive(Debug)]
pub struct Simulation {
    id: SimulationId,
    config: SimulationConfig,
    world: World,
    rng: StdRng,
    bus: EventBus,
    commands_tx: mpsc::Sender<Command>,
    commands_rx: mpsc::Receiver<Command>,
    start_time: DateTime<Utc>,
    epoch: u64,
    paused: bool,
    should_quit: bool,
    started: bool,
    commands_processed: u64,
}

impl Simulation {
    /// Build a simulation from configuration, sampling household locations
    /// by jurisdiction weight.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Config`] for an invalid configuration and
    /// [`KernelError::Population`] if the population cannot be generated.
    pub fn new(config: &SimulationConfig) -> Result<Self, KernelError> {
        config.validate()?;
        let mut geo = WeightedGeoSampler::new(&jurisdictions_from(config))?;
        Self::with_geo_sampler(config, &mut geo)
    }

    /// Build a simulation with a caller-provided geographic sampler.
    ///
    /// # Errors
    ///
    /// Same as [`Simulation::new`].
    pub fn with_geo_sampler(
        config: &SimulationConfig,
        geo: &mut dyn GeoSampler,
    ) -> Result<Self, KernelError> {
        config.validate()?;
        let run = &config.simulation;
        let mut rng = StdRng::seed_from_u64(run.seed);
        let world = population::generate(run.num_agents, jurisdictions_from(config), geo, &mut rng)?;

        let (commands_tx, commands_rx) = mpsc::channel(1);
        let bus = EventBus::new();
        bus.subscribe(|event| {
            if let Event::CommandProcessed(processed) = event {
                info!(
                    epoch = processed.epoch,
                    "processed command of type {}", processed.command.command_type
                );
            }
        });

        info!(
            simulation_id = %run.id,
            agents = world.agents().len(),
            spaces = world.spaces().len(),
            jurisdictions = world.jurisdictions().len(),
            seed = run.seed,
            "Simulation built"
        );

        Ok(Self {
            id: run.id,
            config: config.clone(),
            world,
            rng,
            bus,
            commands_tx,
            commands_rx,
            start_time: Utc::now(),
            epoch: 0,
            paused: false,
            should_quit: false,
            started: false,
            commands_processed: 0,
        })
    }

    /// Simulation identifier.
    pub const fn id(&self) -> SimulationId {
        self.id
    }

    /// Configuration the run was built from.
    pub const fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Read-only view of agents, spaces and jurisdictions.
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// Current epoch; 0 before the first epoch is simulated.
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether epoch advancement is paused.
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// Simulated time at epoch 0.
    pub const fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Agent counts per health state.
    pub fn census(&self) -> HealthCensus {
        self.world.census()
    }

    /// Register an event subscriber for the lifetime of the run.
    pub fn subscribe<F>(&self, subscriber: F)
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.bus.subscribe(subscriber);
    }

    /// A handle for sending commands, usable from other tasks.
    pub fn command_sender(&self) -> CommandSender {
        CommandSender {
            inner: self.commands_tx.clone(),
        }
    }

    /// Run until `Quit` is processed or `max_epochs` is reached.
    ///
    /// Seeds one random infection before the first iteration. On return
    /// every logged event has been delivered, or the drain timeout elapsed
    /// and [`SimulationResult::drained`] is `false`.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::AlreadyStarted`] on a second call and
    /// [`KernelError::Bus`] if the event bus fails to start or its delivery
    /// thread dies.
    pub async fn start(&mut self) -> Result<SimulationResult, KernelError> {
        if self.started {
            return Err(KernelError::AlreadyStarted { id: self.id });
        }
        self.started = true;
        self.bus.start()?;

        let run = &self.config.simulation;
        info!(
            simulation_id = %self.id,
            time_step = run.time_step,
            max_epochs = run.max_epochs,
            "Simulation starting"
        );
        self.bus.log(Event::SimulationInitialized(SimulationInitializedPayload {
            id: self.id,
            num_agents: count(self.world.agents().len()),
            num_spaces: count(self.world.spaces().len()),
            num_jurisdictions: count(self.world.jurisdictions().len()),
            time_step: run.time_step,
            start_time: self.start_time,
        }));
        self.infect_random_agent();

        let end_reason = loop {
            if self.should_quit {
                break EndReason::Quit;
            }
            let max_epochs = self.config.simulation.max_epochs;
            if max_epochs > 0 && self.epoch >= max_epochs {
                info!(max_epochs, "Epoch limit reached");
                break EndReason::MaxEpochsReached;
            }

            match self.commands_rx.try_recv() {
                Ok(command) => {
                    self.process_command(command);
                    continue;
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => break EndReason::Quit,
            }

            if self.paused {
                match self.commands_rx.recv().await {
                    Some(command) => self.process_command(command),
                    None => break EndReason::Quit,
                }
                continue;
            }

            self.simulate_epoch();
            tokio::task::yield_now().await;
        };

        let census = self.census();
        info!(
            simulation_id = %self.id,
            reason = ?end_reason,
            epochs = self.epoch,
            commands = self.commands_processed,
            susceptible = census.susceptible,
            infected = census.infected,
            infectious = census.infectious,
            immune = census.immune,
            "Simulation ended"
        );

        let drain = Duration::from_millis(self.config.simulation.drain_timeout_ms);
        let drained = match self.bus.close(drain).await {
            Ok(()) => true,
            Err(BusError::DrainTimeout { timeout_ms }) => {
                warn!(timeout_ms, "Subscribers still busy; leaving event delivery to finish");
                false
            }
            Err(err) => return Err(err.into()),
        };

        Ok(SimulationResult {
            end_reason,
            total_epochs: self.epoch,
            commands_processed: self.commands_processed,
            drained,
        })
    }

    /// Force one uniformly chosen agent into the Infected state.
    fn infect_random_agent(&mut self) {
        let Some(idx) = sample_index(&mut self.rng, self.world.agents().len()) else {
            return;
        };
        let ctx = context(&self.config, self.epoch);
        if let Some(event) = epoch::infect(&mut self.world, AgentIdx(idx), &ctx, &mut self.rng) {
            info!(agent = idx, epoch = self.epoch, "Seeded initial infection");
            self.bus.log(event);
        }
    }

    fn simulate_epoch(&mut self) {
        self.epoch = self.epoch.saturating_add(1);
        let ctx = context(&self.config, self.epoch);
        let bus = &self.bus;
        epoch::run_epoch(&mut self.world, &ctx, &mut self.rng, &mut |event| {
            bus.log(event);
        });

        self.bus.log(Event::EpochEnd(EpochEndPayload {
            epoch: self.epoch,
            time_step: self.config.simulation.time_step,
            time: self.time_at(self.epoch),
        }));
        debug!(epoch = self.epoch, "Epoch complete");
    }

    fn process_command(&mut self, command: Command) {
        match command.command_type {
            CommandType::Quit => {
                info!(epoch = self.epoch, "Quit requested");
                self.should_quit = true;
            }
            CommandType::Pause => {
                if !self.paused {
                    info!(epoch = self.epoch, "Simulation paused");
                }
                self.paused = true;
            }
            CommandType::Resume => {
                if self.paused {
                    info!(epoch = self.epoch, "Simulation resumed");
                }
                self.paused = false;
            }
            CommandType::ApplyJurisdictionPolicy => self.apply_jurisdiction_policy(&command),
        }

        self.commands_processed = self.commands_processed.saturating_add(1);
        self.bus.log(Event::CommandProcessed(CommandProcessedPayload {
            epoch: self.epoch,
            command,
        }));
    }

    fn apply_jurisdiction_policy(&mut self, command: &Command) {
        let Some(request) = command.policy_payload() else {
            warn!(payload = %command.payload, "Ignoring policy command with malformed payload");
            return;
        };
        let Some(jurisdiction) = self
            .world
            .find_jurisdiction(&request.jurisdiction_id)
            .and_then(|idx| self.world.jurisdictions.get_mut(idx.0))
        else {
            warn!(
                jurisdiction = %request.jurisdiction_id,
                "Ignoring policy for unknown jurisdiction"
            );
            return;
        };

        let update = jurisdiction.apply_policy(request.policy);
        info!(
            jurisdiction = %update.jurisdiction_id,
            mask_mandate = update.is_mask_mandate,
            lockdown = update.is_lockdown,
            test_strategy = ?update.test_strategy,
            test_capacity_multiplier = update.test_capacity_multiplier,
            "Policy applied"
        );
        self.bus.log(Event::PolicyUpdate(update));
    }

    /// `start_time + epoch * time_step`, saturating at the latest
    /// representable instant.
    fn time_at(&self, epoch: u64) -> DateTime<Utc> {
        let elapsed = epoch.saturating_mul(self.config.simulation.time_step);
        i64::try_from(elapsed)
            .ok()
            .and_then(TimeDelta::try_milliseconds)
            .and_then(|delta| self.start_time.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

const fn context(config: &SimulationConfig, epoch: u64) -> EpochContext<'_> {
    EpochContext {
        epoch,
        time_step: config.simulation.time_step,
        pathogen: &config.pathogen,
        mobility: &config.mobility,
        effects: &config.policy_effects,
    }
}

fn jurisdictions_from(config: &SimulationConfig) -> Vec<Jurisdiction> {
    config
        .jurisdictions
        .iter()
        .map(|j| Jurisdiction::new(j.id.clone(), j.weight))
        .collect()
}

fn count(len: usize) -> u64 {
    u64::try_from(len).unwrap_or(u64::MAX)
}
