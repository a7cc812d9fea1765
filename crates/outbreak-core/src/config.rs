//! Configuration loading and typed config structures for a simulation run.
//!
//! A run is described by a YAML document (conventionally
//! `outbreak-config.yaml`). Every section has defaults, so an empty document
//! yields a valid 1000-agent, one-hour-epoch simulation in a single
//! jurisdiction.

use std::path::Path;

use outbreak_types::{JurisdictionId, SimulationId};
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but describes an impossible run.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration. Immutable once the run is built.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Run identity, size and pacing.
    #[serde(default)]
    pub simulation: RunConfig,

    /// Natural history of the disease.
    #[serde(default)]
    pub pathogen: Pathogen,

    /// Agent movement parameters.
    #[serde(default)]
    pub mobility: MobilityConfig,

    /// How strongly policies change behavior.
    #[serde(default)]
    pub policy_effects: PolicyEffects,

    /// Jurisdictions and their geographic weights.
    #[serde(default = "default_jurisdictions")]
    pub jurisdictions: Vec<JurisdictionConfig>,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `OUTBREAK_SEED` overrides `simulation.seed` when set to an integer.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yml::from_str(yaml)?;
        Ok(config)
    }

    /// Override values from the environment.
    pub fn apply_env_overrides(&mut self) {
        if let Some(seed) = std::env::var("OUTBREAK_SEED")
            .ok()
            .and_then(|val| val.parse::<u64>().ok())
        {
            self.simulation.seed = seed;
        }
    }

    /// Check that the configuration describes a runnable simulation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.simulation.time_step == 0 {
            return invalid("simulation.time_step must be at least 1ms");
        }
        if self.jurisdictions.is_empty() {
            return invalid("at least one jurisdiction must be configured");
        }
        check_probability("pathogen.transmission_rate", self.pathogen.transmission_rate)?;
        check_probability("mobility.move_probability", self.mobility.move_probability)?;
        check_probability(
            "policy_effects.mask_transmission_factor",
            self.policy_effects.mask_transmission_factor,
        )?;
        check_probability(
            "policy_effects.lockdown_mobility_factor",
            self.policy_effects.lockdown_mobility_factor,
        )?;
        for (name, weight) in [
            ("mobility.office_weight", self.mobility.office_weight),
            ("mobility.social_weight", self.mobility.social_weight),
            ("mobility.healthcare_weight", self.mobility.healthcare_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return invalid(&format!("{name} must be a non-negative number"));
            }
        }
        for (name, period) in [
            ("pathogen.incubation_period", self.pathogen.incubation_period),
            ("pathogen.infectious_period", self.pathogen.infectious_period),
            ("pathogen.immunity_period", self.pathogen.immunity_period),
        ] {
            if period.mean_ms == 0 {
                return invalid(&format!("{name}.mean_ms must be at least 1"));
            }
        }
        Ok(())
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            simulation: RunConfig::default(),
            pathogen: Pathogen::default(),
            mobility: MobilityConfig::default(),
            policy_effects: PolicyEffects::default(),
            jurisdictions: default_jurisdictions(),
        }
    }
}

/// Run identity, size and pacing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunConfig {
    /// Simulation identifier. Generated when absent.
    #[serde(default)]
    pub id: SimulationId,

    /// Total number of agents.
    #[serde(default = "default_num_agents")]
    pub num_agents: u64,

    /// Simulated milliseconds per epoch.
    #[serde(default = "default_time_step")]
    pub time_step: u64,

    /// Random seed for reproducibility.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Stop after this many epochs (0 = run until quit).
    #[serde(default)]
    pub max_epochs: u64,

    /// How long shutdown waits for subscribers to drain, in milliseconds.
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            id: SimulationId::new(),
            num_agents: default_num_agents(),
            time_step: default_time_step(),
            seed: default_seed(),
            max_epochs: 0,
            drain_timeout_ms: default_drain_timeout_ms(),
        }
    }
}

/// A normally distributed duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Period {
    /// Mean duration in milliseconds.
    pub mean_ms: u64,
    /// Standard deviation in milliseconds.
    #[serde(default)]
    pub std_dev_ms: u64,
}

impl Period {
    /// A period of `mean_days` days with `std_dev_days` days of spread.
    pub const fn days(mean_days: u64, std_dev_days: u64) -> Self {
        Self {
            mean_ms: mean_days.saturating_mul(DAY_MS),
            std_dev_ms: std_dev_days.saturating_mul(DAY_MS),
        }
    }
}

/// Milliseconds in one simulated day.
pub const DAY_MS: u64 = 86_400_000;

/// Natural history of the disease, shared by every agent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Pathogen {
    /// Time from infection to becoming infectious.
    #[serde(default = "default_incubation_period")]
    pub incubation_period: Period,

    /// Time spent infectious before recovering.
    #[serde(default = "default_infectious_period")]
    pub infectious_period: Period,

    /// Time immunity lasts after recovery.
    #[serde(default = "default_immunity_period")]
    pub immunity_period: Period,

    /// Probability that one infectious co-occupant infects a susceptible
    /// agent during one epoch.
    #[serde(default = "default_transmission_rate")]
    pub transmission_rate: f64,
}

impl Default for Pathogen {
    fn default() -> Self {
        Self {
            incubation_period: default_incubation_period(),
            infectious_period: default_infectious_period(),
            immunity_period: default_immunity_period(),
            transmission_rate: default_transmission_rate(),
        }
    }
}

/// Agent movement parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MobilityConfig {
    /// Probability that an agent changes location in one epoch.
    #[serde(default = "default_move_probability")]
    pub move_probability: f64,

    /// Relative weight of going to the office when leaving home.
    #[serde(default = "default_office_weight")]
    pub office_weight: f64,

    /// Relative weight of visiting a social space when leaving home.
    #[serde(default = "default_social_weight")]
    pub social_weight: f64,

    /// Relative weight of visiting a healthcare space when leaving home.
    #[serde(default = "default_healthcare_weight")]
    pub healthcare_weight: f64,
}

impl Default for MobilityConfig {
    fn default() -> Self {
        Self {
            move_probability: default_move_probability(),
            office_weight: default_office_weight(),
            social_weight: default_social_weight(),
            healthcare_weight: default_healthcare_weight(),
        }
    }
}

/// Strength of policy interventions.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PolicyEffects {
    /// Transmission probability multiplier in spaces under a mask mandate.
    #[serde(default = "default_mask_transmission_factor")]
    pub mask_transmission_factor: f64,

    /// Movement probability multiplier for residents under lockdown.
    #[serde(default = "default_lockdown_mobility_factor")]
    pub lockdown_mobility_factor: f64,
}

impl Default for PolicyEffects {
    fn default() -> Self {
        Self {
            mask_transmission_factor: default_mask_transmission_factor(),
            lockdown_mobility_factor: default_lockdown_mobility_factor(),
        }
    }
}

/// One jurisdiction and its share of the population.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JurisdictionConfig {
    /// Area code.
    pub id: JurisdictionId,
    /// Relative population weight.
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn invalid(reason: &str) -> Result<(), ConfigError> {
    Err(ConfigError::Invalid {
        reason: reason.to_owned(),
    })
}

fn check_probability(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        invalid(&format!("{name} must be within [0, 1], got {value}"))
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const fn default_num_agents() -> u64 {
    1000
}

const fn default_time_step() -> u64 {
    3_600_000
}

const fn default_seed() -> u64 {
    42
}

const fn default_drain_timeout_ms() -> u64 {
    5000
}

const fn default_incubation_period() -> Period {
    Period::days(5, 1)
}

const fn default_infectious_period() -> Period {
    Period::days(7, 2)
}

const fn default_immunity_period() -> Period {
    Period::days(90, 14)
}

const fn default_transmission_rate() -> f64 {
    0.01
}

const fn default_move_probability() -> f64 {
    0.25
}

const fn default_office_weight() -> f64 {
    0.6
}

const fn default_social_weight() -> f64 {
    0.3
}

const fn default_healthcare_weight() -> f64 {
    0.1
}

const fn default_mask_transmission_factor() -> f64 {
    0.5
}

const fn default_lockdown_mobility_factor() -> f64 {
    0.2
}

const fn default_weight() -> f64 {
    1.0
}

fn default_jurisdictions() -> Vec<JurisdictionConfig> {
    vec![JurisdictionConfig {
        id: JurisdictionId::new("default"),
        weight: default_weight(),
    }]
}
