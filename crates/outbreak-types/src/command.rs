//! Control commands accepted by a running simulation.
//!
//! A [`Command`] is a type tag plus a free-form JSON payload. The payload is
//! only interpreted when the command is processed, so a payload of the wrong
//! shape survives transport and is echoed back in the `CommandProcessed`
//! event even though it has no effect.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::enums::TestStrategy;
use crate::ids::JurisdictionId;

/// The policy currently in force in a jurisdiction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Policy {
    /// Masks are mandatory in the jurisdiction's spaces.
    pub is_mask_mandate: bool,
    /// Movement is restricted for residents of the jurisdiction.
    pub is_lockdown: bool,
    /// Who the jurisdiction's healthcare spaces test.
    pub test_strategy: TestStrategy,
    /// Multiplier applied to nominal healthcare testing capacity.
    pub test_capacity_multiplier: f64,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            is_mask_mandate: false,
            is_lockdown: false,
            test_strategy: TestStrategy::default(),
            test_capacity_multiplier: 1.0,
        }
    }
}

/// Type tag of a [`Command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum CommandType {
    /// Stop the simulation loop.
    Quit,
    /// Stop advancing epochs; commands are still processed.
    Pause,
    /// Resume advancing epochs.
    Resume,
    /// Replace a jurisdiction's policy.
    ApplyJurisdictionPolicy,
}

impl core::fmt::Display for CommandType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Quit => "quit",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::ApplyJurisdictionPolicy => "apply_jurisdiction_policy",
        };
        f.write_str(name)
    }
}

/// Payload of an [`CommandType::ApplyJurisdictionPolicy`] command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ApplyJurisdictionPolicyPayload {
    /// Target jurisdiction.
    pub jurisdiction_id: JurisdictionId,
    /// The policy that replaces the current one.
    pub policy: Policy,
}

/// An external control instruction fed into the simulation loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Command {
    /// What the command asks for.
    #[serde(rename = "type")]
    pub command_type: CommandType,
    /// Command-specific payload, `null` for commands that take none.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    #[ts(type = "unknown")]
    pub payload: Value,
}

impl Command {
    /// Build a command with no payload.
    pub const fn new(command_type: CommandType) -> Self {
        Self {
            command_type,
            payload: Value::Null,
        }
    }

    /// A `Quit` command.
    pub const fn quit() -> Self {
        Self::new(CommandType::Quit)
    }

    /// A `Pause` command.
    pub const fn pause() -> Self {
        Self::new(CommandType::Pause)
    }

    /// A `Resume` command.
    pub const fn resume() -> Self {
        Self::new(CommandType::Resume)
    }

    /// An `ApplyJurisdictionPolicy` command targeting `jurisdiction_id`.
    pub fn apply_jurisdiction_policy(jurisdiction_id: JurisdictionId, policy: Policy) -> Self {
        let payload = ApplyJurisdictionPolicyPayload {
            jurisdiction_id,
            policy,
        };
        Self {
            command_type: CommandType::ApplyJurisdictionPolicy,
            payload: serde_json::to_value(payload).unwrap_or(Value::Null),
        }
    }

    /// Decode the payload as a policy change.
    ///
    /// Returns `None` when the payload does not have that shape.
    pub fn policy_payload(&self) -> Option<ApplyJurisdictionPolicyPayload> {
        serde_json::from_value(self.payload.clone()).ok()
    }
}
