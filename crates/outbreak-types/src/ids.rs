//! Type-safe identifiers for simulation entities.
//!
//! Agents and spaces are identified externally by UUID v7 wrappers so event
//! consumers can correlate them across a run. Jurisdictions carry the string
//! code of the geographic area they were built from (for example an MSOA
//! code), so [`JurisdictionId`] wraps a [`String`] instead.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_uuid_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

define_uuid_id! {
    /// Unique identifier of a simulation run.
    SimulationId
}

define_uuid_id! {
    /// Unique identifier of an agent.
    AgentId
}

define_uuid_id! {
    /// Unique identifier of a space (household, office, social venue or
    /// healthcare facility).
    SpaceId
}

/// Identifier of a jurisdiction, the geographic area code it was built from.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export, export_to = "bindings/")]
pub struct JurisdictionId(pub String);

impl JurisdictionId {
    /// Create a jurisdiction identifier from an area code.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Borrow the area code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for JurisdictionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JurisdictionId {
    fn from(code: &str) -> Self {
        Self(code.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_ids_are_unique() {
        let a = AgentId::new();
        let b = AgentId::new();
        assert_ne!(a, b);
        assert_ne!(SpaceId::new().into_inner(), Uuid::nil());
    }

    #[test]
    fn jurisdiction_id_serializes_as_plain_string() {
        let id = JurisdictionId::new("E02000001");
        let json = serde_json::to_string(&id).ok();
        assert_eq!(json.as_deref(), Some("\"E02000001\""));
        assert_eq!(id.to_string(), "E02000001");
    }

    #[test]
    fn jurisdiction_id_reads_plain_string_and_exports_as_string() {
        let id: Option<JurisdictionId> = serde_json::from_str("\"E1\"").ok();
        assert_eq!(id, Some(JurisdictionId::new("E1")));
        assert_eq!(<JurisdictionId as TS>::inline(), "string");
    }
}
