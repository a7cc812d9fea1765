//! Policy-bearing geographic groupings.
//!
//! A jurisdiction owns no agents or spaces. Spaces hold a
//! [`JurisdictionIdx`] into the world's jurisdiction arena and read the
//! policy through it on every use, so a policy change is visible to the
//! whole jurisdiction at once.

use outbreak_types::{JurisdictionId, Policy, PolicyUpdatePayload};

/// Dense handle of a jurisdiction inside a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JurisdictionIdx(pub usize);

/// A jurisdiction and the policy currently in force there.
#[derive(Debug, Clone, PartialEq)]
pub struct Jurisdiction {
    id: JurisdictionId,
    weight: f64,
    policy: Policy,
}

impl Jurisdiction {
    /// Create a jurisdiction under the default policy.
    pub fn new(id: JurisdictionId, weight: f64) -> Self {
        Self {
            id,
            weight,
            policy: Policy::default(),
        }
    }

    /// Area code.
    pub const fn id(&self) -> &JurisdictionId {
        &self.id
    }

    /// Relative population weight.
    pub const fn weight(&self) -> f64 {
        self.weight
    }

    /// Policy in force.
    pub const fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Replace the policy wholesale and describe the change.
    pub fn apply_policy(&mut self, policy: Policy) -> PolicyUpdatePayload {
        self.policy = policy;
        PolicyUpdatePayload::new(self.id.clone(), &self.policy)
    }
}
