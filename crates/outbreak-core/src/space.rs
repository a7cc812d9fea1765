//! Spaces: the locations agents occupy and where transmission happens.
//!
//! A [`Space`] wraps its fixed identity (id, kind, capacity, jurisdiction)
//! together with the per-epoch occupant set. Healthcare spaces also carry a
//! [`TestingQueue`].

use std::collections::{BTreeSet, VecDeque};

use outbreak_types::{SpaceId, SpaceKind};

use crate::agent::AgentIdx;
use crate::jurisdiction::JurisdictionIdx;

/// Dense handle of a space inside a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpaceIdx(pub usize);

/// A household, office, social venue or healthcare facility.
#[derive(Debug, Clone)]
pub struct Space {
    id: SpaceId,
    kind: SpaceKind,
    capacity: u64,
    jurisdiction: JurisdictionIdx,
    occupants: BTreeSet<AgentIdx>,
    testing: Option<TestingQueue>,
}

impl Space {
    /// Create an empty space. Healthcare spaces start with an empty
    /// testing queue.
    pub fn new(kind: SpaceKind, capacity: u64, jurisdiction: JurisdictionIdx) -> Self {
        Self {
            id: SpaceId::new(),
            kind,
            capacity,
            jurisdiction,
            occupants: BTreeSet::new(),
            testing: (kind == SpaceKind::Healthcare).then(TestingQueue::default),
        }
    }

    /// External identifier.
    pub const fn id(&self) -> SpaceId {
        self.id
    }

    /// What kind of space this is.
    pub const fn kind(&self) -> SpaceKind {
        self.kind
    }

    /// Nominal capacity, fixed at creation.
    pub const fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Jurisdiction the space belongs to.
    pub const fn jurisdiction(&self) -> JurisdictionIdx {
        self.jurisdiction
    }

    /// Agents currently present.
    pub const fn occupants(&self) -> &BTreeSet<AgentIdx> {
        &self.occupants
    }

    /// Testing queue, present for healthcare spaces only.
    pub const fn testing(&self) -> Option<&TestingQueue> {
        self.testing.as_ref()
    }

    pub(crate) fn testing_mut(&mut self) -> Option<&mut TestingQueue> {
        self.testing.as_mut()
    }

    /// Record an agent entering. Visits are not capacity-checked.
    pub(crate) fn enter(&mut self, agent: AgentIdx) {
        self.occupants.insert(agent);
    }

    /// Record an agent leaving.
    pub(crate) fn leave(&mut self, agent: AgentIdx) {
        self.occupants.remove(&agent);
    }
}

/// Agents waiting for a test at a healthcare space, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct TestingQueue {
    backlog: VecDeque<AgentIdx>,
    waiting: BTreeSet<AgentIdx>,
}

impl TestingQueue {
    /// Queue an agent unless it is already waiting. Returns whether it was
    /// added.
    pub fn enqueue(&mut self, agent: AgentIdx) -> bool {
        if !self.waiting.insert(agent) {
            return false;
        }
        self.backlog.push_back(agent);
        true
    }

    /// Take up to `capacity` agents from the front of the queue.
    pub fn take(&mut self, capacity: u64) -> Vec<AgentIdx> {
        let count = usize::try_from(capacity)
            .unwrap_or(usize::MAX)
            .min(self.backlog.len());
        let taken: Vec<AgentIdx> = self.backlog.drain(..count).collect();
        for agent in &taken {
            self.waiting.remove(agent);
        }
        taken
    }

    /// Number of agents waiting.
    pub fn len(&self) -> usize {
        self.backlog.len()
    }

    /// Whether nobody is waiting.
    pub fn is_empty(&self) -> bool {
        self.backlog.is_empty()
    }
}

/// Tests a healthcare space can run in one epoch given its jurisdiction's
/// capacity multiplier.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn testing_capacity(capacity: u64, multiplier: f64) -> u64 {
    let scaled = (capacity as f64 * multiplier).floor();
    if scaled.is_finite() && scaled > 0.0 {
        scaled as u64
    } else {
        0
    }
}
