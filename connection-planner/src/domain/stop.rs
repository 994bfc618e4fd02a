//! Stop groups.

use std::collections::BTreeSet;

use serde::Serialize;

use super::StopId;

/// A parent stop together with all of its platform/child stops.
///
/// Records are matched against a group rather than a single stop, because
/// the agency reports arrivals at platform level while riders think in
/// stations.
///
/// # Examples
///
/// ```
/// use connection_planner::domain::{StopGroup, StopId};
///
/// let group = StopGroup::new(StopId::from("place-pktrm"), [StopId::from("70075")]);
/// assert!(group.contains(&StopId::from("place-pktrm")));
/// assert!(group.contains(&StopId::from("70075")));
/// assert!(!group.contains(&StopId::from("70076")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct StopGroup {
    parent: StopId,
    members: BTreeSet<StopId>,
}

impl StopGroup {
    /// Build a group; the parent is always a member.
    pub fn new(parent: StopId, children: impl IntoIterator<Item = StopId>) -> Self {
        let mut members: BTreeSet<StopId> = children.into_iter().collect();
        members.insert(parent.clone());
        Self { parent, members }
    }

    /// A group with no known children.
    pub fn single(parent: StopId) -> Self {
        Self::new(parent, [])
    }

    /// Returns the parent stop.
    pub fn parent(&self) -> &StopId {
        &self.parent
    }

    /// Returns true if `stop` belongs to this group.
    pub fn contains(&self, stop: &StopId) -> bool {
        self.members.contains(stop)
    }

    /// All member stops, parent included, in sorted order.
    pub fn members(&self) -> impl Iterator<Item = &StopId> {
        self.members.iter()
    }

    /// Returns the number of member stops.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always false: a group contains at least its parent.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
