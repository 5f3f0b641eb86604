//! Group membership table

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::connection_manager::ConnectionHandle;

/// group name -> (connection id -> handle)
///
/// Every mutation of one group happens under that group's shard lock, so
/// concurrent join/leave/snapshot calls never observe a half-applied change.
/// Groups with no members are removed.
#[derive(Default)]
pub(crate) struct GroupTable {
    groups: DashMap<String, HashMap<Uuid, Arc<ConnectionHandle>>>,
}

impl GroupTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns true when the connection was not already a member
    pub(crate) fn insert(&self, group: &str, handle: Arc<ConnectionHandle>) -> bool {
        self.groups
            .entry(group.to_string())
            .or_default()
            .insert(handle.id, handle)
            .is_none()
    }

    /// Returns true when the connection was a member
    pub(crate) fn remove(&self, group: &str, connection_id: Uuid) -> bool {
        let removed = match self.groups.get_mut(group) {
            Some(mut members) => members.remove(&connection_id).is_some(),
            None => return false,
        };

        // Re-checked under the shard lock; a concurrent insert keeps the group alive
        self.groups.remove_if(group, |_, members| members.is_empty());

        removed
    }

    pub(crate) fn snapshot(&self, group: &str) -> Vec<Arc<ConnectionHandle>> {
        self.groups
            .get(group)
            .map(|members| members.values().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn contains(&self, group: &str, connection_id: Uuid) -> bool {
        self.groups
            .get(group)
            .map(|members| members.contains_key(&connection_id))
            .unwrap_or(false)
    }

    pub(crate) fn member_count(&self, group: &str) -> usize {
        self.groups.get(group).map(|m| m.len()).unwrap_or(0)
    }

    pub(crate) fn sizes(&self) -> HashMap<String, usize> {
        self.groups
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().len()))
            .collect()
    }
}
