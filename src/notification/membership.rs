use std::sync::Arc;

use uuid::Uuid;

use super::ChangeNotifier;

/// A connection's registration in a group.
///
/// Acquired through [`ChangeNotifier::join_scoped`]; dropping it leaves the group,
/// so the registration is released on every exit path of the owning session.
#[must_use = "dropping a Membership immediately leaves the group"]
pub struct Membership {
    notifier: Arc<ChangeNotifier>,
    group: String,
    connection_id: Uuid,
}

impl Membership {
    pub(super) fn new(notifier: Arc<ChangeNotifier>, group: String, connection_id: Uuid) -> Self {
        Self {
            notifier,
            group,
            connection_id,
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }
}

impl Drop for Membership {
    fn drop(&mut self) {
        self.notifier.leave(&self.group, self.connection_id);
    }
}

impl std::fmt::Debug for Membership {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Membership")
            .field("group", &self.group)
            .field("connection_id", &self.connection_id)
            .finish()
    }
}
