//! Change notifier: group membership and event fan-out

mod dispatcher;
mod groups;
mod membership;
mod types;

pub use dispatcher::{ChangeNotifier, DeliveryResult, NotifierStats, NotifierStatsSnapshot};
pub use membership::Membership;
pub use types::{Action, ChangeEvent, EventPayload, RecordChange};

/// The single broadcast group every session joins
pub const USER_UPDATES_GROUP: &str = "user_updates";
