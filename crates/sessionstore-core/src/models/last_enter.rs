//! Per-user last-activity record.

use chrono::{DateTime, Utc};

/// Most recent login or activity of a user, plus every IP address
/// observed across that user's sessions.
#[derive(Debug, Clone, PartialEq)]
pub struct LastEnter<UserId> {
    pub user_id: UserId,
    pub last_enter: DateTime<Utc>,
    pub ip: Vec<String>,
}
