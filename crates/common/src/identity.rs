use serde::{Deserialize, Serialize};

use crate::UserId;

/// The authenticated caller of a request.
///
/// Produced by the authentication subsystem; this workspace only consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    /// Elevated privilege (admin/staff).
    pub is_staff: bool,
}

impl Identity {
    /// A regular customer.
    pub fn customer(user_id: UserId) -> Self {
        Self {
            user_id,
            is_staff: false,
        }
    }

    /// A privileged operator.
    pub fn staff(user_id: UserId) -> Self {
        Self {
            user_id,
            is_staff: true,
        }
    }

    /// Returns true if the caller may act on a resource owned by `owner`.
    pub fn can_access(&self, owner: UserId) -> bool {
        self.is_staff || self.user_id == owner
    }
}
