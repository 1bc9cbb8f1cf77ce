//! Session-related types.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use gamerly_core::{UserId, UserRole};

use super::Account;

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the logged-in user. The
/// role is re-read from the database on admin-only routes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's login name.
    pub username: String,
    /// Role at login time.
    pub role: UserRole,
}

impl From<&Account> for CurrentUser {
    fn from(account: &Account) -> Self {
        Self {
            id: account.user.id,
            username: account.user.username.clone(),
            role: account.profile.role,
        }
    }
}

/// Wrong codes a pending login tolerates before it is dropped.
pub const MAX_CODE_ATTEMPTS: u32 = 5;

/// A password login waiting for its emailed code.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingLogin {
    pub user_id: UserId,
    #[serde(default)]
    pub failed_attempts: u32,
}

impl PendingLogin {
    #[must_use]
    pub const fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            failed_attempts: 0,
        }
    }

    /// Count a wrong code. `None` once the attempts are used up, after which
    /// the password step has to be repeated for a fresh code.
    #[must_use]
    pub const fn after_wrong_code(self) -> Option<Self> {
        let failed_attempts = self.failed_attempts.saturating_add(1);
        if failed_attempts >= MAX_CODE_ATTEMPTS {
            return None;
        }
        Some(Self {
            user_id: self.user_id,
            failed_attempts,
        })
    }
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for a login that passed the password check but not the code.
    pub const PENDING_LOGIN: &str = "pending_login";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_wrong_codes_exhaust_pending_login() {
        let mut pending = PendingLogin::new(UserId::new(7));
        for attempt in 1..MAX_CODE_ATTEMPTS {
            pending = pending.after_wrong_code().unwrap();
            assert_eq!(pending.failed_attempts, attempt);
            assert_eq!(pending.user_id, UserId::new(7));
        }
        assert!(pending.after_wrong_code().is_none());
    }

    #[test]
    fn test_pending_login_without_attempts_deserializes() {
        let pending: PendingLogin = serde_json::from_str(r#"{"user_id": 3}"#).unwrap();
        assert_eq!(pending, PendingLogin::new(UserId::new(3)));
    }
}
