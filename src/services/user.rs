//! User records and the blacklist.

use crate::config::DEFAULT_PASSCODE_TTL;
use crate::error::{Result, TreePassError};
use crate::store::{AuditStatus, JsonDataStore, UserInfo};
use crate::utils::validation::extract_passcode;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Result of checking a join request against the audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinCheck {
    pub passcode_matches: bool,
    pub expired: bool,
}

impl JoinCheck {
    /// The request carries the live passcode of this user.
    pub fn is_accepted(&self) -> bool {
        self.passcode_matches && !self.expired
    }
}

#[derive(Clone)]
pub struct UserService {
    store: Arc<JsonDataStore>,
    passcode_ttl: Duration,
}

impl UserService {
    pub fn new(store: Arc<JsonDataStore>, passcode_ttl: Duration) -> Self {
        Self { store, passcode_ttl }
    }

    pub fn passcode_ttl(&self) -> Duration {
        self.passcode_ttl
    }

    /// Put a user on the audit list.
    ///
    /// A user who is already listed keeps their record; that still counts as
    /// success since the user ends up on the list either way.
    pub async fn add_pending_user(&self, qq_id: u64) -> bool {
        if self.store.user_exists(qq_id).await {
            info!(qq_id, "user already in audit list, skipping");
            return true;
        }

        self.store.add_user(UserInfo::pending(qq_id, Utc::now())).await;
        info!(qq_id, "user added to audit list");
        true
    }

    pub async fn get_user(&self, qq_id: u64) -> Option<UserInfo> {
        self.store.get_user(qq_id).await
    }

    /// When a passcode issued at `now` runs out. A TTL that cannot be
    /// represented falls back to the default so the passcode still expires.
    fn deadline_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let deadline = chrono::Duration::from_std(self.passcode_ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl));
        match deadline {
            Some(deadline) => deadline,
            None => {
                warn!(ttl_secs = self.passcode_ttl.as_secs(), "passcode TTL out of range, using default");
                now + chrono::Duration::seconds(DEFAULT_PASSCODE_TTL.as_secs() as i64)
            }
        }
    }

    /// Move a user to `status` with the given passcode.
    ///
    /// Approval starts the passcode clock; every other status clears the
    /// deadline. Returns the updated record, or `None` for an unknown user.
    pub async fn update_status(&self, qq_id: u64, status: AuditStatus, passcode: String) -> Option<UserInfo> {
        let mut user = self.store.get_user(qq_id).await?;
        let now = Utc::now();

        user.status = status;
        user.passcode = passcode;
        user.updated_at = now;
        user.expires_at = match status {
            AuditStatus::Approved => Some(self.deadline_from(now)),
            _ => None,
        };

        self.store.update_user(user.clone()).await;
        info!(qq_id, %status, "user status updated");
        Some(user)
    }

    /// Check the comment of a join request against the user's passcode.
    ///
    /// Comparison ignores case and surrounding whitespace. A user without a
    /// passcode never matches.
    ///
    /// # Errors
    ///
    /// Returns `UserNotFound` if the user is not on the audit list.
    pub async fn validate_join_request(&self, qq_id: u64, comment: &str) -> Result<JoinCheck> {
        let user = self
            .store
            .get_user(qq_id)
            .await
            .ok_or(TreePassError::UserNotFound(qq_id))?;

        let answer = extract_passcode(comment);
        let passcode_matches =
            user.has_passcode() && !answer.is_empty() && user.passcode.trim().eq_ignore_ascii_case(answer);
        // The scan may not have caught up with a deadline that already passed
        let expired = user.status == AuditStatus::Expired || user.is_due_for_expiry(Utc::now());

        info!(qq_id, passcode_matches, expired, "validated join request");
        Ok(JoinCheck { passcode_matches, expired })
    }

    pub async fn delete_user(&self, qq_id: u64) -> bool {
        let removed = self.store.delete_user(qq_id).await;
        if removed {
            info!(qq_id, "user removed from audit list");
        }
        removed
    }

    pub async fn add_to_blacklist(&self, qq_id: u64) -> bool {
        let added = self.store.add_to_blacklist(qq_id).await;
        info!(qq_id, added, "add user to blacklist");
        added
    }

    pub async fn remove_from_blacklist(&self, qq_id: u64) -> bool {
        let removed = self.store.remove_from_blacklist(qq_id).await;
        info!(qq_id, removed, "remove user from blacklist");
        removed
    }

    pub async fn is_blacklisted(&self, qq_id: u64) -> bool {
        self.store.is_blacklisted(qq_id).await
    }
}
