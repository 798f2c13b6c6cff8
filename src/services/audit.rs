//! Approval and the three-strike denial workflow.

use super::user::UserService;
use crate::error::Result;
use crate::onebot::{BotApi, Message};
use crate::store::{AuditStatus, JsonDataStore};
use crate::utils::passcode::generate_unique_passcode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct AuditService {
    users: UserService,
    store: Arc<JsonDataStore>,
    api: Arc<dyn BotApi>,
}

/// "10分钟", "90秒"
fn describe_ttl(ttl: Duration) -> String {
    let secs = ttl.as_secs();
    if secs >= 60 && secs % 60 == 0 {
        format!("{}分钟", secs / 60)
    } else {
        format!("{}秒", secs)
    }
}

impl AuditService {
    pub fn new(users: UserService, store: Arc<JsonDataStore>, api: Arc<dyn BotApi>) -> Self {
        Self { users, store, api }
    }

    async fn notify(&self, group_id: u64, qq_id: u64, text: impl Into<String>) -> Result<()> {
        self.api
            .send_group_msg(group_id, &Message::new().at(qq_id).text(text))
            .await?;
        Ok(())
    }

    /// Approve `target` and hand them a fresh passcode.
    ///
    /// Returns `Ok(false)` when the target is unknown or already processed; the
    /// operator is told why in `group_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if a message cannot be sent.
    pub async fn process_approval(&self, target: u64, operator: u64, group_id: u64) -> Result<bool> {
        let Some(user) = self.users.get_user(target).await else {
            error!(target, "approval target not in audit list");
            self.notify(group_id, operator, "目标QQ号未找到！").await?;
            return Ok(false);
        };

        if !user.status.can_approve() {
            error!(target, status = %user.status, "approval target already processed");
            self.notify(group_id, operator, "目标QQ号已被处理！").await?;
            return Ok(false);
        }

        let passcode = generate_unique_passcode(&self.store).await;
        if self
            .users
            .update_status(target, AuditStatus::Approved, passcode.clone())
            .await
            .is_none()
        {
            // Removed between the lookup and the update
            warn!(target, "approval target vanished");
            self.notify(group_id, operator, "目标QQ号未找到！").await?;
            return Ok(false);
        }

        let ttl = describe_ttl(self.users.passcode_ttl());
        let announcement = Message::new()
            .at(target)
            .text(format!("您的审核已通过！请在入群申请中填写以下验证码：{}\n", passcode))
            .text(format!("该验证码将在{}后过期，过期后就要重新答题了，所以尽快使用。\n", ttl))
            .text("验证码与QQ号一一对应，不用再尝试其他人的验证码了 (～￣▽￣)～");
        self.api.send_group_msg(group_id, &announcement).await?;

        info!(target, operator, "user approved");
        Ok(true)
    }

    /// Deny `target` once.
    ///
    /// Pending and suspended users lose a chance. A user on their last chance
    /// is kicked from `group_id` and forgotten.
    ///
    /// # Errors
    ///
    /// Returns an error if a message cannot be sent. A failed kick is only
    /// logged.
    pub async fn process_denial(&self, target: u64, operator: u64, group_id: u64) -> Result<bool> {
        let Some(user) = self.users.get_user(target).await else {
            error!(target, "denial target not in audit list");
            self.notify(group_id, operator, "目标QQ号未找到！").await?;
            return Ok(false);
        };

        let Some(step) = user.status.denial_step() else {
            error!(target, status = %user.status, "denial target already processed");
            self.notify(group_id, operator, "目标QQ号已被处理！").await?;
            return Ok(false);
        };

        if step.next == AuditStatus::Denied {
            self.notify(group_id, target, "很抱歉，您的三次审核机会已用尽！").await?;

            if let Err(e) = self.api.set_group_kick(group_id, target, false).await {
                warn!(target, group_id, error = %e, "failed to kick denied user");
                self.notify(group_id, target, "\n无法自动移出群聊，请自行退出。").await?;
            }

            // The kick may or may not come back as a member-decrease event
            self.users.delete_user(target).await;
            info!(target, operator, "user denied for the last time and removed");
            return Ok(true);
        }

        self.users.update_status(target, step.next, String::new()).await;

        let notice = Message::new()
            .at(target)
            .text("很抱歉，您的审核未通过！")
            .text(format!("您还有{}次审核机会", step.chances_left));
        self.api.send_group_msg(group_id, &notice).await?;

        info!(target, operator, next = %step.next, "user denied");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_data, ApiCall};
    use tempfile::TempDir;

    const GROUP: u64 = crate::testing::AUDIT_GROUP;
    const AUDITOR: u64 = crate::testing::AUDITOR;

    #[test]
    fn test_describe_ttl() {
        assert_eq!(describe_ttl(Duration::from_secs(600)), "10分钟");
        assert_eq!(describe_ttl(Duration::from_secs(90)), "90秒");
        assert_eq!(describe_ttl(Duration::from_secs(30)), "30秒");
    }

    #[tokio::test]
    async fn test_approval_issues_passcode() {
        let dir = TempDir::new().unwrap();
        let (data, api) = test_data(&dir).await;
        data.users.add_pending_user(500).await;

        assert!(data.audit.process_approval(500, AUDITOR, GROUP).await.unwrap());

        let user = data.users.get_user(500).await.unwrap();
        assert_eq!(user.status, AuditStatus::Approved);
        assert_eq!(user.passcode.len(), 10);
        assert!(user.expires_at.is_some());

        let sent = api.group_texts(GROUP);
        assert_eq!(sent.len(), 1);
        assert!(sent[0].starts_with("@500"));
        assert!(sent[0].contains(&user.passcode));
        assert!(sent[0].contains("10分钟"));
    }

    #[tokio::test]
    async fn test_approval_rejects_unknown_and_processed() {
        let dir = TempDir::new().unwrap();
        let (data, api) = test_data(&dir).await;

        assert!(!data.audit.process_approval(1, AUDITOR, GROUP).await.unwrap());
        assert!(api.group_texts(GROUP)[0].contains("目标QQ号未找到"));

        data.users.add_pending_user(2).await;
        assert!(data.audit.process_approval(2, AUDITOR, GROUP).await.unwrap());
        let first_code = data.users.get_user(2).await.unwrap().passcode;

        assert!(!data.audit.process_approval(2, AUDITOR, GROUP).await.unwrap());
        assert!(api.group_texts(GROUP).last().unwrap().contains("目标QQ号已被处理"));
        assert_eq!(data.users.get_user(2).await.unwrap().passcode, first_code);
    }

    #[tokio::test]
    async fn test_expired_user_can_be_approved_again() {
        let dir = TempDir::new().unwrap();
        let (data, _api) = test_data(&dir).await;
        data.users.add_pending_user(3).await;
        data.users.update_status(3, AuditStatus::Expired, String::new()).await;

        assert!(data.audit.process_approval(3, AUDITOR, GROUP).await.unwrap());
        assert_eq!(data.users.get_user(3).await.unwrap().status, AuditStatus::Approved);
    }

    #[tokio::test]
    async fn test_three_denials_kick_and_delete() {
        let dir = TempDir::new().unwrap();
        let (data, api) = test_data(&dir).await;
        data.users.add_pending_user(9).await;

        assert!(data.audit.process_denial(9, AUDITOR, GROUP).await.unwrap());
        assert_eq!(data.users.get_user(9).await.unwrap().status, AuditStatus::Suspend);
        assert!(api.group_texts(GROUP).last().unwrap().contains("您还有2次审核机会"));

        assert!(data.audit.process_denial(9, AUDITOR, GROUP).await.unwrap());
        assert_eq!(data.users.get_user(9).await.unwrap().status, AuditStatus::Dying);
        assert!(api.group_texts(GROUP).last().unwrap().contains("您还有1次审核机会"));

        assert!(data.audit.process_denial(9, AUDITOR, GROUP).await.unwrap());
        assert!(data.users.get_user(9).await.is_none());
        assert!(api.calls().contains(&ApiCall::Kick { group_id: GROUP, user_id: 9 }));
        assert!(api.group_texts(GROUP).last().unwrap().contains("三次审核机会已用尽"));
    }

    #[tokio::test]
    async fn test_failed_kick_still_deletes() {
        let dir = TempDir::new().unwrap();
        let (data, api) = test_data(&dir).await;
        api.fail_kicks();
        data.users.add_pending_user(9).await;
        data.users.update_status(9, AuditStatus::Dying, String::new()).await;

        assert!(data.audit.process_denial(9, AUDITOR, GROUP).await.unwrap());
        assert!(data.users.get_user(9).await.is_none());
        assert!(api.group_texts(GROUP).last().unwrap().contains("请自行退出"));
    }

    #[tokio::test]
    async fn test_denial_of_approved_or_expired_is_refused() {
        let dir = TempDir::new().unwrap();
        let (data, api) = test_data(&dir).await;
        data.users.add_pending_user(4).await;
        data.users.update_status(4, AuditStatus::Approved, "1234567890".to_string()).await;
        data.users.add_pending_user(5).await;
        data.users.update_status(5, AuditStatus::Expired, String::new()).await;

        assert!(!data.audit.process_denial(4, AUDITOR, GROUP).await.unwrap());
        assert!(!data.audit.process_denial(5, AUDITOR, GROUP).await.unwrap());
        assert!(!data.audit.process_denial(6, AUDITOR, GROUP).await.unwrap());

        assert_eq!(data.users.get_user(4).await.unwrap().status, AuditStatus::Approved);
        assert_eq!(api.group_texts(GROUP).len(), 3);
        assert!(!api.calls().iter().any(|c| matches!(c, ApiCall::Kick { .. })));
    }
}
