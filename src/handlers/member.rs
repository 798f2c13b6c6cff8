//! Group member join/leave notices.

use crate::error::Result;
use crate::onebot::{GroupMemberChange, Message};
use crate::types::Data;
use tracing::info;

/// New audit group members go on the audit list and get a welcome message.
pub async fn on_member_increase(data: &Data, change: &GroupMemberChange) -> Result<()> {
    if !data.config.is_audit_group(change.group_id) || data.is_staff(change.user_id) {
        return Ok(());
    }

    info!(user_id = change.user_id, group_id = change.group_id, "new member joined audit group");
    data.users.add_pending_user(change.user_id).await;

    let mut welcome = Message::new().at(change.user_id);
    welcome = match &data.config.questionnaire_link {
        Some(link) => welcome.text(format!("\n欢迎来到审核群，请填写以下问卷进行审核：{}", link)),
        None => welcome.text("\n欢迎来到审核群，请填写群公告中的问卷进行审核。"),
    };
    welcome = welcome.text("\n建议使用浏览器访问，而不是在QQ中打开。");
    data.api.send_group_msg(change.group_id, &welcome).await?;
    Ok(())
}

/// Leaving the audit group drops the record; being kicked from a main group
/// lands the user on the blacklist.
pub async fn on_member_decrease(data: &Data, change: &GroupMemberChange) -> Result<()> {
    if data.config.is_audit_group(change.group_id) {
        info!(user_id = change.user_id, sub_type = %change.sub_type, "member left audit group");
        data.users.delete_user(change.user_id).await;
        return Ok(());
    }

    if data.config.is_main_group(change.group_id) && change.was_kicked() {
        info!(
            user_id = change.user_id,
            group_id = change.group_id,
            operator_id = change.operator_id,
            "member kicked from main group"
        );
        data.users.add_to_blacklist(change.user_id).await;
    }
    Ok(())
}
