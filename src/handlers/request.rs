//! Join requests for the audit and main groups.

use crate::error::{Result, TreePassError};
use crate::onebot::GroupJoinRequest;
use crate::types::Data;
use tracing::{info, warn};

async fn answer(data: &Data, request: &GroupJoinRequest, approve: bool, reason: Option<&str>) -> Result<()> {
    data.api
        .set_group_add_request(&request.flag, &request.sub_type, approve, reason)
        .await
}

pub async fn on_join_request(data: &Data, request: &GroupJoinRequest) -> Result<()> {
    // Invitations are left to the group admins
    if request.sub_type != "add" {
        return Ok(());
    }

    if data.config.is_audit_group(request.group_id) {
        on_audit_group_request(data, request).await
    } else if data.config.is_main_group(request.group_id) {
        on_main_group_request(data, request).await
    } else {
        Ok(())
    }
}

async fn on_audit_group_request(data: &Data, request: &GroupJoinRequest) -> Result<()> {
    if data.users.is_blacklisted(request.user_id).await {
        info!(user_id = request.user_id, "rejected blacklisted user from audit group");
        return answer(data, request, false, Some("您已被列入黑名单。")).await;
    }
    answer(data, request, true, None).await
}

async fn on_main_group_request(data: &Data, request: &GroupJoinRequest) -> Result<()> {
    let user_id = request.user_id;

    if data.users.is_blacklisted(user_id).await {
        info!(user_id, "rejected blacklisted user from main group");
        return answer(data, request, false, Some("您已被列入黑名单，无法加入本群。")).await;
    }

    let check = match data.users.validate_join_request(user_id, &request.comment).await {
        Ok(check) => check,
        Err(TreePassError::UserNotFound(_)) => {
            info!(user_id, "join request from user not in audit list");
            return answer(data, request, false, Some("您不在审核名单中！")).await;
        }
        Err(e) => return Err(e),
    };

    if check.is_accepted() {
        answer(data, request, true, None).await?;
        data.users.delete_user(user_id).await;
        info!(user_id, group_id = request.group_id, "user passed audit");

        let audit_group = data.config.audit_group_id;
        if let Err(e) = data.api.set_group_kick(audit_group, user_id, false).await {
            warn!(user_id, error = %e, "failed to remove user from audit group");
        }
        return Ok(());
    }

    let reason = if check.passcode_matches && check.expired {
        "验证码已过期，请联系审核员重新审核。"
    } else {
        "验证码不正确！可能已经过期，请联系审核员。"
    };
    info!(user_id, expired = check.expired, "join request with wrong or expired passcode");
    answer(data, request, false, Some(reason)).await
}
