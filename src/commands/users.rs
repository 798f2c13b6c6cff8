//! Commands working on single audit records.

use super::{Command, CommandContext, CommandOutcome, CommandSpec, UserRoles};
use crate::error::Result;
use crate::onebot::Message;
use crate::store::{AuditStatus, UserInfo};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Write;
use tracing::warn;

fn format_time(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn describe_user(user: &UserInfo, nickname: Option<&str>, blacklisted: bool) -> String {
    let mut text = format!("查询用户: {}", user.qq_id);
    if let Some(nickname) = nickname {
        let _ = write!(text, "\n昵称: {}", nickname);
    }
    let passcode = if user.has_passcode() { user.passcode.as_str() } else { "无" };
    let _ = write!(
        text,
        "\n状态: {}\n验证码: {}\n创建时间: {} (UTC)\n更新时间: {} (UTC)",
        user.status,
        passcode,
        format_time(user.created_at),
        format_time(user.updated_at)
    );
    if let Some(expires_at) = user.expires_at {
        let _ = write!(text, "\n过期时间: {} (UTC)", format_time(expires_at));
    }
    if blacklisted {
        text.push_str("\n该用户位于黑名单中。");
    }
    text
}

/// `.check <qq>`: show a user's audit record.
pub struct Check;

static CHECK: CommandSpec = CommandSpec {
    name: "check",
    aliases: &[],
    description: "查询用户状态",
    usage: ".check [QQ号]",
    roles: UserRoles::STAFF,
};

#[async_trait]
impl Command for Check {
    fn spec(&self) -> &'static CommandSpec {
        &CHECK
    }

    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<CommandOutcome> {
        let Some(qq_id) = ctx.qq_arg(0) else {
            return Ok(CommandOutcome::Usage);
        };

        let blacklisted = ctx.data.users.is_blacklisted(qq_id).await;
        let Some(user) = ctx.data.users.get_user(qq_id).await else {
            let text = if blacklisted {
                format!("用户 {} 位于黑名单中。", qq_id)
            } else {
                format!("用户 {} 未在数据存储中找到。", qq_id)
            };
            ctx.reply_at(text).await?;
            return Ok(CommandOutcome::Done);
        };

        let audit_group = ctx.data.config.audit_group_id;
        let nickname = match ctx.data.api.get_group_member_info(audit_group, qq_id).await {
            Ok(member) => member.map(|m| m.display_name().to_string()),
            Err(e) => {
                warn!(qq_id, error = %e, "failed to look up member info");
                None
            }
        };

        ctx.reply(Message::new().text(describe_user(&user, nickname.as_deref(), blacklisted)))
            .await?;
        Ok(CommandOutcome::Done)
    }
}

/// `.add-user <qq>`
pub struct AddUser;

static ADD_USER: CommandSpec = CommandSpec {
    name: "add-user",
    aliases: &[],
    description: "添加用户到待审核列表",
    usage: ".add-user [QQ号]",
    roles: UserRoles::STAFF,
};

#[async_trait]
impl Command for AddUser {
    fn spec(&self) -> &'static CommandSpec {
        &ADD_USER
    }

    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<CommandOutcome> {
        let Some(qq_id) = ctx.qq_arg(0) else {
            return Ok(CommandOutcome::Usage);
        };

        let text = if ctx.data.users.get_user(qq_id).await.is_some() {
            format!("用户 {} 已在待审核列表中。", qq_id)
        } else if ctx.data.users.add_pending_user(qq_id).await {
            format!("成功将用户 {} 添加到待审核列表。", qq_id)
        } else {
            format!("无法添加用户 {}，可能已存在或发生错误。", qq_id)
        };
        ctx.reply_at(text).await?;
        Ok(CommandOutcome::Done)
    }
}

/// `.reset <qq>`: start the user over as pending with all three chances.
pub struct Reset;

static RESET: CommandSpec = CommandSpec {
    name: "reset",
    aliases: &[],
    description: "重置用户状态",
    usage: ".reset [QQ号]",
    roles: UserRoles::STAFF,
};

#[async_trait]
impl Command for Reset {
    fn spec(&self) -> &'static CommandSpec {
        &RESET
    }

    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<CommandOutcome> {
        let Some(qq_id) = ctx.qq_arg(0) else {
            return Ok(CommandOutcome::Usage);
        };

        ctx.data.users.delete_user(qq_id).await;
        let text = if ctx.data.users.add_pending_user(qq_id).await {
            format!("成功将用户 {} 重置为待审核状态。", qq_id)
        } else {
            format!("无法重置用户 {}，可能已存在或发生错误。", qq_id)
        };
        ctx.reply_at(text).await?;
        Ok(CommandOutcome::Done)
    }
}

/// `.rm-user <qq>`
pub struct RemoveUser;

static REMOVE_USER: CommandSpec = CommandSpec {
    name: "rm-user",
    aliases: &[],
    description: "从名单中移除指定的用户",
    usage: ".rm-user [QQ号]",
    roles: UserRoles::STAFF,
};

#[async_trait]
impl Command for RemoveUser {
    fn spec(&self) -> &'static CommandSpec {
        &REMOVE_USER
    }

    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<CommandOutcome> {
        let Some(qq_id) = ctx.qq_arg(0) else {
            return Ok(CommandOutcome::Usage);
        };

        let text = if ctx.data.users.delete_user(qq_id).await {
            "成功将指定的用户从名单中移除！".to_string()
        } else {
            format!("用户 {} 不在名单中。", qq_id)
        };
        ctx.reply_at(text).await?;
        Ok(CommandOutcome::Done)
    }
}

/// `.list-expired`
pub struct ListExpired;

static LIST_EXPIRED: CommandSpec = CommandSpec {
    name: "list-expired",
    aliases: &[],
    description: "列出验证码过期的用户",
    usage: ".list-expired",
    roles: UserRoles::STAFF,
};

#[async_trait]
impl Command for ListExpired {
    fn spec(&self) -> &'static CommandSpec {
        &LIST_EXPIRED
    }

    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<CommandOutcome> {
        let mut expired: Vec<u64> = ctx
            .data
            .store
            .all_users()
            .await
            .into_iter()
            .filter(|user| user.status == AuditStatus::Expired)
            .map(|user| user.qq_id)
            .collect();
        expired.sort_unstable();

        if expired.is_empty() {
            ctx.reply_at("没有验证码过期的用户。").await?;
            return Ok(CommandOutcome::Done);
        }

        let mut text = String::from("以下用户的审核已过期：");
        for qq_id in expired {
            let _ = write!(text, "\n{}", qq_id);
        }
        ctx.reply_at(text).await?;
        Ok(CommandOutcome::Done)
    }
}
