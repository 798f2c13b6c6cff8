//! Commands that reconcile the audit list with live group membership.

use super::{Command, CommandContext, CommandOutcome, CommandSpec, UserRoles};
use crate::error::Result;
use crate::onebot::GroupMemberInfo;
use crate::types::Data;
use async_trait::async_trait;
use futures_util::future::join_all;
use std::collections::HashSet;
use std::fmt::Write;
use tracing::{info, warn};

/// Plain members of the audit group, without the bot and staff accounts.
fn candidates<'m>(data: &Data, members: &'m [GroupMemberInfo]) -> impl Iterator<Item = &'m GroupMemberInfo> {
    let staff = data.config.staff_ids();
    members
        .iter()
        .filter(move |m| !m.role.is_manager() && !staff.contains(&m.user_id))
}

/// `.retake`: put audit group members missing from the list back on it.
pub struct Retake;

static RETAKE: CommandSpec = CommandSpec {
    name: "retake",
    aliases: &[],
    description: "将未在名单中的用户重新加入",
    usage: ".retake",
    roles: UserRoles::STAFF,
};

#[async_trait]
impl Command for Retake {
    fn spec(&self) -> &'static CommandSpec {
        &RETAKE
    }

    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<CommandOutcome> {
        let audit_group = ctx.data.config.audit_group_id;
        let members = match ctx.data.api.get_group_member_list(audit_group).await {
            Ok(members) => members,
            Err(e) => {
                warn!(group_id = audit_group, error = %e, "failed to get member list");
                ctx.reply_at("无法获取用户列表，可能是该群组没有成员或发生了错误。").await?;
                return Ok(CommandOutcome::Done);
            }
        };

        let known: HashSet<u64> = ctx.data.store.all_users().await.iter().map(|u| u.qq_id).collect();
        let missing: Vec<u64> = candidates(ctx.data, &members)
            .map(|m| m.user_id)
            .filter(|id| !known.contains(id))
            .collect();

        if missing.is_empty() {
            ctx.reply_at("没有用户需要重新加入。").await?;
            return Ok(CommandOutcome::Done);
        }

        for &qq_id in &missing {
            ctx.data.users.add_pending_user(qq_id).await;
        }
        info!(count = missing.len(), "retook audit group members");

        ctx.reply_at(format!("共有{}个用户被重新加入。", missing.len())).await?;
        Ok(CommandOutcome::Done)
    }
}

/// `.rm-unexist`: drop records of users who left the audit group.
pub struct RemoveUnexist;

static REMOVE_UNEXIST: CommandSpec = CommandSpec {
    name: "rm-unexist",
    aliases: &[],
    description: "移除不存在的用户",
    usage: ".rm-unexist",
    roles: UserRoles::STAFF,
};

#[async_trait]
impl Command for RemoveUnexist {
    fn spec(&self) -> &'static CommandSpec {
        &REMOVE_UNEXIST
    }

    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<CommandOutcome> {
        let audit_group = ctx.data.config.audit_group_id;
        let members = match ctx.data.api.get_group_member_list(audit_group).await {
            // An empty list would wipe every record
            Ok(members) if !members.is_empty() => members,
            Ok(_) => {
                warn!(group_id = audit_group, "member list came back empty");
                ctx.reply_at("无法获取审核群组的用户列表。").await?;
                return Ok(CommandOutcome::Done);
            }
            Err(e) => {
                warn!(group_id = audit_group, error = %e, "failed to get member list");
                ctx.reply_at("无法获取审核群组的用户列表。").await?;
                return Ok(CommandOutcome::Done);
            }
        };

        let present: HashSet<u64> = candidates(ctx.data, &members).map(|m| m.user_id).collect();
        let gone: Vec<u64> = ctx
            .data
            .store
            .all_users()
            .await
            .into_iter()
            .map(|u| u.qq_id)
            .filter(|id| !present.contains(id))
            .collect();

        if gone.is_empty() {
            ctx.reply_at("没有需要移除的用户。").await?;
            return Ok(CommandOutcome::Done);
        }

        for &qq_id in &gone {
            ctx.data.users.delete_user(qq_id).await;
        }
        info!(count = gone.len(), "removed users no longer in the audit group");

        ctx.reply_at(format!(
            "操作完成，已从待审核列表中移除了 {} 名不存在的用户。",
            gone.len()
        ))
        .await?;
        Ok(CommandOutcome::Done)
    }
}

/// `.list-duplicated`: audit group members who already joined a main group.
pub struct ListDuplicated;

static LIST_DUPLICATED: CommandSpec = CommandSpec {
    name: "list-duplicated",
    aliases: &[],
    description: "列出已在大群的用户",
    usage: ".list-duplicated",
    roles: UserRoles::STAFF,
};

#[async_trait]
impl Command for ListDuplicated {
    fn spec(&self) -> &'static CommandSpec {
        &LIST_DUPLICATED
    }

    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<CommandOutcome> {
        let config = &ctx.data.config;

        let lookups = config
            .main_group_ids
            .iter()
            .map(|&group_id| async move { (group_id, ctx.data.api.get_group_member_list(group_id).await) });

        let mut in_main_groups = HashSet::new();
        for (group_id, result) in join_all(lookups).await {
            match result {
                Ok(members) => in_main_groups.extend(members.into_iter().map(|m| m.user_id)),
                Err(e) => warn!(group_id, error = %e, "failed to get main group member list"),
            }
        }

        if in_main_groups.is_empty() {
            ctx.reply_at("获取用户列表时失败。").await?;
            return Ok(CommandOutcome::Done);
        }

        let audit_members = match ctx.data.api.get_group_member_list(config.audit_group_id).await {
            Ok(members) => members,
            Err(e) => {
                warn!(group_id = config.audit_group_id, error = %e, "failed to get member list");
                ctx.reply_at("无法获取审核群组的用户列表。").await?;
                return Ok(CommandOutcome::Done);
            }
        };

        let mut duplicated: Vec<&GroupMemberInfo> = candidates(ctx.data, &audit_members)
            .filter(|m| in_main_groups.contains(&m.user_id))
            .collect();
        duplicated.sort_by_key(|m| m.user_id);

        if duplicated.is_empty() {
            ctx.reply_at("没有找到重复的用户。").await?;
            return Ok(CommandOutcome::Done);
        }

        let mut text = String::from("以下已在大群的用户仍在审核群中:");
        for member in duplicated {
            let _ = write!(text, "\n{} - {}", member.display_name(), member.user_id);
        }
        ctx.reply_at(text).await?;
        Ok(CommandOutcome::Done)
    }
}
