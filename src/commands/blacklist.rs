//! `.add-black` and `.rm-black`.

use super::{Command, CommandContext, CommandOutcome, CommandSpec, UserRoles};
use crate::error::Result;
use async_trait::async_trait;

pub struct AddBlack;

static ADD_BLACK: CommandSpec = CommandSpec {
    name: "add-black",
    aliases: &["ban"],
    description: "将指定的用户添加进黑名单",
    usage: ".add-black [QQ号]",
    roles: UserRoles::STAFF,
};

#[async_trait]
impl Command for AddBlack {
    fn spec(&self) -> &'static CommandSpec {
        &ADD_BLACK
    }

    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<CommandOutcome> {
        let Some(qq_id) = ctx.qq_arg(0) else {
            return Ok(CommandOutcome::Usage);
        };

        let text = if ctx.data.users.add_to_blacklist(qq_id).await {
            format!("成功将用户 {} 添加到黑名单。", qq_id)
        } else {
            format!("用户 {} 已在黑名单中。", qq_id)
        };
        ctx.reply_at(text).await?;
        Ok(CommandOutcome::Done)
    }
}

pub struct RemoveBlack;

static REMOVE_BLACK: CommandSpec = CommandSpec {
    name: "rm-black",
    aliases: &["unban"],
    description: "将指定的用户从黑名单中移除",
    usage: ".rm-black [QQ号]",
    roles: UserRoles::STAFF,
};

#[async_trait]
impl Command for RemoveBlack {
    fn spec(&self) -> &'static CommandSpec {
        &REMOVE_BLACK
    }

    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<CommandOutcome> {
        let Some(qq_id) = ctx.qq_arg(0) else {
            return Ok(CommandOutcome::Usage);
        };

        let text = if ctx.data.users.remove_from_blacklist(qq_id).await {
            format!("成功将用户 {} 从黑名单中移除。", qq_id)
        } else {
            format!("用户 {} 不在黑名单中。", qq_id)
        };
        ctx.reply_at(text).await?;
        Ok(CommandOutcome::Done)
    }
}
