//! `.help` and `.audit-help`.

use super::{Command, CommandContext, CommandOutcome, CommandSpec, UserRoles};
use crate::error::Result;
use async_trait::async_trait;
use std::fmt::Write;

pub struct Help;

static HELP: CommandSpec = CommandSpec {
    name: "help",
    aliases: &["h"],
    description: "显示所有的帮助信息",
    usage: ".help",
    roles: UserRoles::STAFF,
};

#[async_trait]
impl Command for Help {
    fn spec(&self) -> &'static CommandSpec {
        &HELP
    }

    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<CommandOutcome> {
        let mut text = String::from("可用的命令列表:");
        for spec in ctx.dispatcher.specs() {
            let _ = write!(text, "\n- {}: {}", spec.name, spec.description);
            if !spec.usage.is_empty() {
                let _ = write!(text, "\n  用法: {}", spec.usage);
            }
        }
        ctx.reply_at(text).await?;
        Ok(CommandOutcome::Done)
    }
}

/// How auditors pass or deny users.
pub struct AuditHelp;

static AUDIT_HELP: CommandSpec = CommandSpec {
    name: "audit-help",
    aliases: &[],
    description: "查看审核相关命令",
    usage: ".audit-help",
    roles: UserRoles::STAFF,
};

#[async_trait]
impl Command for AuditHelp {
    fn spec(&self) -> &'static CommandSpec {
        &AUDIT_HELP
    }

    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<CommandOutcome> {
        ctx.reply_at(
            "审核员命令:\n\
             @机器人 QQ号 [QQ号 ...] pass - 通过指定用户的审核\n\
             @机器人 QQ号 [QQ号 ...] deny - 拒绝指定用户的审核",
        )
        .await?;
        Ok(CommandOutcome::Done)
    }
}
