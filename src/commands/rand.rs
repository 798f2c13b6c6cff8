//! `.rand`: generate a sample passcode.

use super::{Command, CommandContext, CommandOutcome, CommandSpec, UserRoles};
use crate::error::Result;
use crate::onebot::Message;
use crate::utils::passcode::generate_passcode;
use async_trait::async_trait;

pub struct Rand;

static RAND: CommandSpec = CommandSpec {
    name: "rand",
    aliases: &[],
    description: "生成一个随机验证码",
    usage: ".rand",
    roles: UserRoles::STAFF,
};

#[async_trait]
impl Command for Rand {
    fn spec(&self) -> &'static CommandSpec {
        &RAND
    }

    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<CommandOutcome> {
        let passcode = generate_passcode();
        let unique = !ctx.data.store.passcode_exists(&passcode).await;
        ctx.reply(Message::new().text(format!(
            "生成测试验证码: {}\n在当前数据中是否唯一: {}",
            passcode, unique
        )))
        .await?;
        Ok(CommandOutcome::Done)
    }
}
