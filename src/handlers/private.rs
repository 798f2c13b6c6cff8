//! Private chats get a fixed reply.

use crate::error::Result;
use crate::onebot::{Message, PrivateMessageEvent};
use crate::types::Data;
use tracing::info;

pub const AUTO_REPLY: &str = "此账户为机器人账户，反馈问题请咨询其他管理。";

pub async fn on_private_message(data: &Data, event: &PrivateMessageEvent) -> Result<()> {
    info!(user_id = event.user_id, content = %event.message, "new private message");
    if event.user_id == data.config.bot_qq_id {
        return Ok(());
    }
    data.api
        .send_private_msg(event.user_id, &Message::new().text(AUTO_REPLY))
        .await?;
    Ok(())
}
