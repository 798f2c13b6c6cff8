//! Actions the bot performs against the QQ client.

use super::event::GroupRole;
use super::message::Message;
use crate::error::Result;
use async_trait::async_trait;
use serde::Deserialize;

/// Member entry from `get_group_member_info` / `get_group_member_list`.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupMemberInfo {
    pub group_id: u64,
    pub user_id: u64,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub card: String,
    #[serde(default)]
    pub role: GroupRole,
}

impl GroupMemberInfo {
    /// Group card if set, nickname otherwise.
    pub fn display_name(&self) -> &str {
        if self.card.is_empty() {
            &self.nickname
        } else {
            &self.card
        }
    }
}

/// OneBot v11 actions used by the bot.
///
/// The production implementation is [`HttpBotApi`](super::HttpBotApi); tests
/// substitute an in-memory recorder.
#[async_trait]
pub trait BotApi: Send + Sync {
    /// Returns the id of the sent message.
    async fn send_group_msg(&self, group_id: u64, message: &Message) -> Result<i64>;

    /// Returns the id of the sent message.
    async fn send_private_msg(&self, user_id: u64, message: &Message) -> Result<i64>;

    /// Recall a message.
    async fn delete_msg(&self, message_id: i64) -> Result<()>;

    async fn set_group_kick(&self, group_id: u64, user_id: u64, reject_add_request: bool) -> Result<()>;

    /// Answer a join request identified by its `flag`.
    async fn set_group_add_request(
        &self,
        flag: &str,
        sub_type: &str,
        approve: bool,
        reason: Option<&str>,
    ) -> Result<()>;

    /// `None` if the user is not in the group.
    async fn get_group_member_info(&self, group_id: u64, user_id: u64) -> Result<Option<GroupMemberInfo>>;

    async fn get_group_member_list(&self, group_id: u64) -> Result<Vec<GroupMemberInfo>>;

    /// Messages inside a merged-forward segment, `None` if it cannot be fetched.
    async fn get_forward_msg(&self, forward_id: &str) -> Result<Option<Vec<Message>>>;
}
