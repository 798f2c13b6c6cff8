//! Typed OneBot v11 events.
//!
//! Only the events the bot reacts to are decoded. Everything else (heartbeats,
//! lifecycle, recalls, pokes...) comes back as `None` from [`Event::from_json`].

use super::message::Message;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Role of a member inside a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupRole {
    Owner,
    Admin,
    #[default]
    Member,
}

impl GroupRole {
    /// Owners and admins.
    pub fn is_manager(self) -> bool {
        matches!(self, GroupRole::Owner | GroupRole::Admin)
    }
}

impl<'de> Deserialize<'de> for GroupRole {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let role = Option::<String>::deserialize(deserializer)?;
        Ok(match role.as_deref() {
            Some("owner") => GroupRole::Owner,
            Some("admin") => GroupRole::Admin,
            _ => GroupRole::Member,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupSender {
    #[serde(default)]
    pub user_id: u64,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub card: String,
    #[serde(default)]
    pub role: GroupRole,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupMessageEvent {
    pub message_id: i64,
    pub group_id: u64,
    pub user_id: u64,
    pub message: Message,
    #[serde(default)]
    pub sender: GroupSender,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrivateMessageEvent {
    pub message_id: i64,
    pub user_id: u64,
    pub message: Message,
    /// `friend`, `group` (temporary session) or `other`
    #[serde(default)]
    pub sub_type: String,
}

/// `group_increase` / `group_decrease` notice.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupMemberChange {
    pub group_id: u64,
    pub user_id: u64,
    #[serde(default)]
    pub operator_id: u64,
    /// Increase: `approve` / `invite`. Decrease: `leave` / `kick` / `kick_me`.
    #[serde(default)]
    pub sub_type: String,
}

impl GroupMemberChange {
    pub fn was_kicked(&self) -> bool {
        self.sub_type == "kick"
    }
}

/// Request to join a group.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupJoinRequest {
    pub group_id: u64,
    pub user_id: u64,
    /// Text the applicant typed into the request
    #[serde(default)]
    pub comment: String,
    /// Opaque handle passed back to `set_group_add_request`
    pub flag: String,
    /// `add` or `invite`
    #[serde(default = "default_request_sub_type")]
    pub sub_type: String,
}

fn default_request_sub_type() -> String {
    "add".to_string()
}

#[derive(Debug, Clone)]
pub enum Event {
    GroupMessage(GroupMessageEvent),
    PrivateMessage(PrivateMessageEvent),
    MemberIncrease(GroupMemberChange),
    MemberDecrease(GroupMemberChange),
    JoinRequest(GroupJoinRequest),
}

impl Event {
    /// Decode an event frame. Returns `None` for frames the bot ignores or
    /// cannot decode.
    pub fn from_json(value: Value) -> Option<Event> {
        let kind = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_owned);
        let post_type = kind("post_type")?;

        match post_type.as_str() {
            "message" => match kind("message_type")?.as_str() {
                "group" => serde_json::from_value(value).ok().map(Event::GroupMessage),
                "private" => serde_json::from_value(value).ok().map(Event::PrivateMessage),
                _ => None,
            },
            "notice" => match kind("notice_type")?.as_str() {
                "group_increase" => serde_json::from_value(value).ok().map(Event::MemberIncrease),
                "group_decrease" => serde_json::from_value(value).ok().map(Event::MemberDecrease),
                _ => None,
            },
            "request" => match kind("request_type")?.as_str() {
                "group" => serde_json::from_value(value).ok().map(Event::JoinRequest),
                _ => None,
            },
            _ => None,
        }
    }
}
