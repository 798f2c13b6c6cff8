//! Shared fixtures for unit tests.

use crate::config::Config;
use crate::error::{Result, TreePassError};
use crate::onebot::{
    BotApi, GroupMemberInfo, GroupMessageEvent, GroupRole, GroupSender, Message,
};
use crate::store::JsonDataStore;
use crate::types::Data;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const BOT: u64 = 10_000;
pub const AUDIT_GROUP: u64 = 1_000;
pub const MAIN_GROUP: u64 = 2_000;
pub const OTHER_MAIN_GROUP: u64 = 2_001;
pub const AUDITOR: u64 = 20_000;
pub const ADMIN: u64 = 30_000;

pub fn test_config() -> Config {
    Config {
        bot_qq_id: BOT,
        audit_group_id: AUDIT_GROUP,
        main_group_ids: vec![MAIN_GROUP, OTHER_MAIN_GROUP],
        auditor_qq_ids: vec![AUDITOR],
        admin_qq_ids: vec![ADMIN],
        questionnaire_link: Some("https://example.com/form".to_string()),
        data_file: "unused.json".to_string(),
        onebot_api_url: "http://127.0.0.1:3000".to_string(),
        onebot_ws_url: "ws://127.0.0.1:3001".to_string(),
        onebot_access_token: None,
        passcode_ttl: Duration::from_secs(600),
        command_prefix: '.',
        link_blocker: true,
    }
}

/// An action the fake client was asked to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    GroupMsg { group_id: u64, message: Message },
    PrivateMsg { user_id: u64, message: Message },
    DeleteMsg(i64),
    Kick { group_id: u64, user_id: u64 },
    AddRequest { flag: String, approve: bool, reason: Option<String> },
}

/// In-memory [`BotApi`] that records every call.
#[derive(Default)]
pub struct FakeBotApi {
    calls: Mutex<Vec<ApiCall>>,
    next_message_id: AtomicI64,
    members: Mutex<HashMap<u64, Vec<GroupMemberInfo>>>,
    forwards: Mutex<HashMap<String, Vec<Message>>>,
    failing_member_lists: Mutex<HashSet<u64>>,
    fail_kicks: AtomicBool,
}

impl FakeBotApi {
    fn record(&self, call: ApiCall) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Rendered text of every message sent to `group_id`.
    pub fn group_texts(&self, group_id: u64) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ApiCall::GroupMsg { group_id: g, message } if g == group_id => Some(message.to_string()),
                _ => None,
            })
            .collect()
    }

    pub fn private_texts(&self, user_id: u64) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ApiCall::PrivateMsg { user_id: u, message } if u == user_id => Some(message.to_string()),
                _ => None,
            })
            .collect()
    }

    /// `(flag, approve, reason)` of every answered join request.
    pub fn join_answers(&self) -> Vec<(String, bool, Option<String>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ApiCall::AddRequest { flag, approve, reason } => Some((flag, approve, reason)),
                _ => None,
            })
            .collect()
    }

    pub fn set_members(&self, group_id: u64, members: &[(u64, GroupRole)]) {
        let members = members
            .iter()
            .map(|&(user_id, role)| GroupMemberInfo {
                group_id,
                user_id,
                nickname: format!("user{}", user_id),
                card: String::new(),
                role,
            })
            .collect();
        self.members.lock().unwrap().insert(group_id, members);
    }

    pub fn set_forward(&self, id: &str, messages: Vec<Message>) {
        self.forwards.lock().unwrap().insert(id.to_string(), messages);
    }

    pub fn fail_member_list(&self, group_id: u64) {
        self.failing_member_lists.lock().unwrap().insert(group_id);
    }

    pub fn fail_kicks(&self) {
        self.fail_kicks.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl BotApi for FakeBotApi {
    async fn send_group_msg(&self, group_id: u64, message: &Message) -> Result<i64> {
        self.record(ApiCall::GroupMsg { group_id, message: message.clone() });
        Ok(self.next_message_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn send_private_msg(&self, user_id: u64, message: &Message) -> Result<i64> {
        self.record(ApiCall::PrivateMsg { user_id, message: message.clone() });
        Ok(self.next_message_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn delete_msg(&self, message_id: i64) -> Result<()> {
        self.record(ApiCall::DeleteMsg(message_id));
        Ok(())
    }

    async fn set_group_kick(&self, group_id: u64, user_id: u64, _reject_add_request: bool) -> Result<()> {
        self.record(ApiCall::Kick { group_id, user_id });
        if self.fail_kicks.load(Ordering::SeqCst) {
            return Err(TreePassError::OneBotApi("set_group_kick failed (retcode 102): no permission".to_string()));
        }
        Ok(())
    }

    async fn set_group_add_request(
        &self,
        flag: &str,
        _sub_type: &str,
        approve: bool,
        reason: Option<&str>,
    ) -> Result<()> {
        self.record(ApiCall::AddRequest {
            flag: flag.to_string(),
            approve,
            reason: reason.map(str::to_string),
        });
        Ok(())
    }

    async fn get_group_member_info(&self, group_id: u64, user_id: u64) -> Result<Option<GroupMemberInfo>> {
        Ok(self
            .members
            .lock()
            .unwrap()
            .get(&group_id)
            .and_then(|members| members.iter().find(|m| m.user_id == user_id).cloned()))
    }

    async fn get_group_member_list(&self, group_id: u64) -> Result<Vec<GroupMemberInfo>> {
        if self.failing_member_lists.lock().unwrap().contains(&group_id) {
            return Err(TreePassError::OneBotApi("get_group_member_list failed".to_string()));
        }
        Ok(self.members.lock().unwrap().get(&group_id).cloned().unwrap_or_default())
    }

    async fn get_forward_msg(&self, forward_id: &str) -> Result<Option<Vec<Message>>> {
        Ok(self.forwards.lock().unwrap().get(forward_id).cloned())
    }
}

/// Application data over a fresh store in `dir` and a [`FakeBotApi`].
pub async fn test_data(dir: &TempDir) -> (Arc<Data>, Arc<FakeBotApi>) {
    let store = JsonDataStore::open(dir.path().join("bot_data.json")).await.unwrap();
    let api = Arc::new(FakeBotApi::default());
    let data = Data::new(test_config(), Arc::new(store), api.clone());
    (Arc::new(data), api)
}

pub fn group_message(group_id: u64, user_id: u64, role: GroupRole, message: Message) -> GroupMessageEvent {
    GroupMessageEvent {
        message_id: 4_000,
        group_id,
        user_id,
        message,
        sender: GroupSender {
            user_id,
            nickname: format!("user{}", user_id),
            card: String::new(),
            role,
        },
    }
}
