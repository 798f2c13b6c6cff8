//! Type definitions shared by the handlers.

use crate::config::Config;
use crate::onebot::BotApi;
use crate::services::{AuditService, UserService};
use crate::store::JsonDataStore;
use std::sync::Arc;

/// Bot application data shared by every handler and command.
pub struct Data {
    pub config: Config,
    pub store: Arc<JsonDataStore>,
    /// OneBot action client
    pub api: Arc<dyn BotApi>,
    pub users: UserService,
    pub audit: AuditService,
}

impl Data {
    /// Wire the services on top of a store and an action client.
    pub fn new(config: Config, store: Arc<JsonDataStore>, api: Arc<dyn BotApi>) -> Self {
        let users = UserService::new(store.clone(), config.passcode_ttl);
        let audit = AuditService::new(users.clone(), store.clone(), api.clone());
        Self {
            config,
            store,
            api,
            users,
            audit,
        }
    }

    /// Whether `qq_id` is the bot, a bot admin or an auditor.
    pub fn is_staff(&self, qq_id: u64) -> bool {
        qq_id == self.config.bot_qq_id || self.config.is_bot_admin(qq_id) || self.config.is_auditor(qq_id)
    }
}
