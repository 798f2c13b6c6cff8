//! Chat commands.
//!
//! Admin commands are plain group messages starting with the configured prefix,
//! e.g. `.check 123456`. Each command declares the roles allowed to run it; a
//! sender holding any of those roles may execute it.

pub mod blacklist;
pub mod help;
pub mod members;
pub mod rand;
pub mod users;

use crate::error::Result;
use crate::onebot::{GroupMessageEvent, Message};
use crate::types::Data;
use crate::utils::validation::{parse_qq_id, split_arguments};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Set of roles a command accepts.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct UserRoles(u8);

impl UserRoles {
    /// Anyone may run the command.
    pub const NONE: UserRoles = UserRoles(1 << 0);
    /// Owner or admin of the group the command was sent in.
    pub const GROUP_ADMIN: UserRoles = UserRoles(1 << 1);
    pub const BOT_ADMIN: UserRoles = UserRoles(1 << 2);
    pub const AUDITOR: UserRoles = UserRoles(1 << 3);

    pub const STAFF: UserRoles = UserRoles(Self::GROUP_ADMIN.0 | Self::BOT_ADMIN.0 | Self::AUDITOR.0);

    pub fn contains(self, other: UserRoles) -> bool {
        self.0 & other.0 == other.0
    }

    /// The roles `event`'s sender holds.
    pub fn of_sender(data: &Data, event: &GroupMessageEvent) -> UserRoles {
        let mut roles = UserRoles::NONE;
        if event.sender.role.is_manager() {
            roles = roles | UserRoles::GROUP_ADMIN;
        }
        if data.config.is_bot_admin(event.user_id) {
            roles = roles | UserRoles::BOT_ADMIN;
        }
        if data.config.is_auditor(event.user_id) {
            roles = roles | UserRoles::AUDITOR;
        }
        roles
    }

    /// Whether a sender holding `held` satisfies any role in `self`.
    pub fn allows(self, held: UserRoles) -> bool {
        self.contains(UserRoles::NONE) || self.0 & held.0 & !UserRoles::NONE.0 != 0
    }
}

impl BitOr for UserRoles {
    type Output = UserRoles;

    fn bitor(self, rhs: UserRoles) -> UserRoles {
        UserRoles(self.0 | rhs.0)
    }
}

impl fmt::Debug for UserRoles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (UserRoles::NONE, "NONE"),
            (UserRoles::GROUP_ADMIN, "GROUP_ADMIN"),
            (UserRoles::BOT_ADMIN, "BOT_ADMIN"),
            (UserRoles::AUDITOR, "AUDITOR"),
        ];
        let held: Vec<&str> = names
            .iter()
            .filter(|(role, _)| self.contains(*role))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "UserRoles({})", held.join(" | "))
    }
}

/// Static description of a command.
#[derive(Debug)]
pub struct CommandSpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub description: &'static str,
    pub usage: &'static str,
    pub roles: UserRoles,
}

/// What a command asks the dispatcher to do after it ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Done,
    /// Arguments were wrong; reply with the usage string
    Usage,
}

/// Everything a command needs while running.
pub struct CommandContext<'a> {
    pub data: &'a Data,
    pub event: &'a GroupMessageEvent,
    /// Arguments after the command name
    pub args: Vec<&'a str>,
    pub dispatcher: &'a CommandDispatcher,
}

impl CommandContext<'_> {
    /// Send `message` to the group the command came from.
    pub async fn reply(&self, message: Message) -> Result<()> {
        self.data.api.send_group_msg(self.event.group_id, &message).await?;
        Ok(())
    }

    /// Reply with `text`, mentioning the sender.
    pub async fn reply_at(&self, text: impl Into<String>) -> Result<()> {
        self.reply(Message::new().at(self.event.user_id).text(text)).await
    }

    /// The argument at `index` parsed as a QQ id.
    pub fn qq_arg(&self, index: usize) -> Option<u64> {
        self.args.get(index).and_then(|arg| parse_qq_id(arg).ok())
    }
}

#[async_trait]
pub trait Command: Send + Sync {
    fn spec(&self) -> &'static CommandSpec;

    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<CommandOutcome>;
}

/// What happened to a message offered to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// No prefix, or nothing after it
    NotACommand,
    /// Prefix present but no such command. `replied` is set when the sender
    /// was told so.
    Unknown { name: String, replied: bool },
    /// Sender lacks the required role. The message still goes on to later
    /// handlers.
    Denied(String),
    Executed(String),
}

impl Dispatch {
    /// Whether later message handlers should still see the message.
    pub fn passes_through(&self) -> bool {
        matches!(
            self,
            Dispatch::NotACommand | Dispatch::Unknown { replied: false, .. } | Dispatch::Denied(_)
        )
    }
}

/// Routes prefixed messages to registered commands.
pub struct CommandDispatcher {
    prefix: char,
    commands: Vec<Arc<dyn Command>>,
    /// Name or alias -> index into `commands`
    index: HashMap<String, usize>,
}

impl CommandDispatcher {
    pub fn new(prefix: char) -> Self {
        Self {
            prefix,
            commands: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Dispatcher with every built-in command registered.
    pub fn with_default_commands(prefix: char) -> Self {
        let mut dispatcher = Self::new(prefix);
        dispatcher.register(help::Help);
        dispatcher.register(help::AuditHelp);
        dispatcher.register(users::Check);
        dispatcher.register(users::AddUser);
        dispatcher.register(users::Reset);
        dispatcher.register(users::RemoveUser);
        dispatcher.register(users::ListExpired);
        dispatcher.register(blacklist::AddBlack);
        dispatcher.register(blacklist::RemoveBlack);
        dispatcher.register(members::Retake);
        dispatcher.register(members::RemoveUnexist);
        dispatcher.register(members::ListDuplicated);
        dispatcher.register(rand::Rand);
        info!(count = dispatcher.commands.len(), "registered commands");
        dispatcher
    }

    /// Register a command under its name and aliases. Names already taken are
    /// skipped with a warning.
    pub fn register(&mut self, command: impl Command + 'static) {
        let spec = command.spec();
        let position = self.commands.len();

        if self.index.contains_key(spec.name) {
            warn!(name = spec.name, "duplicate command, skipped");
            return;
        }
        self.index.insert(spec.name.to_string(), position);

        for alias in spec.aliases {
            let alias = alias.to_lowercase();
            if self.index.contains_key(&alias) {
                warn!(alias = %alias, "duplicate command alias, skipped");
                continue;
            }
            self.index.insert(alias, position);
        }

        self.commands.push(Arc::new(command));
    }

    /// Specs of the registered commands, in registration order.
    pub fn specs(&self) -> impl Iterator<Item = &'static CommandSpec> + '_ {
        self.commands.iter().map(|command| command.spec())
    }

    /// Split `text` into a lower-cased command name and its arguments.
    pub fn parse<'t>(&self, text: &'t str) -> Option<(String, Vec<&'t str>)> {
        let body = text.trim().strip_prefix(self.prefix)?;
        let mut parts = split_arguments(body);
        let name = parts.next()?.to_lowercase();
        Some((name, parts.collect()))
    }

    /// Run the command in `event`, if there is one.
    ///
    /// Permission failures are logged without a reply. Command errors are
    /// logged and reported back to the sender.
    ///
    /// # Errors
    ///
    /// Returns an error only when a reply cannot be sent.
    pub async fn dispatch(&self, data: &Data, event: &GroupMessageEvent) -> Result<Dispatch> {
        let text = event.message.text_content();
        let Some((name, args)) = self.parse(&text) else {
            return Ok(Dispatch::NotACommand);
        };

        let held = UserRoles::of_sender(data, event);

        let Some(command) = self.index.get(&name).map(|&i| &self.commands[i]) else {
            warn!(command = %name, user_id = event.user_id, "command not found");
            // Plain members typing something that looks like a command are left alone
            let replied = held != UserRoles::NONE;
            if replied {
                let reply = Message::new()
                    .at(event.user_id)
                    .text("未知命令：")
                    .text(name.clone());
                data.api.send_group_msg(event.group_id, &reply).await?;
            }
            return Ok(Dispatch::Unknown { name, replied });
        };

        let spec = command.spec();
        info!(command = spec.name, user_id = event.user_id, "command issued");

        if !spec.roles.allows(held) {
            info!(command = spec.name, user_id = event.user_id, roles = ?held, "command not permitted");
            return Ok(Dispatch::Denied(spec.name.to_string()));
        }

        let ctx = CommandContext {
            data,
            event,
            args,
            dispatcher: self,
        };

        match command.execute(&ctx).await {
            Ok(CommandOutcome::Done) => {}
            Ok(CommandOutcome::Usage) => {
                ctx.reply_at(format!("命令执行失败\n使用方法：{}", spec.usage)).await?;
            }
            Err(e) => {
                error!(command = spec.name, error = %e, "command failed");
                ctx.reply_at(format!("命令执行出错：{}", e)).await?;
            }
        }

        Ok(Dispatch::Executed(spec.name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onebot::GroupRole;
    use crate::testing::{group_message, test_data, ADMIN, AUDITOR, AUDIT_GROUP, MAIN_GROUP};
    use tempfile::TempDir;

    #[test]
    fn test_roles() {
        let staff = UserRoles::STAFF;
        assert!(staff.allows(UserRoles::NONE | UserRoles::AUDITOR));
        assert!(staff.allows(UserRoles::NONE | UserRoles::GROUP_ADMIN));
        assert!(!staff.allows(UserRoles::NONE));
        assert!(UserRoles::NONE.allows(UserRoles::NONE));
        assert!(!UserRoles::BOT_ADMIN.allows(UserRoles::NONE | UserRoles::AUDITOR));
        assert_eq!(
            format!("{:?}", UserRoles::BOT_ADMIN | UserRoles::AUDITOR),
            "UserRoles(BOT_ADMIN | AUDITOR)"
        );
    }

    #[test]
    fn test_parse() {
        let dispatcher = CommandDispatcher::new('.');
        assert_eq!(
            dispatcher.parse("  .Check  123 "),
            Some(("check".to_string(), vec!["123"]))
        );
        assert_eq!(dispatcher.parse("."), None);
        assert_eq!(dispatcher.parse("check 123"), None);
        assert_eq!(dispatcher.parse(""), None);
    }

    #[test]
    fn test_default_commands_registered() {
        let dispatcher = CommandDispatcher::with_default_commands('.');
        let names: Vec<_> = dispatcher.specs().map(|s| s.name).collect();
        for name in [
            "help", "check", "add-user", "reset", "rm-user", "add-black", "rm-black",
            "audit-help", "list-expired", "retake", "rm-unexist", "list-duplicated", "rand",
        ] {
            assert!(names.contains(&name), "missing command {}", name);
        }
        assert!(dispatcher.specs().all(|s| s.roles == UserRoles::STAFF));
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let dir = TempDir::new().unwrap();
        let (data, api) = test_data(&dir).await;
        let dispatcher = CommandDispatcher::with_default_commands('.');

        let event = group_message(AUDIT_GROUP, AUDITOR, GroupRole::Member, Message::new().text(".nope"));
        let result = dispatcher.dispatch(&data, &event).await.unwrap();
        assert_eq!(result, Dispatch::Unknown { name: "nope".to_string(), replied: true });
        assert!(api.group_texts(AUDIT_GROUP)[0].contains("未知命令：nope"));

        // Plain members get no reply and the message passes on
        let event = group_message(MAIN_GROUP, 55, GroupRole::Member, Message::new().text(".nope"));
        let result = dispatcher.dispatch(&data, &event).await.unwrap();
        assert!(result.passes_through());
        assert!(api.group_texts(MAIN_GROUP).is_empty());
    }

    #[tokio::test]
    async fn test_permission_denied_is_silent_and_passes_on() {
        let dir = TempDir::new().unwrap();
        let (data, api) = test_data(&dir).await;
        let dispatcher = CommandDispatcher::with_default_commands('.');

        let event = group_message(MAIN_GROUP, 55, GroupRole::Member, Message::new().text(".rm-user 1"));
        let result = dispatcher.dispatch(&data, &event).await.unwrap();

        assert_eq!(result, Dispatch::Denied("rm-user".to_string()));
        assert!(result.passes_through());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_usage_reply() {
        let dir = TempDir::new().unwrap();
        let (data, api) = test_data(&dir).await;
        let dispatcher = CommandDispatcher::with_default_commands('.');

        let event = group_message(AUDIT_GROUP, ADMIN, GroupRole::Member, Message::new().text(".check abc"));
        let result = dispatcher.dispatch(&data, &event).await.unwrap();

        assert_eq!(result, Dispatch::Executed("check".to_string()));
        let reply = &api.group_texts(AUDIT_GROUP)[0];
        assert!(reply.contains("使用方法：.check [QQ号]"));
    }

    #[tokio::test]
    async fn test_group_admin_may_run_commands() {
        let dir = TempDir::new().unwrap();
        let (data, api) = test_data(&dir).await;
        let dispatcher = CommandDispatcher::with_default_commands('.');

        let event = group_message(MAIN_GROUP, 77, GroupRole::Owner, Message::new().text(".add-black 123"));
        dispatcher.dispatch(&data, &event).await.unwrap();

        assert!(data.users.is_blacklisted(123).await);
        assert_eq!(api.group_texts(MAIN_GROUP).len(), 1);
    }
}
