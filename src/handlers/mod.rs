//! Event handlers.
//!
//! [`EventRouter`] takes decoded OneBot events and hands each one to the
//! matching handler. Group messages go through an ordered [`MessagePipeline`]
//! where each stage either handles the message or passes it on.

pub mod admin_command;
pub mod audit_command;
pub mod link_blocker;
pub mod member;
pub mod private;
pub mod request;

use crate::commands::CommandDispatcher;
use crate::error::Result;
use crate::onebot::{Event, GroupMessageEvent};
use crate::types::Data;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error};

/// Whether a pipeline stage consumed the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Handled,
    Continue,
}

#[async_trait]
pub trait MessageHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, data: &Data, event: &GroupMessageEvent) -> Result<Flow>;
}

/// Ordered chain of message handlers.
#[derive(Default)]
pub struct MessagePipeline {
    handlers: Vec<Box<dyn MessageHandler>>,
}

impl MessagePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, handler: impl MessageHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Offer `event` to each stage in order until one handles it. A failing
    /// stage is logged and ends the chain.
    pub async fn run(&self, data: &Data, event: &GroupMessageEvent) {
        for handler in &self.handlers {
            match handler.handle(data, event).await {
                Ok(Flow::Handled) => {
                    debug!(handler = handler.name(), message_id = event.message_id, "message handled");
                    return;
                }
                Ok(Flow::Continue) => {}
                Err(e) => {
                    error!(handler = handler.name(), message_id = event.message_id, error = %e, "message handler failed");
                    return;
                }
            }
        }
    }
}

/// Dispatches events to their handlers.
pub struct EventRouter {
    data: Arc<Data>,
    pipeline: MessagePipeline,
}

impl EventRouter {
    /// Build the router with the standard message pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if a handler's pattern fails to compile.
    pub fn new(data: Arc<Data>) -> Result<Self> {
        let dispatcher = CommandDispatcher::with_default_commands(data.config.command_prefix);
        let mut pipeline = MessagePipeline::new()
            .with(audit_command::AuditCommandHandler::new()?)
            .with(admin_command::AdminCommandHandler::new(dispatcher));
        if data.config.link_blocker {
            pipeline = pipeline.with(link_blocker::LinkBlocker::new()?);
        }
        Ok(Self { data, pipeline })
    }

    pub fn data(&self) -> &Arc<Data> {
        &self.data
    }

    pub async fn handle(&self, event: Event) {
        let data = self.data.as_ref();
        let result = match event {
            Event::GroupMessage(event) => {
                // Groups outside the configured set are not ours to manage
                if data.config.is_audit_group(event.group_id) || data.config.is_main_group(event.group_id) {
                    self.pipeline.run(data, &event).await;
                }
                Ok(())
            }
            Event::PrivateMessage(event) => private::on_private_message(data, &event).await,
            Event::MemberIncrease(change) => member::on_member_increase(data, &change).await,
            Event::MemberDecrease(change) => member::on_member_decrease(data, &change).await,
            Event::JoinRequest(request) => request::on_join_request(data, &request).await,
        };

        if let Err(e) = result {
            error!(error = %e, "event handler failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onebot::{GroupRole, Message};
    use crate::testing::{group_message, test_data, ApiCall, AUDITOR, AUDIT_GROUP, MAIN_GROUP};
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_routes_commands_and_links() {
        let dir = TempDir::new().unwrap();
        let (data, api) = test_data(&dir).await;
        let router = EventRouter::new(data.clone()).unwrap();

        // Unknown command from a plain member falls through to the link blocker
        let event = group_message(MAIN_GROUP, 55, GroupRole::Member, Message::new().text(".go example.com"));
        router.handle(Event::GroupMessage(event)).await;
        assert!(api.calls().contains(&ApiCall::DeleteMsg(4_000)));

        // A known command is consumed before the link blocker sees it
        let event = group_message(AUDIT_GROUP, AUDITOR, GroupRole::Member, Message::new().text(".check 1"));
        router.handle(Event::GroupMessage(event)).await;
        assert_eq!(api.calls().iter().filter(|c| matches!(c, ApiCall::DeleteMsg(_))).count(), 1);
    }

    #[tokio::test]
    async fn test_command_from_plain_member_still_checked_for_links() {
        let dir = TempDir::new().unwrap();
        let (data, api) = test_data(&dir).await;
        let router = EventRouter::new(data).unwrap();

        let event = group_message(
            MAIN_GROUP,
            55,
            GroupRole::Member,
            Message::new().text(".help https://spam.example.com"),
        );
        router.handle(Event::GroupMessage(event)).await;

        assert!(api.calls().contains(&ApiCall::DeleteMsg(4_000)));
        assert_eq!(
            api.group_texts(MAIN_GROUP),
            vec!["@55由于管理员设置，该群禁止发送链接，消息已被删除。".to_string()]
        );
    }

    #[tokio::test]
    async fn test_ignores_unmanaged_groups() {
        let dir = TempDir::new().unwrap();
        let (data, api) = test_data(&dir).await;
        let router = EventRouter::new(data).unwrap();

        let event = group_message(777, 55, GroupRole::Member, Message::new().text("see example.com"));
        router.handle(Event::GroupMessage(event)).await;
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_routes_decoded_frames() {
        let dir = TempDir::new().unwrap();
        let (data, api) = test_data(&dir).await;
        let router = EventRouter::new(data.clone()).unwrap();

        let frame = json!({
            "post_type": "notice",
            "notice_type": "group_increase",
            "sub_type": "approve",
            "group_id": AUDIT_GROUP,
            "user_id": 321,
            "operator_id": 0
        });
        router.handle(Event::from_json(frame).unwrap()).await;

        assert!(router.data().users.get_user(321).await.is_some());
        assert_eq!(api.group_texts(AUDIT_GROUP).len(), 1);
    }

    struct Failing;

    #[async_trait]
    impl MessageHandler for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn handle(&self, _data: &Data, _event: &GroupMessageEvent) -> Result<Flow> {
            Err(crate::error::TreePassError::OneBotApi("boom".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failing_stage_ends_chain() {
        let dir = TempDir::new().unwrap();
        let (data, api) = test_data(&dir).await;
        let pipeline = MessagePipeline::new()
            .with(Failing)
            .with(link_blocker::LinkBlocker::new().unwrap());

        let event = group_message(MAIN_GROUP, 55, GroupRole::Member, Message::new().text("example.com"));
        pipeline.run(&data, &event).await;

        assert!(api.calls().is_empty());
    }
}
