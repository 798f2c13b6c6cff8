//! Recall links posted by plain members.
//!
//! Text inside merged-forward messages counts too, so a link cannot be smuggled
//! in by forwarding it.

use super::{Flow, MessageHandler};
use crate::error::Result;
use crate::onebot::{BotApi, GroupMessageEvent, Message, Segment};
use crate::types::Data;
use async_trait::async_trait;
use regex::Regex;
use std::collections::VecDeque;
use tracing::{info, warn};

const LINK_PATTERN: &str =
    r"(?:https?://)?(?:[a-zA-Z0-9_-]+\.)+[a-zA-Z]{2,6}(?::[0-9]+)?(?:/[^\s]*)?";

/// Nested forwards deeper than this are not fetched.
const MAX_FORWARD_DEPTH: usize = 3;

pub struct LinkBlocker {
    pattern: Regex,
}

impl LinkBlocker {
    /// # Errors
    ///
    /// Returns an error if the link pattern fails to compile.
    pub fn new() -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(LINK_PATTERN)?,
        })
    }

    pub fn contains_link(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

/// Plain text of `message` with forwarded content expanded. Each message goes
/// on its own line.
async fn flatten(api: &dyn BotApi, message: &Message) -> String {
    let mut text = String::new();
    let mut queue = VecDeque::from([(message.clone(), 0usize)]);

    while let Some((message, depth)) = queue.pop_front() {
        for segment in message.segments() {
            match segment {
                Segment::Text { text: t } => text.push_str(t),
                Segment::At { name, .. } => {
                    text.push('@');
                    text.push_str(name.as_deref().unwrap_or_default());
                }
                _ => {}
            }
        }
        if depth < MAX_FORWARD_DEPTH {
            for id in message.forward_ids() {
                match api.get_forward_msg(id).await {
                    Ok(Some(inner)) => queue.extend(inner.into_iter().map(|m| (m, depth + 1))),
                    Ok(None) => {}
                    Err(e) => warn!(forward_id = %id, error = %e, "failed to fetch forwarded message"),
                }
            }
        }
        text.push('\n');
    }

    text
}

#[async_trait]
impl MessageHandler for LinkBlocker {
    fn name(&self) -> &'static str {
        "link-blocker"
    }

    async fn handle(&self, data: &Data, event: &GroupMessageEvent) -> Result<Flow> {
        if event.sender.role.is_manager() || data.is_staff(event.user_id) {
            return Ok(Flow::Continue);
        }

        let text = flatten(data.api.as_ref(), &event.message).await;
        if !self.contains_link(&text) {
            return Ok(Flow::Continue);
        }

        data.api.delete_msg(event.message_id).await?;
        let notice = Message::new()
            .at(event.user_id)
            .text("由于管理员设置，该群禁止发送链接，消息已被删除。");
        data.api.send_group_msg(event.group_id, &notice).await?;

        info!(message_id = event.message_id, group_id = event.group_id, user_id = event.user_id, "recalled message with link");
        Ok(Flow::Handled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onebot::GroupRole;
    use crate::testing::{group_message, test_data, ApiCall, AUDITOR, MAIN_GROUP};
    use tempfile::TempDir;

    #[test]
    fn test_contains_link() {
        let blocker = LinkBlocker::new().unwrap();
        assert!(blocker.contains_link("看看 https://example.com/path?q=1"));
        assert!(blocker.contains_link("www.example.org"));
        assert!(blocker.contains_link("host.example.com:8080/x"));
        assert!(!blocker.contains_link("今天天气不错"));
        assert!(!blocker.contains_link("version 1.2.3"));
    }

    #[tokio::test]
    async fn test_recalls_link_from_member() {
        let dir = TempDir::new().unwrap();
        let (data, api) = test_data(&dir).await;
        let blocker = LinkBlocker::new().unwrap();

        let event = group_message(MAIN_GROUP, 55, GroupRole::Member, Message::new().text("快来 example.com"));
        assert_eq!(blocker.handle(&data, &event).await.unwrap(), Flow::Handled);

        assert_eq!(api.calls()[0], ApiCall::DeleteMsg(event.message_id));
        assert_eq!(
            api.group_texts(MAIN_GROUP),
            vec!["@55由于管理员设置，该群禁止发送链接，消息已被删除。".to_string()]
        );
    }

    #[tokio::test]
    async fn test_allows_admins_and_staff() {
        let dir = TempDir::new().unwrap();
        let (data, api) = test_data(&dir).await;
        let blocker = LinkBlocker::new().unwrap();

        let event = group_message(MAIN_GROUP, 55, GroupRole::Admin, Message::new().text("example.com"));
        assert_eq!(blocker.handle(&data, &event).await.unwrap(), Flow::Continue);

        let event = group_message(MAIN_GROUP, AUDITOR, GroupRole::Member, Message::new().text("example.com"));
        assert_eq!(blocker.handle(&data, &event).await.unwrap(), Flow::Continue);

        let event = group_message(MAIN_GROUP, 55, GroupRole::Member, Message::new().text("hello"));
        assert_eq!(blocker.handle(&data, &event).await.unwrap(), Flow::Continue);

        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_link_inside_forward() {
        let dir = TempDir::new().unwrap();
        let (data, api) = test_data(&dir).await;
        let blocker = LinkBlocker::new().unwrap();
        api.set_forward("outer", vec![Message::new().text("nothing here"), Message::from(vec![Segment::Forward { id: "inner".to_string() }])]);
        api.set_forward("inner", vec![Message::new().text("see https://example.com")]);

        let event = group_message(
            MAIN_GROUP,
            55,
            GroupRole::Member,
            Message::from(vec![Segment::Forward { id: "outer".to_string() }]),
        );
        assert_eq!(blocker.handle(&data, &event).await.unwrap(), Flow::Handled);
        assert!(api.calls().contains(&ApiCall::DeleteMsg(event.message_id)));
    }

    #[tokio::test]
    async fn test_missing_forward_is_ignored() {
        let dir = TempDir::new().unwrap();
        let (data, _api) = test_data(&dir).await;
        let blocker = LinkBlocker::new().unwrap();

        let event = group_message(
            MAIN_GROUP,
            55,
            GroupRole::Member,
            Message::from(vec![Segment::Forward { id: "gone".to_string() }]),
        );
        assert_eq!(blocker.handle(&data, &event).await.unwrap(), Flow::Continue);
    }
}
