//! Pipeline stage running prefixed admin commands.

use super::{Flow, MessageHandler};
use crate::commands::CommandDispatcher;
use crate::error::Result;
use crate::onebot::GroupMessageEvent;
use crate::types::Data;
use async_trait::async_trait;

pub struct AdminCommandHandler {
    dispatcher: CommandDispatcher,
}

impl AdminCommandHandler {
    pub fn new(dispatcher: CommandDispatcher) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl MessageHandler for AdminCommandHandler {
    fn name(&self) -> &'static str {
        "admin-command"
    }

    async fn handle(&self, data: &Data, event: &GroupMessageEvent) -> Result<Flow> {
        let dispatch = self.dispatcher.dispatch(data, event).await?;
        Ok(if dispatch.passes_through() {
            Flow::Continue
        } else {
            Flow::Handled
        })
    }
}
