//! `@bot <qq> [<qq> ...] pass|deny` issued by auditors in the audit group.

use super::{Flow, MessageHandler};
use crate::error::Result;
use crate::onebot::{GroupMessageEvent, Message, Segment};
use crate::types::Data;
use crate::utils::validation::{parse_qq_id, split_arguments};
use async_trait::async_trait;
use regex::Regex;
use std::fmt::Write;
use tracing::{error, info, warn};

const AUDIT_COMMAND_PATTERN: &str = r"(?i)((?:\d+\s+)+)(pass|deny)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Pass,
    Deny,
}

pub struct AuditCommandHandler {
    pattern: Regex,
}

/// Parse the id list, dropping repeats but keeping the first-seen order.
fn parse_targets(raw: &str) -> Result<Vec<u64>> {
    let mut targets = Vec::new();
    for token in split_arguments(raw) {
        let qq_id = parse_qq_id(token)?;
        if !targets.contains(&qq_id) {
            targets.push(qq_id);
        }
    }
    Ok(targets)
}

impl AuditCommandHandler {
    /// # Errors
    ///
    /// Returns an error if the command pattern fails to compile.
    pub fn new() -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(AUDIT_COMMAND_PATTERN)?,
        })
    }

    /// Extract the targets and verdict from the message text, if it is an
    /// audit command at all.
    fn parse<'t>(&self, text: &'t str) -> Option<(&'t str, Verdict)> {
        let captures = self.pattern.captures(text)?;
        let ids = captures.get(1)?.as_str();
        let verdict = if captures.get(2)?.as_str().eq_ignore_ascii_case("pass") {
            Verdict::Pass
        } else {
            Verdict::Deny
        };
        Some((ids, verdict))
    }
}

#[async_trait]
impl MessageHandler for AuditCommandHandler {
    fn name(&self) -> &'static str {
        "audit-command"
    }

    async fn handle(&self, data: &Data, event: &GroupMessageEvent) -> Result<Flow> {
        if !data.config.is_audit_group(event.group_id) || !data.config.is_auditor(event.user_id) {
            return Ok(Flow::Continue);
        }
        if !matches!(event.message.first(), Some(Segment::At { .. })) {
            return Ok(Flow::Continue);
        }

        let text = event.message.text_content();
        let Some((raw_ids, verdict)) = self.parse(&text) else {
            return Ok(Flow::Continue);
        };
        info!(auditor = event.user_id, content = %text.trim(), "audit command issued");

        let targets = match parse_targets(raw_ids) {
            Ok(targets) => targets,
            Err(e) => {
                warn!(auditor = event.user_id, error = %e, "malformed QQ id in audit command");
                let reply = Message::new()
                    .at(event.user_id)
                    .text("输入的QQ号格式错误，请检查你的输入。\n")
                    .text(format!("错误信息为：{}", e));
                data.api.send_group_msg(event.group_id, &reply).await?;
                return Ok(Flow::Handled);
            }
        };

        let mut failed = Vec::new();
        for &target in &targets {
            let outcome = match verdict {
                Verdict::Pass => data.audit.process_approval(target, event.user_id, event.group_id).await,
                Verdict::Deny => data.audit.process_denial(target, event.user_id, event.group_id).await,
            };
            match outcome {
                Ok(true) => {}
                Ok(false) => failed.push(target),
                Err(e) => {
                    error!(target, error = %e, "failed to process audit target");
                    failed.push(target);
                }
            }
        }

        let summary = if failed.is_empty() {
            match verdict {
                Verdict::Pass => "已通过所有指定用户的审核!".to_string(),
                Verdict::Deny => "已拒绝所有指定用户的审核!".to_string(),
            }
        } else {
            let mut summary = String::from("以下用户处理失败:");
            for qq_id in &failed {
                let _ = write!(summary, "\n{}", qq_id);
            }
            summary
        };
        data.api
            .send_group_msg(event.group_id, &Message::new().at(event.user_id).text(summary))
            .await?;

        Ok(Flow::Handled)
    }
}
