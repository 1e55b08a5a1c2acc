use std::sync::Arc;

use crate::error::MatcherError;
use crate::matcher::{Captures, Matcher};
use crate::message::Message;

use super::{Command, CommandContext, Help};

/// Shows which commands are still running
pub struct RunningCommandsCommand {
    ctx: CommandContext,
}

impl RunningCommandsCommand {
    pub fn new(ctx: CommandContext) -> Self {
        Self { ctx }
    }
}

fn list_conversation(ctx: &CommandContext, msg: &Message) {
    let labels = ctx.running.labels_for(&msg.conversation_key());
    let total = ctx.running.count_running();

    let text = if labels.is_empty() {
        format!("No command is running here ({total} running in total)")
    } else {
        let mut text = format!(
            "{} command(s) running here ({} in total):\n",
            labels.len(),
            total
        );
        for label in labels {
            text.push_str(&format!("  - {label}\n"));
        }
        text
    };
    ctx.replies.send_message(msg, &text);
}

fn list_all(ctx: &CommandContext, msg: &Message) {
    let entries = ctx.running.all_labels();
    let mut text = format!("{} command(s) running:\n", entries.len());
    for (key, label) in entries {
        text.push_str(&format!("  - {label} ({key})\n"));
    }
    ctx.replies.send_message(msg, &text);
}

impl Command for RunningCommandsCommand {
    fn matcher(&self) -> Result<Matcher, MatcherError> {
        let (ctx, all_ctx) = (self.ctx.clone(), self.ctx.clone());
        let list = Arc::new(move |_: &Captures, msg: &Message| list_conversation(&ctx, msg));

        Ok(Matcher::group([
            Matcher::admin(
                self.ctx.admins.clone(),
                Arc::clone(&self.ctx.replies),
                Matcher::text("list all running commands", move |_, msg| {
                    list_all(&all_ctx, msg)
                }),
            ),
            Matcher::Text {
                phrase: "list running commands".to_string(),
                runner: list.clone(),
            },
            Matcher::Text {
                phrase: "list queue".to_string(),
                runner: list,
            },
        ]))
    }

    fn help(&self) -> Vec<Help> {
        vec![
            Help::new("list running commands", "Lists the commands still running here")
                .category("General")
                .example("list queue"),
            Help::new(
                "list all running commands",
                "Lists running commands of every conversation (admins only)",
            )
            .category("General"),
        ]
    }
}
