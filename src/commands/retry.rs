use crate::error::MatcherError;
use crate::matcher::Matcher;
use crate::message::Message;

use super::{Command, CommandContext, Help};

const TRIGGERS: [&str; 2] = ["retry", "repeat"];

/// `retry` replays the previous human message of the conversation
pub struct RetryCommand {
    ctx: CommandContext,
}

impl RetryCommand {
    pub fn new(ctx: CommandContext) -> Self {
        Self { ctx }
    }
}

fn is_trigger(text: &str) -> bool {
    TRIGGERS
        .iter()
        .any(|trigger| text.trim().eq_ignore_ascii_case(trigger))
}

fn retry(ctx: &CommandContext, msg: &Message) {
    let previous = ctx
        .history
        .last_matching(&msg.conversation_key(), |old| !is_trigger(&old.text));

    match previous {
        Some(previous) => {
            ctx.replies
                .send_message(msg, &format!("Executing command: {}", previous.text));
            ctx.send_internal(msg, &previous.text);
        }
        None => ctx
            .replies
            .send_message(msg, "Sorry, no history found."),
    }
}

impl Command for RetryCommand {
    fn matcher(&self) -> Result<Matcher, MatcherError> {
        Ok(Matcher::group(TRIGGERS.map(|trigger| {
            let ctx = self.ctx.clone();
            Matcher::text(trigger, move |_, msg| retry(&ctx, msg))
        })))
    }

    fn help(&self) -> Vec<Help> {
        vec![Help::new("retry", "Repeats the last command you executed")
            .category("General")
            .example("retry")
            .example("repeat")]
    }
}
