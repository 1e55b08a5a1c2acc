use futures::future::join_all;
use tracing::info;

use crate::error::MatcherError;
use crate::matcher::{Captures, Matcher};
use crate::message::Message;
use crate::running::Completion;

use super::{Command, CommandContext, Help};

/// `queue <command>` / `then <command>`: run a command once everything
/// currently running in the conversation has finished.
pub struct QueueCommand {
    ctx: CommandContext,
}

impl QueueCommand {
    pub fn new(ctx: CommandContext) -> Self {
        Self { ctx }
    }
}

fn queue(ctx: &CommandContext, captures: &Captures, msg: &Message) {
    let command = captures.get_string("command").trim().to_string();
    let key = msg.conversation_key();

    // Only wait for what was running before this command arrived
    let pending: Vec<Completion> = ctx.running.completions_for(&key);
    if pending.is_empty() {
        info!("Nothing running in {}, executing '{}' directly", key, command);
        ctx.send_internal(msg, &command);
        return;
    }

    ctx.replies.send_message(
        msg,
        &format!(
            "I'll execute `{}` after {} running command(s) finished",
            command,
            pending.len()
        ),
    );

    let running = ctx.running.register(key, format!("queue: {command}"));
    let ctx = ctx.clone();
    let msg = msg.clone();
    tokio::spawn(async move {
        join_all(pending.into_iter().map(Completion::wait)).await;
        ctx.send_internal(&msg, &command);
        running.signal_done();
    });
}

impl Command for QueueCommand {
    fn matcher(&self) -> Result<Matcher, MatcherError> {
        let ctx = self.ctx.clone();
        Matcher::regex(r"(?:queue|then) (?P<command>.+)", move |captures, msg| {
            queue(&ctx, captures, msg)
        })
    }

    fn help(&self) -> Vec<Help> {
        vec![Help::new(
            "queue",
            "Executes a command after the running commands of this conversation finished",
        )
        .category("General")
        .example("queue reply deployment is done")
        .example("then retry")]
    }
}
