pub mod delay;
pub mod help;
pub mod queue;
pub mod retry;
pub mod running;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::admin::AdminList;
use crate::client::ReplySink;
use crate::dispatcher::Dispatcher;
use crate::error::MatcherError;
use crate::history::History;
use crate::matcher::Matcher;
use crate::message::Message;
use crate::running::RunningCommands;

/// Help entry shown by the `help` command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Help {
    pub command: String,
    pub description: String,
    pub examples: Vec<String>,
    pub category: String,
}

impl Help {
    pub fn new(command: &str, description: &str) -> Self {
        Self {
            command: command.to_string(),
            description: description.to_string(),
            ..Default::default()
        }
    }

    pub fn category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }

    pub fn example(mut self, example: &str) -> Self {
        self.examples.push(example.to_string());
        self
    }
}

/// A chat command: one matcher plus its help entries.
pub trait Command: Send + Sync {
    fn matcher(&self) -> Result<Matcher, MatcherError>;

    fn help(&self) -> Vec<Help> {
        Vec::new()
    }
}

/// Everything built-in commands share with the bot runtime
#[derive(Clone)]
pub struct CommandContext {
    pub replies: Arc<dyn ReplySink>,
    pub running: RunningCommands,
    pub history: Arc<History>,
    pub admins: Arc<AdminList>,
    pub inbound: mpsc::UnboundedSender<Message>,
}

impl CommandContext {
    /// Feed a synthesised message back into the bot, like a user typed it.
    pub fn send_internal(&self, origin: &Message, text: &str) {
        let msg = origin.with_text(text);
        if self.inbound.send(msg).is_err() {
            warn!("Bot stopped, dropping internal message: {}", text);
        }
    }
}

/// Built-in commands, in registration order
pub fn builtin_commands(ctx: &CommandContext) -> Vec<Box<dyn Command>> {
    vec![
        Box::new(queue::QueueCommand::new(ctx.clone())),
        Box::new(delay::DelayCommand::new(ctx.clone())),
        Box::new(running::RunningCommandsCommand::new(ctx.clone())),
        Box::new(retry::RetryCommand::new(ctx.clone())),
    ]
}

/// Register `commands` in order, preceded by a `help` command that knows
/// all of them.
pub fn register_commands(
    dispatcher: &mut Dispatcher,
    ctx: &CommandContext,
    commands: Vec<Box<dyn Command>>,
) -> Result<(), MatcherError> {
    let mut entries: Vec<Help> = commands.iter().flat_map(|c| c.help()).collect();
    entries.extend(help::HelpCommand::own_help());

    let help = help::HelpCommand::new(Arc::clone(&ctx.replies), entries);
    dispatcher.register(help.matcher()?);
    for command in &commands {
        dispatcher.register(command.matcher()?);
    }

    info!("Registered {} commands", commands.len() + 1);
    Ok(())
}
