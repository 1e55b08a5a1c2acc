use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::admin::AdminList;
use crate::client::ReplySink;
use crate::commands::{self, Command, CommandContext};
use crate::config::BotConfig;
use crate::dispatcher::Dispatcher;
use crate::history::History;
use crate::message::Message;
use crate::running::RunningCommands;

/// Owns the dispatcher and consumes the inbound message queue.
///
/// Platforms and commands push messages through [`Bot::sender`]; messages
/// are dispatched one by one in arrival order.
pub struct Bot {
    config: BotConfig,
    dispatcher: Dispatcher,
    ctx: CommandContext,
    inbound: mpsc::UnboundedReceiver<Message>,
}

impl Bot {
    pub fn new(config: BotConfig, replies: Arc<dyn ReplySink>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let ctx = CommandContext {
            replies: Arc::clone(&replies),
            running: RunningCommands::new(),
            history: Arc::new(History::new(config.history_size)),
            admins: Arc::new(AdminList::new(config.admins.iter().cloned())),
            inbound: tx,
        };

        Self {
            config,
            dispatcher: Dispatcher::new(replies),
            ctx,
            inbound: rx,
        }
    }

    /// Register the built-in commands followed by `extra`, behind `help`.
    pub fn register_commands(&mut self, extra: Vec<Box<dyn Command>>) -> Result<()> {
        let mut all = commands::builtin_commands(&self.ctx);
        all.extend(extra);
        commands::register_commands(&mut self.dispatcher, &self.ctx, all)?;
        Ok(())
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<Message> {
        self.ctx.inbound.clone()
    }

    pub fn context(&self) -> &CommandContext {
        &self.ctx
    }

    pub fn running(&self) -> &RunningCommands {
        &self.ctx.running
    }

    /// Dispatch one message. Returns whether a command handled it.
    pub fn handle_message(&self, msg: &Message) -> bool {
        if msg.text.trim().is_empty() {
            return false;
        }

        self.ctx.history.record(msg);
        let handled = self.dispatcher.dispatch(msg);
        if !handled {
            info!("No command matched message from {}: {}", msg.user, msg.text);
            if self.config.reply_unknown_command && !msg.internal {
                self.ctx.replies.send_message(
                    msg,
                    &format!(
                        "Oops! Command `{}` not found...try `help`.",
                        msg.text.trim()
                    ),
                );
            }
        }
        handled
    }

    /// Process messages until `shutdown` resolves, then wait for running
    /// commands to finish.
    pub async fn run<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!("Bot is running with {} matchers", self.dispatcher.len());
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                msg = self.inbound.recv() => match msg {
                    Some(msg) => {
                        self.handle_message(&msg);
                    }
                    None => break,
                },
            }
        }

        let limit = Duration::from_secs(self.config.shutdown_timeout_secs);
        wait_for_running(self.ctx.running.clone(), limit).await;
        Ok(())
    }
}

/// Resolve when `signal` reports a shutdown request. A signal listener
/// that fails never resolves, so the bot keeps running until killed.
pub async fn shutdown_signal<F, E>(signal: F)
where
    F: Future<Output = std::result::Result<(), E>>,
    E: std::fmt::Display,
{
    if let Err(e) = signal.await {
        error!("Failed to listen for shutdown signal, running until killed: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn wait_for_running(running: RunningCommands, limit: Duration) {
    let count = running.count_running();
    if count == 0 {
        return;
    }

    info!("Waiting for {} running command(s) to finish", count);
    match tokio::time::timeout(limit, running.wait_for_all_done()).await {
        Ok(()) => info!("All running commands finished"),
        Err(_) => warn!(
            "Shutdown timeout elapsed, {} command(s) still running",
            running.count_running()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::RecordingSink;
    use crate::dispatcher::COMMAND_FAILED;
    use crate::error::MatcherError;
    use crate::matcher::{Matcher, FULL_MATCH};

    struct EchoCommand {
        replies: Arc<dyn ReplySink>,
    }

    impl Command for EchoCommand {
        fn matcher(&self) -> Result<Matcher, MatcherError> {
            let replies = Arc::clone(&self.replies);
            Ok(Matcher::prefix("reply", move |captures, msg| {
                replies.send_message(msg, captures.get_string(FULL_MATCH))
            }))
        }
    }

    struct BrokenCommand;

    impl Command for BrokenCommand {
        fn matcher(&self) -> Result<Matcher, MatcherError> {
            Ok(Matcher::text("explode", |_, _| panic!("broken command")))
        }
    }

    fn bot(config: BotConfig) -> (Bot, Arc<RecordingSink>) {
        let replies = Arc::new(RecordingSink::new());
        let mut bot = Bot::new(config, replies.clone());
        bot.register_commands(vec![
            Box::new(EchoCommand {
                replies: replies.clone(),
            }),
            Box::new(BrokenCommand),
        ])
        .unwrap();
        (bot, replies)
    }

    #[test]
    fn test_unknown_command_reply() {
        let (bot, replies) = bot(BotConfig::default());
        assert!(!bot.handle_message(&Message::new("chat", "user", "dance")));
        assert!(replies.texts()[0].contains("Command `dance` not found"));

        // Internal messages never get the hint
        let internal = Message::new("chat", "user", "x").with_text("dance");
        assert!(!bot.handle_message(&internal));
        assert_eq!(replies.texts().len(), 1);
    }

    #[test]
    fn test_unknown_command_reply_disabled() {
        let config = BotConfig {
            reply_unknown_command: false,
            ..Default::default()
        };
        let (bot, replies) = bot(config);
        assert!(!bot.handle_message(&Message::new("chat", "user", "dance")));
        assert!(replies.texts().is_empty());
    }

    #[test]
    fn test_failing_command_keeps_bot_alive() {
        let (bot, replies) = bot(BotConfig::default());
        assert!(bot.handle_message(&Message::new("chat", "user", "explode")));
        assert!(bot.handle_message(&Message::new("chat", "user", "reply still here")));

        let texts = replies.texts();
        assert!(texts[0].contains(COMMAND_FAILED));
        assert_eq!(texts[1], "still here");
    }

    #[test]
    fn test_history_records_human_messages_only() {
        let (bot, _replies) = bot(BotConfig::default());
        let msg = Message::new("chat", "user", "reply one");
        bot.handle_message(&msg);
        bot.handle_message(&msg.with_text("reply two"));

        let last = bot
            .context()
            .history
            .last_matching(&msg.conversation_key(), |_| true)
            .unwrap();
        assert_eq!(last.text, "reply one");
    }

    #[tokio::test]
    async fn test_run_processes_internal_messages_until_shutdown() {
        let (bot, replies) = bot(BotConfig::default());
        let sender = bot.sender();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(bot.run(async {
            let _ = stop_rx.await;
        }));

        sender
            .send(Message::new("chat", "user", "queue reply queued"))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(replies.texts(), vec!["queued".to_string()]);

        stop_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_signal() {
        tokio::time::timeout(
            Duration::from_millis(50),
            shutdown_signal(async { Ok::<(), std::io::Error>(()) }),
        )
        .await
        .unwrap();

        // A broken listener must not stop the bot
        let broken = shutdown_signal(async { Err::<(), _>("no signal handler") });
        assert!(tokio::time::timeout(Duration::from_millis(50), broken)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_running_commands() {
        let (bot, _replies) = bot(BotConfig::default());
        let running = bot.running().clone();
        let job = running.register("conv", "watch build");

        let handle = tokio::spawn(bot.run(async {}));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());

        job.signal_done();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_timeout_with_leaked_command() {
        let config = BotConfig {
            shutdown_timeout_secs: 0,
            ..Default::default()
        };
        let (bot, _replies) = bot(config);
        let running = bot.running().clone();
        drop(running.register("conv", "never signals"));

        tokio::time::timeout(Duration::from_secs(1), bot.run(async {}))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(running.count_running(), 1);
    }
}
