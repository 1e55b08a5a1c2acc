use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{MessageId, ThreadId};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use crate::client::ReplySink;
use crate::message::Message as ChatMessage;

/// Telegram rejects messages longer than 4096 chars
const MAX_MESSAGE_LEN: usize = 4000;

/// Split long messages for Telegram's 4096 char limit
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        // Walk back to a valid UTF-8 char boundary so slicing doesn't panic
        while end > start && !text.is_char_boundary(end) {
            end -= 1;
        }
        let actual_end = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .or_else(|| text[start..end].rfind(' '))
                .map(|pos| start + pos + 1)
                .unwrap_or(end)
        } else {
            end
        };

        chunks.push(text[start..actual_end].to_string());
        start = actual_end;
    }

    chunks
}

/// Build the platform independent message for one Telegram text message.
///
/// Telegram only has second resolution, so the message id is used as the
/// fractional part to keep timestamps unique within a chat.
fn to_chat_message(
    chat_id: i64,
    user_id: u64,
    thread_id: Option<i32>,
    unix_secs: i64,
    message_id: i32,
    text: &str,
) -> ChatMessage {
    // "/help" in Telegram means "help" here
    let text = text.trim();
    let text = text.strip_prefix('/').unwrap_or(text);

    ChatMessage {
        text: text.to_string(),
        channel: chat_id.to_string(),
        thread: thread_id.map(|id| id.to_string()).unwrap_or_default(),
        user: user_id.to_string(),
        timestamp: format!("{unix_secs}.{message_id}"),
        internal: false,
    }
}

/// Sends replies through the Telegram API without blocking the dispatcher.
#[derive(Clone)]
pub struct TelegramReplies {
    bot: Bot,
}

impl TelegramReplies {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

impl ReplySink for TelegramReplies {
    fn send_message(&self, msg: &ChatMessage, text: &str) {
        let chat_id = match msg.channel.parse::<i64>() {
            Ok(id) => ChatId(id),
            Err(_) => {
                warn!("Cannot reply to non-Telegram channel '{}'", msg.channel);
                return;
            }
        };
        let thread = msg.thread.parse::<i32>().ok().map(|id| ThreadId(MessageId(id)));
        let chunks = split_message(text, MAX_MESSAGE_LEN);
        let bot = self.bot.clone();

        tokio::spawn(async move {
            for chunk in chunks {
                let mut request = bot.send_message(chat_id, chunk);
                if let Some(thread) = thread {
                    request = request.message_thread_id(thread);
                }
                if let Err(e) = request.await {
                    error!("Failed to send Telegram message to {}: {}", chat_id, e);
                    break;
                }
            }
        });
    }
}

/// Run the Telegram bot platform, feeding allowed messages into `inbound`
pub async fn run(
    inbound: UnboundedSender<ChatMessage>,
    allowed_user_ids: Vec<u64>,
    bot: Bot,
) -> Result<()> {
    info!("Starting Telegram platform...");

    let handler = Update::filter_message()
        .filter_map(move |msg: Message| {
            let user = msg.from.as_ref()?;
            if allowed_user_ids.contains(&user.id.0) {
                Some(msg)
            } else {
                debug!("Ignoring message from unknown user {}", user.id);
                None
            }
        })
        .endpoint(handle_message);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![inbound])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_message(msg: Message, inbound: UnboundedSender<ChatMessage>) -> ResponseResult<()> {
    let (user, text) = match (msg.from.as_ref(), msg.text()) {
        (Some(user), Some(text)) => (user, text),
        _ => return Ok(()),
    };

    info!(
        "Telegram message from {} ({}): {}",
        user.first_name, user.id, text
    );

    let chat_message = to_chat_message(
        msg.chat.id.0,
        user.id.0,
        msg.thread_id.map(|thread| thread.0 .0),
        msg.date.timestamp(),
        msg.id.0,
        text,
    );
    if inbound.send(chat_message).is_err() {
        warn!("Bot stopped, dropping Telegram message from {}", user.id);
    }

    Ok(())
}
