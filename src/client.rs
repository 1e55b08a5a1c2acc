use crate::message::Message;

/// Outbound side of the chat platform.
///
/// Implementations must not block: the dispatcher calls handlers
/// synchronously and handlers reply through this trait.
pub trait ReplySink: Send + Sync {
    /// Send `text` into the conversation `msg` belongs to
    fn send_message(&self, msg: &Message, text: &str);

    /// Report a failure to the user
    fn reply_error(&self, msg: &Message, err: &anyhow::Error) {
        self.send_message(msg, &format!("Error: {err}"));
    }
}
