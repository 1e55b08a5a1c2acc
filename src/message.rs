use chrono::{DateTime, Utc};

/// A chat message received from a platform or synthesised by a command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    /// The message text
    pub text: String,
    /// Platform-specific chat/channel ID as string
    pub channel: String,
    /// Thread inside the channel, empty when the message is top-level
    pub thread: String,
    /// Platform-specific user ID as string
    pub user: String,
    /// Platform timestamp, `<unix seconds>[.<fraction>]`
    pub timestamp: String,
    /// Set for messages produced by the bot itself. These are never
    /// written to the history.
    pub internal: bool,
}

impl Message {
    pub fn new(
        channel: impl Into<String>,
        user: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            channel: channel.into(),
            user: user.into(),
            timestamp: Utc::now().timestamp().to_string(),
            ..Default::default()
        }
    }

    pub fn in_thread(mut self, thread: impl Into<String>) -> Self {
        self.thread = thread.into();
        self
    }

    /// Key used to scope history and running commands to one conversation.
    pub fn conversation_key(&self) -> String {
        format!("{}-{}-{}", self.channel, self.user, self.thread)
    }

    /// Derive a synthesised message in the same conversation.
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            timestamp: Utc::now().timestamp().to_string(),
            internal: true,
            ..self.clone()
        }
    }

    /// Parse the platform timestamp. Returns None for malformed values.
    pub fn time(&self) -> Option<DateTime<Utc>> {
        let (secs, fraction) = match self.timestamp.split_once('.') {
            Some((secs, fraction)) => (secs, fraction),
            None => (self.timestamp.as_str(), ""),
        };
        let secs: i64 = secs.parse().ok()?;

        // Interpret the fraction as decimal digits of a second, at most nanoseconds
        let digits: String = fraction.chars().take(9).collect();
        let nanos = if digits.is_empty() {
            0
        } else {
            let value: u32 = digits.parse().ok()?;
            value * 10u32.pow(9 - digits.len() as u32)
        };

        DateTime::from_timestamp(secs, nanos)
    }
}
