use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use crate::message::Message;

/// Recent human messages per conversation, kept in memory only.
pub struct History {
    size: usize,
    conversations: Mutex<HashMap<String, VecDeque<Message>>>,
}

impl History {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            conversations: Mutex::new(HashMap::new()),
        }
    }

    /// Remember a message. Internal messages are skipped.
    pub fn record(&self, msg: &Message) {
        if msg.internal || self.size == 0 {
            return;
        }
        let mut conversations = self.conversations.lock();
        let entries = conversations.entry(msg.conversation_key()).or_default();
        entries.push_back(msg.clone());
        while entries.len() > self.size {
            entries.pop_front();
        }
    }

    /// Newest recorded message of the conversation accepted by `filter`
    pub fn last_matching<F>(&self, key: &str, filter: F) -> Option<Message>
    where
        F: Fn(&Message) -> bool,
    {
        self.conversations
            .lock()
            .get(key)?
            .iter()
            .rev()
            .find(|msg| filter(*msg))
            .cloned()
    }

    pub fn len(&self, key: &str) -> usize {
        self.conversations.lock().get(key).map_or(0, VecDeque::len)
    }
}
