//! Ledger of commands that keep working after their handler returned.
//!
//! A handler that spawns background work registers a [`RunningCommand`]
//! first and calls [`RunningCommand::signal_done`] once the work resolved.
//! The registry never signals on a handler's behalf: a handle that is
//! dropped without signalling stays "running" for good.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

struct Entry {
    key: String,
    label: String,
    done: Arc<watch::Sender<bool>>,
}

struct Shared {
    entries: Mutex<BTreeMap<u64, Entry>>,
    next_id: AtomicU64,
    /// Bumped on every insert/removal so waiters can re-check their condition
    changes: watch::Sender<u64>,
}

impl Shared {
    fn finish(&self, id: u64) {
        let removed = self.entries.lock().remove(&id);
        if let Some(entry) = removed {
            debug!("Running command finished: {} ({})", entry.label, entry.key);
            self.changes.send_modify(|generation| *generation += 1);
        }
    }
}

/// Shared registry of in-flight commands, cheap to clone.
#[derive(Clone)]
pub struct RunningCommands {
    shared: Arc<Shared>,
}

impl Default for RunningCommands {
    fn default() -> Self {
        Self::new()
    }
}

impl RunningCommands {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                entries: Mutex::new(BTreeMap::new()),
                next_id: AtomicU64::new(1),
                changes,
            }),
        }
    }

    /// Track a new running command for the conversation `key`.
    pub fn register(&self, key: impl Into<String>, label: impl Into<String>) -> RunningCommand {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let key = key.into();
        let label = label.into();
        let (done, _) = watch::channel(false);
        let done = Arc::new(done);

        debug!("Running command registered: {} ({})", label, key);
        self.shared.entries.lock().insert(
            id,
            Entry {
                key,
                label: label.clone(),
                done: Arc::clone(&done),
            },
        );
        self.shared
            .changes
            .send_modify(|generation| *generation += 1);

        RunningCommand {
            id,
            label,
            done,
            registry: Arc::downgrade(&self.shared),
        }
    }

    /// Number of registered commands that did not signal done yet
    pub fn count_running(&self) -> usize {
        self.shared.entries.lock().len()
    }

    pub fn count_running_for(&self, key: &str) -> usize {
        self.shared
            .entries
            .lock()
            .values()
            .filter(|entry| entry.key == key)
            .count()
    }

    /// Labels of the running commands of one conversation, oldest first
    pub fn labels_for(&self, key: &str) -> Vec<String> {
        self.shared
            .entries
            .lock()
            .values()
            .filter(|entry| entry.key == key)
            .map(|entry| entry.label.clone())
            .collect()
    }

    /// `(conversation key, label)` of every running command, oldest first
    pub fn all_labels(&self) -> Vec<(String, String)> {
        self.shared
            .entries
            .lock()
            .values()
            .map(|entry| (entry.key.clone(), entry.label.clone()))
            .collect()
    }

    /// Observers for the commands currently running in one conversation.
    /// Commands registered later are not included.
    pub fn completions_for(&self, key: &str) -> Vec<Completion> {
        self.shared
            .entries
            .lock()
            .values()
            .filter(|entry| entry.key == key)
            .map(|entry| Completion {
                done: entry.done.subscribe(),
            })
            .collect()
    }

    /// Resolve once no command is running anymore, including commands
    /// registered while waiting.
    pub async fn wait_for_all_done(&self) {
        self.wait_until(|entries| entries.is_empty()).await;
    }

    /// Resolve once the conversation `key` has no running command,
    /// including commands registered there while waiting. For callers
    /// outside the built-in commands, e.g. chaining from a custom command.
    pub async fn wait_for_conversation(&self, key: &str) {
        self.wait_until(|entries| entries.values().all(|entry| entry.key != key))
            .await;
    }

    async fn wait_until<F>(&self, idle: F)
    where
        F: Fn(&BTreeMap<u64, Entry>) -> bool,
    {
        // Subscribe before the first check so no change slips through
        let mut changes = self.shared.changes.subscribe();
        loop {
            let done = idle(&self.shared.entries.lock());
            if done {
                return;
            }
            if changes.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Handle owned by the handler that registered a running command.
pub struct RunningCommand {
    id: u64,
    label: String,
    done: Arc<watch::Sender<bool>>,
    registry: Weak<Shared>,
}

impl RunningCommand {
    /// Mark the command as finished. Extra calls are ignored.
    pub fn signal_done(&self) {
        if self.done.send_replace(true) {
            debug!("Running command '{}' signalled done twice", self.label);
            return;
        }
        match self.registry.upgrade() {
            Some(shared) => shared.finish(self.id),
            None => debug!("Running command '{}' finished after shutdown", self.label),
        }
    }

    pub fn completion(&self) -> Completion {
        Completion {
            done: self.done.subscribe(),
        }
    }
}

/// Observer side of a running command, fires once.
#[derive(Clone)]
pub struct Completion {
    done: watch::Receiver<bool>,
}

impl Completion {
    pub fn is_done(&self) -> bool {
        *self.done.borrow()
    }

    pub async fn wait(mut self) {
        // The registry keeps the sender alive until the command is done
        let _ = self.done.wait_for(|done| *done).await;
    }
}
