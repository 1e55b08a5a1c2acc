use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error};

use crate::client::ReplySink;
use crate::matcher::Matcher;
use crate::message::Message;

pub const COMMAND_FAILED: &str = "Something went wrong while executing this command";

/// Routes a message to the first registered matcher that accepts it.
///
/// Matchers are tried in registration order. There is no scoring and no
/// backtracking: the first match runs and ends the dispatch.
pub struct Dispatcher {
    matchers: Vec<Matcher>,
    replies: Arc<dyn ReplySink>,
}

impl Dispatcher {
    pub fn new(replies: Arc<dyn ReplySink>) -> Self {
        Self {
            matchers: Vec::new(),
            replies,
        }
    }

    pub fn register(&mut self, matcher: Matcher) {
        debug!("Registered {} matcher #{}", matcher.kind(), self.matchers.len());
        self.matchers.push(matcher);
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    /// Run the handler of the first matching matcher. Returns false when
    /// nothing was responsible for the message.
    ///
    /// Panics in matchers or handlers are contained here: a panicking
    /// matcher is skipped, a panicking handler is reported to the user.
    pub fn dispatch(&self, msg: &Message) -> bool {
        for (index, matcher) in self.matchers.iter().enumerate() {
            let matched = match catch_unwind(AssertUnwindSafe(|| matcher.matches(msg))) {
                Ok(Some(matched)) => matched,
                Ok(None) => continue,
                Err(_) => {
                    error!(
                        "{} matcher #{} panicked on message: {}",
                        matcher.kind(),
                        index,
                        msg.text
                    );
                    continue;
                }
            };

            debug!("Message matched {} matcher #{}", matcher.kind(), index);
            if let Some(runner) = &matched.runner {
                let result = catch_unwind(AssertUnwindSafe(|| runner(&matched.captures, msg)));
                if result.is_err() {
                    error!(
                        "Handler of {} matcher #{} panicked on message: {}",
                        matcher.kind(),
                        index,
                        msg.text
                    );
                    self.replies
                        .reply_error(msg, &anyhow::anyhow!(COMMAND_FAILED));
                }
            }
            return true;
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;
    use crate::admin::AdminList;
    use crate::client::testing::RecordingSink;
    use crate::matcher::{Captures, ACCESS_DENIED, FULL_MATCH};

    type Calls = Arc<Mutex<Vec<(String, String)>>>;

    fn recorder(
        calls: &Calls,
        name: &'static str,
    ) -> impl Fn(&Captures, &Message) + Send + Sync + 'static {
        let calls = calls.clone();
        move |captures, _| {
            calls
                .lock()
                .push((name.to_string(), captures.get_string(FULL_MATCH).to_string()))
        }
    }

    fn build(replies: Arc<RecordingSink>, calls: &Calls) -> Dispatcher {
        let admins = Arc::new(AdminList::new(["admin"]));
        let mut dispatcher = Dispatcher::new(replies.clone());
        dispatcher.register(Matcher::group([
            Matcher::prefix("a", recorder(calls, "a")),
            Matcher::prefix("b", recorder(calls, "b")),
        ]));
        dispatcher.register(Matcher::admin(
            admins,
            replies,
            Matcher::text("c", recorder(calls, "c")),
        ));
        dispatcher
    }

    #[test]
    fn test_dispatch_end_to_end() {
        let replies = Arc::new(RecordingSink::new());
        let calls: Calls = Arc::default();
        let dispatcher = build(replies.clone(), &calls);
        assert_eq!(dispatcher.len(), 2);

        assert!(dispatcher.dispatch(&Message::new("chat", "user", "b extra")));
        assert_eq!(
            *calls.lock(),
            vec![("b".to_string(), "extra".to_string())]
        );

        assert!(dispatcher.dispatch(&Message::new("chat", "user", "c")));
        assert_eq!(calls.lock().len(), 1);
        assert_eq!(replies.texts(), vec![ACCESS_DENIED.to_string()]);

        assert!(dispatcher.dispatch(&Message::new("chat", "admin", "c")));
        assert_eq!(calls.lock().len(), 2);

        assert!(!dispatcher.dispatch(&Message::new("chat", "user", "z")));
    }

    #[test]
    fn test_registration_order_wins() {
        let replies = Arc::new(RecordingSink::new());
        let calls: Calls = Arc::default();
        let mut dispatcher = Dispatcher::new(replies);
        dispatcher.register(Matcher::prefix("deploy", recorder(&calls, "first")));
        dispatcher.register(Matcher::prefix("deploy", recorder(&calls, "second")));

        dispatcher.dispatch(&Message::new("chat", "user", "deploy x"));
        assert_eq!(*calls.lock(), vec![("first".to_string(), "x".to_string())]);
    }

    #[test]
    fn test_handler_panic_is_contained() {
        let replies = Arc::new(RecordingSink::new());
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();
        let mut dispatcher = Dispatcher::new(replies.clone());
        dispatcher.register(Matcher::text("boom", |_, _| panic!("handler failure")));
        dispatcher.register(Matcher::text("count", move |_, _| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(dispatcher.dispatch(&Message::new("chat", "user", "boom")));
        assert!(replies.texts()[0].contains(COMMAND_FAILED));

        assert!(dispatcher.dispatch(&Message::new("chat", "user", "count")));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_matcher_panic_falls_through() {
        let replies = Arc::new(RecordingSink::new());
        let calls: Calls = Arc::default();
        let mut dispatcher = Dispatcher::new(replies);
        dispatcher.register(Matcher::wildcard(|_, _| panic!("broken wildcard")));
        dispatcher.register(Matcher::prefix("ping", recorder(&calls, "ping")));

        assert!(dispatcher.dispatch(&Message::new("chat", "user", "ping")));
        assert_eq!(calls.lock().len(), 1);
    }

    #[test]
    fn test_consuming_matchers_stop_dispatch() {
        let replies = Arc::new(RecordingSink::new());
        let calls: Calls = Arc::default();
        let mut dispatcher = Dispatcher::new(replies);
        dispatcher.register(Matcher::conditional(|msg| msg.text.starts_with('#')));
        dispatcher.register(Matcher::wildcard(|_, text| text == "handled"));
        dispatcher.register(Matcher::prefix("#note", recorder(&calls, "note")));
        dispatcher.register(Matcher::prefix("handled", recorder(&calls, "handled")));

        assert!(dispatcher.dispatch(&Message::new("chat", "user", "#note hi")));
        assert!(dispatcher.dispatch(&Message::new("chat", "user", "handled")));
        assert!(calls.lock().is_empty());
    }

    #[test]
    fn test_empty_dispatcher() {
        let dispatcher = Dispatcher::new(Arc::new(RecordingSink::new()));
        assert!(dispatcher.is_empty());
        assert!(!dispatcher.dispatch(&Message::new("chat", "user", "anything")));
    }
}
