//! Matchers decide whether a command is responsible for a message.
//!
//! Every registered command exposes one [`Matcher`]. Primitive matchers
//! compare the text ([`Matcher::text`], [`Matcher::prefix`],
//! [`Matcher::regex`], [`Matcher::options`], [`Matcher::wildcard`]);
//! combinators wrap other matchers ([`Matcher::group`], [`Matcher::admin`],
//! [`Matcher::conditional`]).
//!
//! Matchers are built once at registration time and only read afterwards,
//! so one matcher can serve concurrent messages.

pub mod captures;
pub mod options;

use std::fmt;
use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use tracing::{info, warn};

use crate::admin::AdminCheck;
use crate::client::ReplySink;
use crate::error::MatcherError;
use crate::message::Message;

pub use captures::{Captures, FULL_MATCH};

/// Handler invoked with the captured values of a successful match.
pub type Runner = Arc<dyn Fn(&Captures, &Message) + Send + Sync>;

/// Receives every message; returns true when it handled the text itself.
pub type WildcardFn = Arc<dyn Fn(&Message, &str) -> bool + Send + Sync>;

pub type Predicate = Arc<dyn Fn(&Message) -> bool + Send + Sync>;

pub const ACCESS_DENIED: &str =
    "Sorry, you are not an admin and not allowed to execute this command!";

/// Outcome of a successful match.
///
/// `runner` is None when the message was consumed without a handler:
/// a wildcard that did its work, or a conditional whose predicate held.
#[derive(Clone)]
pub struct Match {
    pub runner: Option<Runner>,
    pub captures: Captures,
}

impl Match {
    fn run(runner: &Runner, captures: Captures) -> Self {
        Self {
            runner: Some(Arc::clone(runner)),
            captures,
        }
    }

    fn consumed() -> Self {
        Self {
            runner: None,
            captures: Captures::new(),
        }
    }
}

impl fmt::Debug for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Match")
            .field("runner", &self.runner.is_some())
            .field("captures", &self.captures)
            .finish()
    }
}

#[derive(Clone)]
pub enum Matcher {
    /// Whole message equals the phrase, ignoring case
    Text { phrase: String, runner: Runner },
    /// Message starts with the prefix followed by a space or the end
    Prefix { prefix: String, runner: Runner },
    /// Full-line, case-insensitive regular expression
    Regex { regex: Regex, runner: Runner },
    /// Base command followed by whitelisted `key=value` options
    Options {
        command: String,
        allowed: Vec<String>,
        runner: Runner,
        replies: Arc<dyn ReplySink>,
    },
    Wildcard(WildcardFn),
    /// First matching child wins
    Group(Vec<Matcher>),
    /// Child match restricted to admins
    Admin {
        admins: Arc<dyn AdminCheck>,
        replies: Arc<dyn ReplySink>,
        inner: Box<Matcher>,
    },
    Conditional(Predicate),
}

impl Matcher {
    pub fn text<F>(phrase: impl Into<String>, runner: F) -> Self
    where
        F: Fn(&Captures, &Message) + Send + Sync + 'static,
    {
        Matcher::Text {
            phrase: phrase.into(),
            runner: Arc::new(runner),
        }
    }

    pub fn prefix<F>(prefix: impl Into<String>, runner: F) -> Self
    where
        F: Fn(&Captures, &Message) + Send + Sync + 'static,
    {
        Matcher::Prefix {
            prefix: prefix.into(),
            runner: Arc::new(runner),
        }
    }

    /// Compile `pattern` into a full-line, case-insensitive matcher.
    ///
    /// Anchors are added here; patterns must not carry their own `^`/`$`.
    /// Named groups end up in the [`Captures`].
    pub fn regex<F>(pattern: &str, runner: F) -> Result<Self, MatcherError>
    where
        F: Fn(&Captures, &Message) + Send + Sync + 'static,
    {
        let regex = RegexBuilder::new(&format!("^(?:{pattern})$"))
            .case_insensitive(true)
            .build()
            .map_err(|source| MatcherError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;

        Ok(Matcher::Regex {
            regex,
            runner: Arc::new(runner),
        })
    }

    /// Match `command` anywhere in the message and parse the rest as options.
    ///
    /// Unknown option keys still count as a match, but route to a runner
    /// that explains which options are allowed.
    pub fn options<I, S, F>(
        command: impl Into<String>,
        allowed: I,
        runner: F,
        replies: Arc<dyn ReplySink>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&Captures, &Message) + Send + Sync + 'static,
    {
        Matcher::Options {
            command: command.into(),
            allowed: allowed.into_iter().map(Into::into).collect(),
            runner: Arc::new(runner),
            replies,
        }
    }

    pub fn wildcard<F>(handler: F) -> Self
    where
        F: Fn(&Message, &str) -> bool + Send + Sync + 'static,
    {
        Matcher::Wildcard(Arc::new(handler))
    }

    pub fn group(matchers: impl IntoIterator<Item = Matcher>) -> Self {
        Matcher::Group(matchers.into_iter().collect())
    }

    pub fn admin(
        admins: Arc<dyn AdminCheck>,
        replies: Arc<dyn ReplySink>,
        inner: Matcher,
    ) -> Self {
        Matcher::Admin {
            admins,
            replies,
            inner: Box::new(inner),
        }
    }

    pub fn conditional<F>(predicate: F) -> Self
    where
        F: Fn(&Message) -> bool + Send + Sync + 'static,
    {
        Matcher::Conditional(Arc::new(predicate))
    }

    /// Try this matcher against `msg`. None means "not responsible".
    pub fn matches(&self, msg: &Message) -> Option<Match> {
        let text = msg.text.as_str();

        match self {
            Matcher::Text { phrase, runner } => {
                match strip_prefix_ignore_case(text, phrase) {
                    Some("") => Some(Match::run(runner, Captures::new())),
                    _ => None,
                }
            }
            Matcher::Prefix { prefix, runner } => {
                let rest = strip_prefix_ignore_case(text, prefix)?;
                let remainder = if rest.is_empty() {
                    rest
                } else {
                    // "random" must not match "randomness"
                    rest.strip_prefix(' ')?
                };
                let mut captures = Captures::new();
                captures.set(FULL_MATCH, remainder);
                Some(Match::run(runner, captures))
            }
            Matcher::Regex { regex, runner } => {
                let caps = regex.captures(text)?;
                let mut captures = Captures::new();
                for name in regex.capture_names().flatten() {
                    captures.set(name, caps.name(name).map_or("", |m| m.as_str()));
                }
                Some(Match::run(runner, captures))
            }
            Matcher::Options {
                command,
                allowed,
                runner,
                replies,
            } => {
                let rest = find_ignore_case(text, command)?;
                let mut captures = Captures::new();
                for (key, value) in options::parse_options(rest) {
                    let key = key.to_lowercase();
                    if !allowed.iter().any(|a| a.to_lowercase() == key) {
                        let rejection = option_rejection(key, allowed, Arc::clone(replies));
                        return Some(Match {
                            runner: Some(rejection),
                            captures,
                        });
                    }
                    captures.set(key, value);
                }
                Some(Match::run(runner, captures))
            }
            Matcher::Wildcard(handler) => {
                if handler(msg, text) {
                    Some(Match::consumed())
                } else {
                    None
                }
            }
            Matcher::Group(matchers) => matchers.iter().find_map(|m| m.matches(msg)),
            Matcher::Admin {
                admins,
                replies,
                inner,
            } => {
                // Only commands the user actually invoked get an access check
                let matched = inner.matches(msg)?;
                if admins.is_admin(&msg.user) {
                    return Some(matched);
                }
                Some(Match {
                    runner: Some(access_denied(Arc::clone(replies))),
                    captures: matched.captures,
                })
            }
            Matcher::Conditional(predicate) => {
                if predicate(msg) {
                    Some(Match::consumed())
                } else {
                    None
                }
            }
        }
    }

    /// Short kind name, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Matcher::Text { .. } => "text",
            Matcher::Prefix { .. } => "prefix",
            Matcher::Regex { .. } => "regex",
            Matcher::Options { .. } => "options",
            Matcher::Wildcard(_) => "wildcard",
            Matcher::Group(_) => "group",
            Matcher::Admin { .. } => "admin",
            Matcher::Conditional(_) => "conditional",
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Text { phrase, .. } => f.debug_tuple("Text").field(phrase).finish(),
            Matcher::Prefix { prefix, .. } => f.debug_tuple("Prefix").field(prefix).finish(),
            Matcher::Regex { regex, .. } => f.debug_tuple("Regex").field(&regex.as_str()).finish(),
            Matcher::Options {
                command, allowed, ..
            } => f
                .debug_struct("Options")
                .field("command", command)
                .field("allowed", allowed)
                .finish(),
            Matcher::Wildcard(_) => f.write_str("Wildcard"),
            Matcher::Group(matchers) => f.debug_tuple("Group").field(matchers).finish(),
            Matcher::Admin { inner, .. } => f.debug_tuple("Admin").field(inner).finish(),
            Matcher::Conditional(_) => f.write_str("Conditional"),
        }
    }
}

fn access_denied(replies: Arc<dyn ReplySink>) -> Runner {
    Arc::new(move |_captures, msg| {
        warn!(
            "Access denied for user {} in {}: {}",
            msg.user, msg.channel, msg.text
        );
        replies.send_message(msg, ACCESS_DENIED);
    })
}

fn option_rejection(key: String, allowed: &[String], replies: Arc<dyn ReplySink>) -> Runner {
    let allowed = allowed.join(", ");
    Arc::new(move |_captures, msg| {
        info!("Rejected option '{}' from user {}", key, msg.user);
        let err = anyhow::anyhow!("Invalid option: `{key}`. Allowed options: {allowed}");
        replies.reply_error(msg, &err);
    })
}

fn chars_eq_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

/// Strip `prefix` from `text` comparing whole characters without case.
pub(crate) fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let mut chars = text.char_indices();
    let mut end = 0;
    for expected in prefix.chars() {
        let (idx, actual) = chars.next()?;
        if !chars_eq_ignore_case(actual, expected) {
            return None;
        }
        end = idx + actual.len_utf8();
    }
    Some(&text[end..])
}

/// Text following the first case-insensitive occurrence of `needle`.
fn find_ignore_case<'a>(text: &'a str, needle: &str) -> Option<&'a str> {
    text.char_indices()
        .find_map(|(idx, _)| strip_prefix_ignore_case(&text[idx..], needle))
}
