use std::collections::BTreeMap;
use std::sync::Arc;

use crate::client::ReplySink;
use crate::error::MatcherError;
use crate::matcher::{Captures, Matcher, FULL_MATCH};
use crate::message::Message;

use super::{Command, Help};

/// Lists the help of every registered command
pub struct HelpCommand {
    replies: Arc<dyn ReplySink>,
    entries: Arc<Vec<Help>>,
}

impl HelpCommand {
    pub fn new(replies: Arc<dyn ReplySink>, entries: Vec<Help>) -> Self {
        Self {
            replies,
            entries: Arc::new(entries),
        }
    }

    pub fn own_help() -> Vec<Help> {
        vec![Help::new("help", "Lists all commands, or details of one command")
            .category("General")
            .example("help")
            .example("help delay")]
    }

    fn run(entries: &[Help], replies: &dyn ReplySink, captures: &Captures, msg: &Message) {
        let topic = captures.get_string(FULL_MATCH).trim();
        let text = if topic.is_empty() {
            overview(entries)
        } else {
            match find_entry(entries, topic) {
                Some(entry) => details(entry),
                None => format!("Invalid command: `{topic}`. Type `help` for a list of commands."),
            }
        };
        replies.send_message(msg, &text);
    }
}

impl Command for HelpCommand {
    fn matcher(&self) -> Result<Matcher, MatcherError> {
        let replies = Arc::clone(&self.replies);
        let entries = Arc::clone(&self.entries);
        Ok(Matcher::group([
            Matcher::prefix("help", {
                let replies = Arc::clone(&replies);
                let entries = Arc::clone(&entries);
                move |captures, msg| Self::run(&entries, replies.as_ref(), captures, msg)
            }),
            Matcher::text("commands", move |captures, msg| {
                Self::run(&entries, replies.as_ref(), captures, msg)
            }),
        ]))
    }

    fn help(&self) -> Vec<Help> {
        Self::own_help()
    }
}

fn find_entry<'a>(entries: &'a [Help], topic: &str) -> Option<&'a Help> {
    let topic = topic.to_lowercase();
    entries
        .iter()
        .find(|entry| entry.command.to_lowercase() == topic)
        .or_else(|| {
            entries
                .iter()
                .find(|entry| entry.command.to_lowercase().starts_with(&topic))
        })
}

fn overview(entries: &[Help]) -> String {
    let mut categories: BTreeMap<&str, Vec<&Help>> = BTreeMap::new();
    for entry in entries {
        let category = if entry.category.is_empty() {
            "Other"
        } else {
            entry.category.as_str()
        };
        categories.entry(category).or_default().push(entry);
    }

    let mut text = String::from("Hello, here are the available commands:\n");
    for (category, entries) in categories {
        text.push_str(&format!("\n{category}\n"));
        for entry in entries {
            text.push_str(&format!("  - {}: {}\n", entry.command, entry.description));
        }
    }
    text
}

fn details(entry: &Help) -> String {
    let mut text = format!("{}\n{}\n", entry.command, entry.description);
    if !entry.examples.is_empty() {
        text.push_str("\nExamples:\n");
        for example in &entry.examples {
            text.push_str(&format!("  - {example}\n"));
        }
    }
    text
}
