use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::info;

use crate::error::MatcherError;
use crate::matcher::{Captures, Matcher};
use crate::message::Message;

use super::{Command, CommandContext, Help};

type Timers = Arc<Mutex<HashMap<String, oneshot::Sender<()>>>>;

/// `delay <duration> <command>` runs a command later,
/// `stop delay <id>` cancels a pending timer.
pub struct DelayCommand {
    ctx: CommandContext,
    timers: Timers,
}

impl DelayCommand {
    pub fn new(ctx: CommandContext) -> Self {
        Self {
            ctx,
            timers: Arc::default(),
        }
    }
}

fn start_timer(ctx: &CommandContext, timers: &Timers, captures: &Captures, msg: &Message) {
    let delay = match parse_duration(captures.get_string("delay")) {
        Ok(delay) => delay,
        Err(e) => {
            ctx.replies.reply_error(msg, &e);
            return;
        }
    };
    let command = captures.get_string("command").to_string();
    let id = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();

    let (stop_tx, stop_rx) = oneshot::channel();
    timers.lock().insert(id.clone(), stop_tx);
    let running = ctx
        .running
        .register(msg.conversation_key(), format!("delay {id}: {command}"));

    ctx.replies.send_message(
        msg,
        &format!(
            "I queued the command `{}` for {}. Use `stop delay {}` to stop the timer",
            command,
            captures.get_string("delay"),
            id
        ),
    );

    let ctx = ctx.clone();
    let timers = Arc::clone(timers);
    let msg = msg.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {
                info!("Timer {} fired: {}", id, command);
                ctx.send_internal(&msg, &command);
            }
            _ = stop_rx => {
                info!("Timer {} stopped", id);
                ctx.replies.send_message(&msg, &format!("Stopped timer {id}"));
            }
        }
        timers.lock().remove(&id);
        running.signal_done();
    });
}

fn stop_timer(ctx: &CommandContext, timers: &Timers, captures: &Captures, msg: &Message) {
    let id = captures.get_string("id");
    let stop = timers.lock().remove(id);
    match stop {
        // The timer task reports the stop itself
        Some(stop) => {
            let _ = stop.send(());
        }
        None => {
            let err = anyhow::anyhow!("Invalid timer id: `{id}`");
            ctx.replies.reply_error(msg, &err);
        }
    }
}

impl Command for DelayCommand {
    fn matcher(&self) -> Result<Matcher, MatcherError> {
        let (start_ctx, start_timers) = (self.ctx.clone(), Arc::clone(&self.timers));
        let (stop_ctx, stop_timers) = (self.ctx.clone(), Arc::clone(&self.timers));

        Ok(Matcher::group([
            Matcher::regex(r"stop (?:delay|timer) (?P<id>\w+)", move |captures, msg| {
                stop_timer(&stop_ctx, &stop_timers, captures, msg)
            })?,
            Matcher::regex(
                r"delay (?P<delay>\w+) (?P<command>.+)",
                move |captures, msg| start_timer(&start_ctx, &start_timers, captures, msg),
            )?,
        ]))
    }

    fn help(&self) -> Vec<Help> {
        vec![
            Help::new("delay", "Executes a command after the given delay")
                .category("Scheduling")
                .example("delay 1h reply take a break")
                .example("delay 15m30s queue deploy"),
            Help::new("stop delay", "Cancels a pending delay timer by its id")
                .category("Scheduling")
                .example("stop delay 1a2b3c4d"),
        ]
    }
}

/// Parse durations like `90s`, `15m`, `1h30m` or `2d`. A bare number is
/// taken as seconds.
pub fn parse_duration(text: &str) -> Result<Duration> {
    let text = text.trim();
    if text.is_empty() {
        bail!("Missing duration");
    }
    if let Ok(secs) = text.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut rest = text;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if digits == 0 {
            bail!("Invalid duration: `{text}`");
        }
        let value: u64 = rest[..digits].parse()?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let unit = match &rest[..unit_len] {
            "ms" => Duration::from_millis(1),
            "s" => Duration::from_secs(1),
            "m" => Duration::from_secs(60),
            "h" => Duration::from_secs(60 * 60),
            "d" => Duration::from_secs(24 * 60 * 60),
            other => bail!("Invalid duration unit `{other}` in `{text}`"),
        };
        rest = &rest[unit_len..];

        let Some(part) = u32::try_from(value).ok().and_then(|v| unit.checked_mul(v)) else {
            bail!("Duration too long: `{text}`");
        };
        total = total
            .checked_add(part)
            .ok_or_else(|| anyhow::anyhow!("Duration too long: `{text}`"))?;
    }
    Ok(total)
}
