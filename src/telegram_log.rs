//! Forwards warnings and errors to an operator chat.
//!
//! Events are collected and flushed as one message every few seconds, so an
//! API outage that fails every lookup costs one Telegram message per flush
//! instead of one per user.

use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::ChatId;
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

const FLUSH_INTERVAL: Duration = Duration::from_secs(10);
/// Telegram rejects messages over 4096 characters.
const MAX_MESSAGE_CHARS: usize = 4000;
/// Lines kept per flush; the rest are counted, not sent.
const MAX_LINES_PER_FLUSH: usize = 30;

pub struct TelegramLogLayer {
    tx: mpsc::UnboundedSender<String>,
}

impl TelegramLogLayer {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            let mut pending = Pending::default();
            let mut interval = tokio::time::interval(FLUSH_INTERVAL);

            loop {
                tokio::select! {
                    line = rx.recv() => match line {
                        Some(line) => pending.push(line),
                        None => break,
                    },
                    _ = interval.tick() => {
                        if let Some(text) = pending.take() {
                            send_log(&bot, chat_id, &text).await;
                        }
                    }
                }
            }

            if let Some(text) = pending.take() {
                send_log(&bot, chat_id, &text).await;
            }
        });

        Self { tx }
    }
}

#[derive(Default)]
struct Pending {
    lines: Vec<String>,
    dropped: usize,
}

impl Pending {
    fn push(&mut self, line: String) {
        if self.lines.len() < MAX_LINES_PER_FLUSH {
            self.lines.push(line);
        } else {
            self.dropped += 1;
        }
    }

    fn take(&mut self) -> Option<String> {
        if self.lines.is_empty() {
            return None;
        }
        let mut text = self.lines.join("\n");
        if self.dropped > 0 {
            text.push_str(&format!("\n(+{} more)", self.dropped));
        }
        self.lines.clear();
        self.dropped = 0;
        Some(truncate(&text))
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() > MAX_MESSAGE_CHARS {
        let truncated: String = text.chars().take(MAX_MESSAGE_CHARS).collect();
        format!("{}...", truncated)
    } else {
        text.to_string()
    }
}

async fn send_log(bot: &Bot, chat_id: ChatId, text: &str) {
    if let Err(e) = bot.send_message(chat_id, text).await {
        eprintln!("Failed to send log to Telegram: {e}");
    }
}

struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else if self.message.is_empty() {
            self.message = format!("{} = {:?}", field.name(), value);
        } else {
            self.message
                .push_str(&format!(", {} = {:?}", field.name(), value));
        }
    }
}

fn format_event(level: Level, message: &str) -> Option<String> {
    match level {
        Level::ERROR => Some(format!("❌ {message}")),
        Level::WARN => Some(format!("⚠️ {message}")),
        _ => None,
    }
}

impl<S: Subscriber> Layer<S> for TelegramLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = *event.metadata().level();
        if level > Level::WARN {
            return;
        }

        // Failed sends of our own log messages must not loop back in.
        if event.metadata().target().starts_with("teloxide") {
            return;
        }

        let mut visitor = MessageVisitor {
            message: String::new(),
        };
        event.record(&mut visitor);

        if let Some(line) = format_event(level, &visitor.message)
            && self.tx.send(line).is_err()
        {
            eprintln!("Log channel closed, message dropped");
        }
    }
}
