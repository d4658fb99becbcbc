//! `chat-history` command line: append, read, watch and review conversation history.
//!
//! Storage and collection names come from `CHAT_HISTORY_*` environment variables.
//!
//! Usage:
//! - `chat-history append <uid> <user-text> <ai-text> [metadata-json]`
//! - `chat-history history <uid>`
//! - `chat-history watch <uid>` (Ctrl+C to stop)
//! - `chat-history feedback <uid> <message-id> <like|dislike>`
//! - `chat-history review <like|dislike>`

use std::process::ExitCode;

use anyhow::{Context, Result, anyhow, bail};
use serde_json::Value;
use tokio::sync::watch;

use chat_history_store::history::{
    ChatMessage, ChatPair, ConversationStore, DocumentId, FeedbackKind, HistoryConfig,
    MirrorOutcome, UserId, init_tracing,
};

const USAGE: &str = "usage:
  chat-history append <uid> <user-text> <ai-text> [metadata-json]
  chat-history history <uid>
  chat-history watch <uid>
  chat-history feedback <uid> <message-id> <like|dislike>
  chat-history review <like|dislike>";

const WELCOME: &str = "Hi! How can I help you today?";

/// Parsed command line.
enum Command {
    Append {
        user: UserId,
        pair: ChatPair,
    },
    History {
        user: UserId,
    },
    Watch {
        user: UserId,
    },
    Feedback {
        user: UserId,
        message_id: DocumentId,
        kind: FeedbackKind,
    },
    Review {
        kind: FeedbackKind,
    },
}

/// Fetch a required positional argument.
fn arg<'a>(args: &'a [String], index: usize, name: &str) -> Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("missing <{name}>\n{USAGE}"))
}

fn parse_kind(raw: &str) -> Result<FeedbackKind> {
    raw.parse().map_err(|err: String| anyhow!(err))
}

fn parse_command(args: &[String]) -> Result<Command> {
    let Some(command) = args.first() else {
        bail!("{USAGE}");
    };
    let command = match command.as_str() {
        "append" => {
            let user = UserId::new(arg(args, 1, "uid")?)?;
            let mut pair = ChatPair::new(arg(args, 2, "user-text")?, arg(args, 3, "ai-text")?);
            if let Some(raw) = args.get(4) {
                // Plain text is accepted as a string value.
                let metadata = serde_json::from_str::<Value>(raw)
                    .unwrap_or_else(|_| Value::String(raw.clone()));
                pair = pair.with_metadata(metadata);
            }
            Command::Append { user, pair }
        }
        "history" => Command::History {
            user: UserId::new(arg(args, 1, "uid")?)?,
        },
        "watch" => Command::Watch {
            user: UserId::new(arg(args, 1, "uid")?)?,
        },
        "feedback" => Command::Feedback {
            user: UserId::new(arg(args, 1, "uid")?)?,
            message_id: DocumentId::new(arg(args, 2, "message-id")?)?,
            kind: parse_kind(arg(args, 3, "like|dislike")?)?,
        },
        "review" => Command::Review {
            kind: parse_kind(arg(args, 1, "like|dislike")?)?,
        },
        other => bail!("unknown command `{other}`\n{USAGE}"),
    };
    Ok(command)
}

fn print_message(message: &ChatMessage) {
    let when = message.created_at.as_deref().unwrap_or("-");
    let feedback = message
        .feedback
        .map(|kind| format!(" [{kind}]"))
        .unwrap_or_default();
    println!("{when}  {}: {}{feedback}", message.sender, message.text);
}

async fn run(command: Command) -> Result<()> {
    let config = HistoryConfig::from_env().context("loading configuration")?;
    let store = ConversationStore::from_config(&config)
        .await
        .context("opening conversation store")?;

    match command {
        Command::Append { user, pair } => {
            let id = store.append_exchange(&user, &[pair]).await?;
            println!("{id}");
        }
        Command::History { user } => {
            for pair in store.fetch_history(&user).await? {
                println!("user: {}", pair.user);
                println!("ai:   {}", pair.ai);
            }
        }
        Command::Watch { user } => {
            let (tx, mut rx) = watch::channel(Vec::new());
            let handle = store.watch_messages(&user, tx, ChatMessage::welcome(WELCOME))?;
            loop {
                tokio::select! {
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let messages = rx.borrow_and_update().clone();
                        println!("--- {} messages", messages.len());
                        messages.iter().for_each(print_message);
                    }
                    signal = tokio::signal::ctrl_c() => {
                        signal.context("waiting for Ctrl+C")?;
                        break;
                    }
                }
            }
            handle.cancel().await;
        }
        Command::Feedback {
            user,
            message_id,
            kind,
        } => {
            let outcome = store.record_feedback(&user, &message_id, kind).await?;
            match outcome.mirror {
                MirrorOutcome::Mirrored { writes } => {
                    println!("{kind} recorded on {message_id}, shared ({writes} writes)");
                }
                MirrorOutcome::ConversationMissing => {
                    println!("{kind} recorded on {message_id}, no conversation to share");
                }
                MirrorOutcome::NoCompletePairs => {
                    println!("{kind} recorded on {message_id}, nothing complete to share");
                }
                MirrorOutcome::Failed { reason } => {
                    println!("{kind} recorded on {message_id}, sharing failed: {reason}");
                }
            }
        }
        Command::Review { kind } => {
            for (id, record) in store.list_public_feedback(kind).await? {
                println!("{id}  uid={}", record.uid);
                println!("  user: {}", record.user_text);
                println!("  ai:   {}", record.ai_text);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse_command(&args) {
        Ok(command) => command,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(2);
        }
    };

    match run(command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
