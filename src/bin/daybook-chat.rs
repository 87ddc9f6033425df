//! Interactive chat against a local Ollama server with a day-grouped history.
//!
//! # Usage
//!
//! ```bash
//! # Basic usage; the first model the server lists is selected
//! daybook-chat
//!
//! # Pick a model and a history file
//! daybook-chat --model llama3.2 --history ~/notes/chat_history.json
//!
//! # Talk to another machine
//! daybook-chat --host gpu-box:11434
//!
//! # Disable colors (useful for piping output)
//! daybook-chat --no-color
//! ```
//!
//! # Commands
//!
//! - `/models`, `/refresh`, `/model <name|n>` - Inspect and pick models
//! - `/days`, `/show [date]`, `/today` - Browse history by day
//! - `/delete <n> [date]`, `/delete-turn <n> [date]` - Prune history
//! - `/stats`, `/help`, `/quit`
//!
//! Start a message with `//` to send it with a single leading slash.
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `warn`).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use time::Date;
use tracing_subscriber::EnvFilter;

use daybook::Ollama;
use daybook::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatSession, PlainTextRenderer, Renderer, help_text,
    message_text, parse_command,
};
use daybook::utils::time::{format_date, local_offset};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // The local offset can only be read safely while single-threaded.
    local_offset();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let (args, _) = ChatArgs::from_command_line_relaxed("daybook-chat [OPTIONS]");
    let config = ChatConfig::from(args);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(config))
}

async fn run(config: ChatConfig) -> Result<(), Box<dyn std::error::Error>> {
    let use_color = config.use_color;
    let client = Ollama::with_options(config.host.clone(), Some(config.connect_timeout))?;
    tracing::info!(base_url = %client.base_url(), history = %config.history_path.display(), "starting");

    // Flag for interrupt handling during streaming
    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_clone = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_clone.store(true, Ordering::Relaxed);
    })?;

    let mut renderer = PlainTextRenderer::with_color(use_color).with_interrupt(interrupted.clone());
    let mut session = ChatSession::new(client, config);
    session.load_history(&mut renderer);
    session.refresh_models(&mut renderer).await;

    let mut rl = DefaultEditor::new()?;

    println!(
        "Daybook Chat (model: {})",
        session.model().unwrap_or("none selected")
    );
    println!("History: {}", session.history_path().display());
    println!("Type /help for commands, /quit to exit\n");
    print_day(&session, &mut renderer, ChatSession::today());

    loop {
        // Reset interrupt flag before each input
        interrupted.store(false, Ordering::Relaxed);

        let readline = rl.readline("You: ");

        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {}", line);
                            }
                        }
                        ChatCommand::Models => print_models(&session),
                        ChatCommand::Refresh => {
                            let count = session.refresh_models(&mut renderer).await.len();
                            renderer.print_info(&format!("{count} models available."));
                        }
                        ChatCommand::Model(selector) => {
                            match session.select_model(&selector, &mut renderer) {
                                Ok(model) => {
                                    renderer.print_info(&format!("Model changed to: {model}"))
                                }
                                Err(err) => renderer.print_error(&err.to_string()),
                            }
                        }
                        ChatCommand::Days => print_days(&session),
                        ChatCommand::Show(date) => {
                            let date = date.unwrap_or_else(ChatSession::today);
                            print_day(&session, &mut renderer, date);
                        }
                        ChatCommand::Delete { number, date } => {
                            let date = date.unwrap_or_else(ChatSession::today);
                            match session.delete_exchange(date, number) {
                                Ok(removed) => {
                                    renderer.print_info(&format!(
                                        "Deleted exchange {number} ({} turns) from {}.",
                                        removed.len(),
                                        format_date(date)
                                    ));
                                    print_day(&session, &mut renderer, date);
                                }
                                Err(err) => renderer.print_error(&err.to_string()),
                            }
                        }
                        ChatCommand::DeleteTurn { number, date } => {
                            let date = date.unwrap_or_else(ChatSession::today);
                            match session.delete_turn(date, number) {
                                Ok(_) => {
                                    renderer.print_info(&format!(
                                        "Deleted turn {number} from {}.",
                                        format_date(date)
                                    ));
                                    print_day(&session, &mut renderer, date);
                                }
                                Err(err) => renderer.print_error(&err.to_string()),
                            }
                        }
                        ChatCommand::Stats => print_stats(&session),
                        ChatCommand::Invalid(message) => {
                            renderer.print_error(&message);
                        }
                    }
                    continue;
                }

                println!("AI:");
                if let Err(e) = session
                    .send_streaming(message_text(line), &mut renderer)
                    .await
                {
                    renderer.print_error(&e.to_string());
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {}", err));
                break;
            }
        }
    }

    Ok(())
}

fn print_models(session: &ChatSession) {
    let models = session.models();
    if models.is_empty() {
        println!("    No models available. Try /refresh.");
        return;
    }
    println!("    Models:");
    for (idx, model) in models.iter().enumerate() {
        let marker = if session.model() == Some(model.as_str()) {
            "*"
        } else {
            " "
        };
        println!("    {marker} {:>2}. {model}", idx + 1);
    }
}

fn print_days(session: &ChatSession) {
    let history = session.history();
    if history.is_empty() {
        println!("    No history yet.");
        return;
    }
    println!("    Days:");
    for (date, turns) in history.iter() {
        println!(
            "      {}  {} exchanges, {} turns",
            format_date(date),
            session.exchanges(date).len(),
            turns.len()
        );
    }
}

fn print_day(session: &ChatSession, renderer: &mut dyn Renderer, date: Date) {
    let turns = session.turns(date);
    if turns.is_empty() {
        renderer.print_info(&format!("No exchanges on {}.", format_date(date)));
        return;
    }
    renderer.print_info(&format!("--- {} ---", format_date(date)));
    for (number, exchange) in session.exchanges(date).iter().enumerate() {
        renderer.print_info(&format!("[{}]", number + 1));
        for turn in exchange.turns(turns) {
            renderer.print_turn(
                &turn.timestamp.to_string(),
                &turn.speaker.to_string(),
                &turn.text,
            );
        }
    }
}

fn print_stats(session: &ChatSession) {
    let stats = session.stats();
    println!("    Session Statistics:");
    println!(
        "      Model: {}",
        stats.model.as_deref().unwrap_or("(none)")
    );
    println!("      Models available: {}", stats.catalog_size);
    println!("      History file: {}", session.history_path().display());
    println!(
        "      History: {} turns over {} days",
        stats.turn_count, stats.day_count
    );
    println!(
        "      Requests: {} ({} failed, {} interrupted)",
        stats.total_requests, stats.failed_requests, stats.interrupted_requests
    );
}
