//! Slash command parsing for the chat application.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to browse and prune history or pick a model without
//! sending anything to the server.

use time::Date;

use crate::utils::time::parse_date;

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// List the model catalog.
    Models,

    /// Re-fetch the model catalog from the server.
    Refresh,

    /// Select a model by name or by its 1-based catalog number.
    Model(String),

    /// List the days that have history.
    Days,

    /// Show a day's exchanges; `None` means today.
    Show(Option<Date>),

    /// Delete an exchange by its 1-based number on a day (default today).
    Delete {
        /// Exchange number as shown by `/show`.
        number: usize,
        /// Day to delete from.
        date: Option<Date>,
    },

    /// Delete a single turn by its 1-based number on a day (default today).
    DeleteTurn {
        /// Turn number within the day.
        number: usize,
        /// Day to delete from.
        date: Option<Date>,
    },

    /// Display session statistics.
    Stats,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a valid command,
/// or `None` if it should be treated as a regular message.  A leading `//`
/// escapes the slash; see [`message_text`].
///
/// # Examples
///
/// ```
/// # use daybook::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/show 19-10-2026").is_some());
/// assert!(parse_command("Hello there").is_none());
/// assert!(parse_command("//etc/hosts format?").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    let rest = input.strip_prefix('/')?;
    if rest.starts_with('/') {
        return None;
    }

    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "models" => ChatCommand::Models,
        "refresh" => ChatCommand::Refresh,
        "model" => match argument {
            Some(model) => ChatCommand::Model(model.to_string()),
            None => ChatCommand::Invalid("/model requires a model name or number".to_string()),
        },
        "days" | "history" => ChatCommand::Days,
        "today" => ChatCommand::Show(None),
        "show" => match argument.map(parse_date_argument) {
            None => ChatCommand::Show(None),
            Some(Ok(date)) => ChatCommand::Show(Some(date)),
            Some(Err(err)) => ChatCommand::Invalid(format!("/show {err}")),
        },
        "delete" => parse_numbered(argument, "/delete", |number, date| ChatCommand::Delete {
            number,
            date,
        }),
        "delete-turn" | "delete_turn" => {
            parse_numbered(argument, "/delete-turn", |number, date| {
                ChatCommand::DeleteTurn { number, date }
            })
        }
        "stats" | "status" => ChatCommand::Stats,
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        _ => ChatCommand::Invalid(format!("Unknown command: /{}", command)),
    };

    Some(result)
}

/// The text to send for input that is not a command.
///
/// A leading `//` stands for a literal `/`, so `//etc/hosts` sends
/// `/etc/hosts`.
pub fn message_text(input: &str) -> &str {
    let input = input.trim();
    if input.starts_with("//") {
        &input[1..]
    } else {
        input
    }
}

fn parse_numbered<F>(argument: Option<&str>, name: &str, constructor: F) -> ChatCommand
where
    F: Fn(usize, Option<Date>) -> ChatCommand,
{
    let Some(arg) = argument else {
        return ChatCommand::Invalid(format!("{name} requires an exchange number"));
    };

    let mut parts = arg.split_whitespace();
    let number = match parts.next().map(str::parse::<usize>) {
        Some(Ok(number)) if number > 0 => number,
        _ => return ChatCommand::Invalid(format!("{name} expects a positive number")),
    };
    let date = match parts.next().map(parse_date_argument) {
        None => None,
        Some(Ok(date)) => Some(date),
        Some(Err(err)) => return ChatCommand::Invalid(format!("{name} {err}")),
    };
    if parts.next().is_some() {
        return ChatCommand::Invalid(format!("{name} takes a number and an optional date"));
    }
    constructor(number, date)
}

fn parse_date_argument(value: &str) -> Result<Date, String> {
    parse_date(value).map_err(|_| format!("expects a date like DD-MM-YYYY, got '{value}'"))
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /models                  List models the server offers
  /refresh                 Re-fetch the model list
  /model <name|n>          Select a model by name or list number
  /days                    List days with history
  /show [date]             Show a day's exchanges (default today)
  /today                   Show today's exchanges
  /delete <n> [date]       Delete exchange n (default today)
  /delete-turn <n> [date]  Delete a single turn n (default today)
  /stats                   Show session statistics
  /help                    Show this help message
  /quit                    Exit the chat
Dates are DD-MM-YYYY (YYYY-MM-DD also works).
Start a message with // to send a leading slash."#
}
