//! Interactive chat over a day-grouped history.
//!
//! This module provides the pieces of the `daybook-chat` REPL:
//!
//! - Streaming responses with real-time fragment display
//! - Slash commands to browse days, pick a model and prune exchanges
//! - History persisted to a JSON file after every turn
//!
//! # Architecture
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`session`]: Session state, streaming and deletion
//! - [`commands`]: Slash command parsing

mod commands;
mod config;
mod session;

pub use crate::render::{PlainTextRenderer, Renderer};
pub use commands::{ChatCommand, help_text, message_text, parse_command};
pub use config::{ChatArgs, ChatConfig};
pub use session::{ChatSession, SessionStats};
