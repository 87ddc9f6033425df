// Public modules
pub mod chat;
pub mod client;
pub mod error;
pub mod exchange;
pub mod history;
pub mod ndjson;
pub mod observability;
pub mod render;
pub mod types;
pub mod utils;

// Re-exports
pub use client::Ollama;
pub use error::{Error, Result};
pub use exchange::{Exchange, pair_exchanges, remove_indices};
pub use history::{DEFAULT_HISTORY_FILE, GroupedHistory, HistoryStore, flatten};
pub use ndjson::process_ndjson;
pub use render::{PlainTextRenderer, Renderer};
pub use types::*;
