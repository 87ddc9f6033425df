//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and configuration
//! structures for controlling chat behavior.

use std::path::PathBuf;
use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::history::DEFAULT_HISTORY_FILE;

/// Default connect timeout, in seconds.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Command-line arguments for the daybook-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Inference server address.
    #[arrrg(optional, "Server address (default: $DAYBOOK_HOST, $OLLAMA_HOST or 127.0.0.1:11434)", "HOST")]
    pub host: Option<String>,

    /// Model to use for chat.
    #[arrrg(optional, "Model to use (default: first model the server lists)", "MODEL")]
    pub model: Option<String>,

    /// History file location.
    #[arrrg(optional, "History file (default: chat_history.json)", "PATH")]
    pub history: Option<String>,

    /// Connect timeout in seconds.
    #[arrrg(optional, "Connect timeout in seconds (default: 10)", "SECONDS")]
    pub connect_timeout: Option<u64>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Server address; `None` defers to the environment.
    pub host: Option<String>,

    /// Model to use; `None` picks the first model in the catalog.
    pub model: Option<String>,

    /// Where the history file lives.
    pub history_path: PathBuf,

    /// How long to wait for the server to accept a connection.
    pub connect_timeout: Duration,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Host: from the environment
    /// - Model: first catalog entry
    /// - History: chat_history.json
    /// - Connect timeout: 10s
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            host: None,
            model: None,
            history_path: PathBuf::from(DEFAULT_HISTORY_FILE),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            use_color: true,
        }
    }

    /// Sets the server address.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the history file location.
    pub fn with_history_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.history_path = path.into();
        self
    }

    /// Sets the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ChatArgs> for ChatConfig {
    fn from(args: ChatArgs) -> Self {
        let defaults = ChatConfig::new();
        ChatConfig {
            host: args.host.filter(|h| !h.trim().is_empty()),
            model: args.model.filter(|m| !m.trim().is_empty()),
            history_path: args
                .history
                .map(PathBuf::from)
                .unwrap_or(defaults.history_path),
            connect_timeout: args
                .connect_timeout
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
            use_color: !args.no_color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ChatConfig::new();
        assert!(config.host.is_none());
        assert!(config.model.is_none());
        assert_eq!(config.history_path, PathBuf::from("chat_history.json"));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert!(config.use_color);
    }

    #[test]
    fn config_from_args_defaults() {
        let config = ChatConfig::from(ChatArgs::default());
        assert_eq!(config, ChatConfig::new());
    }

    #[test]
    fn config_from_args_custom() {
        let args = ChatArgs {
            host: Some("gpu-box:11434".to_string()),
            model: Some("llama3.2".to_string()),
            history: Some("/tmp/days.json".to_string()),
            connect_timeout: Some(2),
            no_color: true,
        };
        let config = ChatConfig::from(args);
        assert_eq!(config.host.as_deref(), Some("gpu-box:11434"));
        assert_eq!(config.model.as_deref(), Some("llama3.2"));
        assert_eq!(config.history_path, PathBuf::from("/tmp/days.json"));
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert!(!config.use_color);
    }

    #[test]
    fn blank_model_means_unset() {
        let args = ChatArgs {
            model: Some("  ".to_string()),
            ..ChatArgs::default()
        };
        assert!(ChatConfig::from(args).model.is_none());
    }

    #[test]
    fn config_builder_pattern() {
        let config = ChatConfig::new()
            .with_host("http://localhost:11434")
            .with_model("mistral")
            .with_history_path("h.json")
            .with_connect_timeout(Duration::from_secs(1))
            .without_color();
        assert_eq!(config.host.as_deref(), Some("http://localhost:11434"));
        assert_eq!(config.model.as_deref(), Some("mistral"));
        assert_eq!(config.history_path, PathBuf::from("h.json"));
        assert_eq!(config.connect_timeout, Duration::from_secs(1));
        assert!(!config.use_color);
    }
}
