use serde::{Deserialize, Serialize};

use crate::types::{Speaker, Timestamp};

/// One message in the conversation as it is kept on disk.
///
/// The wire field names (`user`, `message`) predate this crate and are kept so
/// existing history files stay readable; `user` holds the speaker tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// When the turn was recorded.
    pub timestamp: Timestamp,

    /// Who produced the turn.
    #[serde(rename = "user")]
    pub speaker: Speaker,

    /// The message text.
    #[serde(rename = "message")]
    pub text: String,
}

impl ChatTurn {
    /// Creates a turn with an explicit timestamp.
    pub fn new(timestamp: Timestamp, speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            timestamp,
            speaker,
            text: text.into(),
        }
    }

    /// Creates a user turn.
    pub fn user(timestamp: Timestamp, text: impl Into<String>) -> Self {
        Self::new(timestamp, Speaker::User, text)
    }

    /// Creates an assistant turn.
    pub fn assistant(timestamp: Timestamp, text: impl Into<String>) -> Self {
        Self::new(timestamp, Speaker::Assistant, text)
    }
}
