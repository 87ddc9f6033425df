use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Who produced a turn.
///
/// History files store this as a free-form tag.  Older files spell the
/// assistant several ways (`"Ollama"`, `"AI 🤖 "`); those decode as
/// [`Speaker::Assistant`] and are written back with the canonical tag.  A tag
/// that is neither a user nor an assistant spelling is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Speaker {
    /// The person at the keyboard.
    User,

    /// The model.
    Assistant,

    /// Any other tag found in a history file.
    Other(String),
}

impl Speaker {
    /// Canonical tag written for user turns.
    pub const USER_TAG: &'static str = "You";

    /// Canonical tag written for assistant turns.
    pub const ASSISTANT_TAG: &'static str = "AI 🤖 ";

    const USER_SPELLINGS: [&'static str; 2] = ["You", "user"];
    const ASSISTANT_SPELLINGS: [&'static str; 3] = ["AI 🤖", "Ollama", "assistant"];

    /// Decodes a stored tag.
    pub fn from_tag(tag: &str) -> Self {
        let trimmed = tag.trim();
        let is_one_of = |spellings: &[&str]| spellings.iter().any(|s| trimmed.eq_ignore_ascii_case(s));
        if is_one_of(&Self::USER_SPELLINGS) {
            Speaker::User
        } else if is_one_of(&Self::ASSISTANT_SPELLINGS) {
            Speaker::Assistant
        } else {
            Speaker::Other(tag.to_string())
        }
    }

    /// The tag written to disk.
    pub fn as_tag(&self) -> &str {
        match self {
            Speaker::User => Self::USER_TAG,
            Speaker::Assistant => Self::ASSISTANT_TAG,
            Speaker::Other(tag) => tag,
        }
    }

    /// Returns true for user turns.
    pub fn is_user(&self) -> bool {
        matches!(self, Speaker::User)
    }

    /// Returns true for assistant turns.
    pub fn is_assistant(&self) -> bool {
        matches!(self, Speaker::Assistant)
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::User => write!(f, "You"),
            Speaker::Assistant => write!(f, "AI"),
            Speaker::Other(tag) => write!(f, "{}", tag.trim()),
        }
    }
}

impl Serialize for Speaker {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_tag())
    }
}

impl<'de> Deserialize<'de> for Speaker {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let tag = String::deserialize(deserializer)?;
        Ok(Speaker::from_tag(&tag))
    }
}
