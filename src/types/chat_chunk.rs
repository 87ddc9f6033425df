use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::types::MessageRole;

/// One line of a streamed `/api/chat` response.
///
/// Only `message.content` and `error` matter to the stream reader; the other
/// fields the server sends (`model`, `created_at`, timing counters) are
/// ignored.  Every field decodes leniently: a value of the wrong shape reads
/// as absent, so an odd status line never breaks the stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatChunk {
    /// The assistant message fragment, if this line carries one.
    #[serde(default, deserialize_with = "lenient")]
    pub message: Option<ChunkMessage>,

    /// True on the final line of a response.
    #[serde(default, deserialize_with = "lenient_flag")]
    pub done: bool,

    /// Set when the server aborts generation.
    #[serde(default, deserialize_with = "lenient")]
    pub error: Option<String>,
}

/// The `message` object inside a [`ChatChunk`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMessage {
    /// Role of the fragment's author, normally `assistant`.
    #[serde(default, deserialize_with = "lenient")]
    pub role: Option<MessageRole>,

    /// The text fragment.
    #[serde(default, deserialize_with = "lenient")]
    pub content: Option<String>,
}

impl ChatChunk {
    /// Reads a decoded JSON line.  Anything but an object is an empty chunk.
    pub fn from_value(value: &serde_json::Value) -> Self {
        ChatChunk::deserialize(value).unwrap_or_default()
    }

    /// The text fragment carried by this line, if any.
    pub fn fragment(&self) -> Option<&str> {
        self.message.as_ref().and_then(|m| m.content.as_deref())
    }
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn lenient_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient::<D, bool>(deserializer)?.unwrap_or(false))
}
