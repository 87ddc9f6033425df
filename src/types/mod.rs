// Public modules
pub mod chat_chunk;
pub mod chat_message;
pub mod chat_turn;
pub mod model_list;
pub mod speaker;
pub mod timestamp;

// Re-exports
pub use chat_chunk::{ChatChunk, ChunkMessage};
pub use chat_message::{ChatMessage, ChatRequest, MessageRole};
pub use chat_turn::ChatTurn;
pub use model_list::{ModelList, ModelTag};
pub use speaker::Speaker;
pub use timestamp::Timestamp;
