pub mod assistant;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod prompt;
pub mod store;

pub use assistant::{
    Assistant, AssistantError, GeminiChatSession, GeminiSessionConfig, Reply, FALLBACK_ANSWER,
};
pub use config::EnviroConfig;
pub use db::PgChatStore;
pub use error::EnviroError;
pub use models::chat::{ChatRecord, ChatRequest, ChatResponse, NewChatRecord, RecordId};
pub use store::{ChatStore, MemoryChatStore};
