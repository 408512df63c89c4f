//! Infrastructure layer for llm-council
//!
//! Concrete adapters behind the application ports: HTTP provider clients
//! (OpenAI, OpenRouter), conversation stores (JSON file, in-memory), and
//! TOML configuration loading.

pub mod config;
pub mod providers;
pub mod store;

// Re-export commonly used types
pub use config::file_config::{ConfigIssue, FileConfig, Severity};
pub use config::loader::{ConfigLoader, LoadedConfig};
pub use providers::openai::OpenAiClient;
pub use providers::openrouter::OpenRouterClient;
pub use store::json_file::JsonFileStore;
pub use store::memory::MemoryConversationStore;
