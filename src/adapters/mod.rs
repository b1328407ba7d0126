// Adapters layer: concrete implementations for external systems (storage, http, smtp, parsers)

pub mod mailer;
pub mod mcp;
pub mod openai;
pub mod parsers;
pub mod storage;

pub use mailer::SmtpMailer;
pub use mcp::{McpClient, McpIntegratedRag};
pub use openai::OpenAiClient;
pub use storage::LocalStorage;
